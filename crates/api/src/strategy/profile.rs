//! The profile strategy engine.
//!
//! Ingests a settings submission, merges the candidate traits over the
//! stored document, gates protected-field changes on sudo mode,
//! validates against the identity schema, and on success atomically
//! swaps the identity's traits and verifiable address set before
//! running the post-settings hooks.
//!
//! Ownership and CSRF are enforced by the submit handler before the
//! engine runs: ownership at flow load (so foreign flows cannot be
//! probed for CSRF or sudo behavior), CSRF right after.

use chrono::Utc;
use veridian_core::flow::{FlowState, FlowType, SettingsFlow};
use veridian_core::form::{changed_protected_leaves, merge_submission, Submission};
use veridian_core::identity::{reconcile_addresses, Identity};
use veridian_core::session::Session;
use veridian_core::ui::{project_form, UiText};
use veridian_store::Versioned;

use crate::csrf;
use crate::error::{AppError, AppResult};
use crate::hooks::HookExecutor;
use crate::state::AppState;

/// The `method` value this strategy claims.
pub const METHOD: &str = "profile";

/// Engine outcome for a claimed submission. Ownership, CSRF, and
/// transport-level failures are handled before the engine runs.
#[derive(Debug)]
pub enum ProfileOutcome {
    /// The submission carried no profile fields; the UI was
    /// re-projected without errors and the state left unchanged.
    NoOp {
        flow: SettingsFlow,
        identity: Identity,
    },
    /// Validation failed; the flow shows the form again with the
    /// user's input echoed and per-field messages attached.
    Invalid {
        flow: SettingsFlow,
        identity: Identity,
    },
    /// A protected field would change but the session's authentication
    /// is too old.
    SudoRequired,
    /// The update was persisted and hooks ran.
    Success {
        flow: SettingsFlow,
        identity: Identity,
        redirect_to: Option<String>,
    },
}

/// Process a `method=profile` submission against an owned, unexpired
/// flow.
pub async fn submit(
    state: &AppState,
    session: &Session,
    flow: Versioned<SettingsFlow>,
    submission: &Submission,
) -> AppResult<ProfileOutcome> {
    let Versioned {
        record: mut flow,
        version: flow_version,
    } = flow;

    let stored = state
        .persisters
        .identities
        .get_identity(flow.identity_id)
        .await?;
    let mut identity = stored.record;
    let schema = state.schemas.get(&identity.schema_id)?;

    let action = state.settings_submit_url(flow.id);
    let csrf_token = match flow.flow_type {
        FlowType::Browser => csrf::token(&state.config.csrf_secret, session.id),
        FlowType::Api => String::new(),
    };

    // No profile fields at all: re-project and leave the state alone.
    if submission.has_no_fields() {
        flow.ui = project_form(&schema, &action, &csrf_token, &identity.traits, None, &[]);
        state
            .persisters
            .flows
            .update_flow(&flow, flow_version)
            .await?;
        return Ok(ProfileOutcome::NoOp { flow, identity });
    }

    let candidate = merge_submission(&schema, &identity.traits, submission, flow.flow_type);

    // Sudo gate, but only for protected fields that actually change.
    let changed = changed_protected_leaves(&schema, &identity.traits, &candidate.traits);
    if !changed.is_empty()
        && session.needs_reauth(Utc::now(), state.config.privileged_session_max_age)
    {
        tracing::info!(
            flow_id = %flow.id,
            fields = ?changed.iter().map(|l| l.name.as_str()).collect::<Vec<_>>(),
            "Protected field change requires reauthentication"
        );
        return Ok(ProfileOutcome::SudoRequired);
    }

    let errors = schema.validate(&candidate.traits);
    if !errors.is_empty() {
        flow.state = FlowState::ShowForm;
        flow.ui = project_form(
            &schema,
            &action,
            &csrf_token,
            &identity.traits,
            Some(&candidate.echo),
            &errors,
        );
        state
            .persisters
            .flows
            .update_flow(&flow, flow_version)
            .await?;
        return Ok(ProfileOutcome::Invalid { flow, identity });
    }

    // Accepted: swap traits and the verifiable address set together.
    let computed = schema.verifiable_addresses(&candidate.traits);
    let (addresses, introduced) = reconcile_addresses(&identity.verifiable_addresses, computed);

    let snapshot = identity.clone();
    identity.traits = candidate.traits;
    identity.verifiable_addresses = addresses;
    let identity_version = state
        .persisters
        .identities
        .update_identity(&identity, stored.version)
        .await?;

    flow.state = FlowState::Success;
    flow.ui = project_form(&schema, &action, &csrf_token, &identity.traits, None, &[]);
    flow.ui.push_message(UiText::settings_saved());
    let flow_version = state
        .persisters
        .flows
        .update_flow(&flow, flow_version)
        .await?;

    let executor = HookExecutor::from_config(&state.config);
    match executor
        .run(&state.persisters, &flow, &identity, &introduced)
        .await
    {
        Ok(output) => Ok(ProfileOutcome::Success {
            flow,
            identity,
            redirect_to: output.redirect_to,
        }),
        Err(err) => {
            tracing::error!(error = %err, flow_id = %flow.id, "Settings hook failed, rolling back");

            if let Err(revert) = state
                .persisters
                .identities
                .update_identity(&snapshot, identity_version)
                .await
            {
                tracing::error!(error = %revert, identity_id = %snapshot.id, "Identity rollback failed");
            }

            flow.state = FlowState::ShowForm;
            flow.ui = project_form(&schema, &action, &csrf_token, &snapshot.traits, None, &[]);
            flow.ui.push_message(UiText::hook_failed());
            if let Err(revert) = state
                .persisters
                .flows
                .update_flow(&flow, flow_version)
                .await
            {
                tracing::error!(error = %revert, flow_id = %flow.id, "Flow rollback failed");
            }

            Err(AppError::InternalError(format!("settings hook failed: {err}")))
        }
    }
}
