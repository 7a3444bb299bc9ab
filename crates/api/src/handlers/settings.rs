//! Handlers for the self-service settings flow.
//!
//! Request pipeline for submissions: strategy-enabled check, session
//! gate, flow load (ownership enforced here, before CSRF and sudo, so
//! foreign flows cannot be probed), CSRF guard, then the profile
//! strategy engine. Responses are shaped by the transport adapter.

use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;
use veridian_core::error::CoreError;
use veridian_core::flow::{FlowState, FlowType, SettingsFlow};
use veridian_core::form::Submission;
use veridian_core::identity::Identity;
use veridian_core::session::Session;
use veridian_core::ui::{project_form, UiContainer, UiText};

use crate::csrf;
use crate::error::{error_response, AppError, AppResult};
use crate::middleware::session::MaybeSession;
use crate::routes::settings::{ROUTE_INIT_API_FLOW, ROUTE_INIT_BROWSER_FLOW};
use crate::state::AppState;
use crate::strategy::profile::{self, ProfileOutcome};
use crate::transport::{self, FlowBody, SuccessBody, Transport};

/// Fixed body served when the profile strategy is disabled by
/// configuration.
const DISABLED_BODY: &str = "This endpoint was disabled by system administrator";

// ---------------------------------------------------------------------------
// Query types
// ---------------------------------------------------------------------------

/// Query for `GET /self-service/settings/flows`.
#[derive(Debug, Deserialize)]
pub struct GetFlowQuery {
    pub id: Option<Uuid>,
}

/// Query for `POST /self-service/settings`.
#[derive(Debug, Deserialize)]
pub struct SubmitFlowQuery {
    pub flow: Option<Uuid>,
}

// ---------------------------------------------------------------------------
// Flow initiation
// ---------------------------------------------------------------------------

/// GET /self-service/settings/browser
///
/// Initiate a browser settings flow: 303 to the settings UI with
/// `?flow=<id>`. Without a session the browser is sent to the login UI.
pub async fn init_browser_flow(
    State(state): State<AppState>,
    headers: HeaderMap,
    MaybeSession(session): MaybeSession,
) -> AppResult<Response> {
    let Some(session) = session else {
        return Ok(transport::unauthenticated(
            Transport::Browser,
            &state.config,
            &headers,
        ));
    };

    let identity = state
        .persisters
        .identities
        .get_identity(session.identity_id)
        .await?
        .record;

    let request_url = format!("{}{ROUTE_INIT_BROWSER_FLOW}", state.config.public_url);
    let flow = create_settings_flow(&state, FlowType::Browser, &session, &identity, request_url)
        .await?;

    Ok(transport::redirect_to(&format!(
        "{}?flow={}",
        state.config.settings_ui_url, flow.id
    )))
}

/// GET /self-service/settings/api
///
/// Initiate an API settings flow: 200 with the flow body.
pub async fn init_api_flow(
    State(state): State<AppState>,
    headers: HeaderMap,
    MaybeSession(session): MaybeSession,
) -> AppResult<Response> {
    let Some(session) = session else {
        return Ok(transport::unauthenticated(
            Transport::Api,
            &state.config,
            &headers,
        ));
    };

    let identity = state
        .persisters
        .identities
        .get_identity(session.identity_id)
        .await?
        .record;

    let request_url = format!("{}{ROUTE_INIT_API_FLOW}", state.config.public_url);
    let flow =
        create_settings_flow(&state, FlowType::Api, &session, &identity, request_url).await?;

    Ok(Json(FlowBody::new(flow, identity)).into_response())
}

/// GET /self-service/settings/flows?id=<id>
///
/// Fetch the current state of a flow. 404 when unknown, 410 when
/// expired, 403 when the caller does not own it.
pub async fn get_flow(
    State(state): State<AppState>,
    Query(query): Query<GetFlowQuery>,
    headers: HeaderMap,
    MaybeSession(session): MaybeSession,
) -> AppResult<Response> {
    let transport = Transport::of_request(&headers);
    let Some(session) = session else {
        return Ok(transport::unauthenticated(transport, &state.config, &headers));
    };
    let Some(id) = query.id else {
        return Err(AppError::BadRequest(
            "The id query parameter is missing.".to_string(),
        ));
    };

    let flow = state.persisters.flows.get_flow(id, Utc::now()).await?.record;
    if flow.identity_id != session.identity_id {
        return Ok(error_response(
            StatusCode::FORBIDDEN,
            UiText::initiated_by_another().text,
            None,
            &headers,
        ));
    }

    let identity = state
        .persisters
        .identities
        .get_identity(flow.identity_id)
        .await?
        .record;
    Ok(Json(FlowBody::new(flow, identity)).into_response())
}

// ---------------------------------------------------------------------------
// Flow submission
// ---------------------------------------------------------------------------

/// POST /self-service/settings?flow=<id>
///
/// Submit a settings flow. The body carries `method=profile` and
/// `profile.traits.*` fields, form-encoded on the browser transport and
/// as JSON on the API transport.
pub async fn submit_flow(
    State(state): State<AppState>,
    Query(query): Query<SubmitFlowQuery>,
    headers: HeaderMap,
    MaybeSession(session): MaybeSession,
    body: Bytes,
) -> AppResult<Response> {
    if !state.config.profile_strategy_enabled {
        return Ok(disabled_response());
    }

    let transport = Transport::of_request(&headers);
    let Some(session) = session else {
        return Ok(transport::unauthenticated(transport, &state.config, &headers));
    };
    let Some(flow_id) = query.flow else {
        return Err(AppError::BadRequest(
            "The flow query parameter is missing.".to_string(),
        ));
    };

    let flow = state.persisters.flows.get_flow(flow_id, Utc::now()).await?;
    let transport = Transport::of_flow(flow.record.flow_type);

    // Ownership is enforced at load, before CSRF and sudo.
    if flow.record.identity_id != session.identity_id {
        let mut foreign = flow.record.clone();
        foreign.ui.push_message(UiText::initiated_by_another());
        return Ok(transport::flow_response(
            transport,
            StatusCode::BAD_REQUEST,
            FlowBody::without_identity(foreign),
        ));
    }

    // `success` is terminal: observed state transitions stay monotonic.
    if flow.record.state == FlowState::Success {
        return Err(AppError::Core(CoreError::Conflict(
            "The settings flow was already completed and can not be updated.".to_string(),
        )));
    }

    let submission = parse_submission(&headers, &body)?;

    match flow.record.flow_type {
        FlowType::Api => {
            // The body token is ignored, but cookie-authenticated
            // confused-deputy calls are rejected outright.
            if let Some(name) = csrf::forbidden_api_header(&headers) {
                return Ok(error_response(
                    StatusCode::BAD_REQUEST,
                    csrf::forbidden_header_message(name),
                    None,
                    &headers,
                ));
            }
        }
        FlowType::Browser => {
            if !csrf::verify(
                &state.config.csrf_secret,
                session.id,
                submission.csrf_token.as_deref(),
            ) {
                return Ok(transport::browser_csrf_failure(csrf::invalid_token_payload()));
            }
        }
    }

    if submission.method.as_deref() != Some(profile::METHOD) {
        return Err(AppError::BadRequest(
            "Could not find a strategy to handle the settings request.".to_string(),
        ));
    }

    match profile::submit(&state, &session, flow, &submission).await? {
        ProfileOutcome::NoOp { flow, identity } => Ok(transport::flow_response(
            transport,
            StatusCode::OK,
            FlowBody::new(flow, identity),
        )),
        ProfileOutcome::Invalid { flow, identity } => Ok(transport::flow_response(
            transport,
            StatusCode::BAD_REQUEST,
            FlowBody::new(flow, identity),
        )),
        ProfileOutcome::SudoRequired => {
            Ok(transport::sudo_required(transport, &state.config, &headers))
        }
        ProfileOutcome::Success {
            flow,
            identity,
            redirect_to,
        } => match transport {
            Transport::Browser => {
                let target = redirect_to.unwrap_or_else(|| {
                    format!("{}?flow={}", state.config.settings_ui_url, flow.id)
                });
                Ok(transport::redirect_to(&target))
            }
            Transport::Api => Ok(Json(SuccessBody {
                flow: FlowBody::without_identity(flow),
                identity,
            })
            .into_response()),
        },
    }
}

/// GET /self-service/settings
///
/// The submit route has no GET semantics; it exists so that a disabled
/// strategy answers every method with the fixed 404 body.
pub async fn submit_flow_get(State(state): State<AppState>) -> Response {
    if !state.config.profile_strategy_enabled {
        return disabled_response();
    }
    StatusCode::NOT_FOUND.into_response()
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn disabled_response() -> Response {
    (StatusCode::NOT_FOUND, DISABLED_BODY).into_response()
}

/// Create a settings flow seeded with the form projection of the
/// identity's current traits.
async fn create_settings_flow(
    state: &AppState,
    flow_type: FlowType,
    session: &Session,
    identity: &Identity,
    request_url: String,
) -> AppResult<SettingsFlow> {
    let schema = state.schemas.get(&identity.schema_id)?;
    let csrf_token = match flow_type {
        FlowType::Browser => csrf::token(&state.config.csrf_secret, session.id),
        FlowType::Api => String::new(),
    };

    let mut flow = SettingsFlow::new(
        flow_type,
        identity.id,
        Utc::now(),
        state.config.settings_flow_lifespan,
        request_url,
        UiContainer::new(""),
    );
    let action = state.settings_submit_url(flow.id);
    flow.ui = project_form(&schema, &action, &csrf_token, &identity.traits, None, &[]);

    state.persisters.flows.create_flow(flow.clone()).await?;
    tracing::debug!(flow_id = %flow.id, identity_id = %identity.id, ?flow_type, "Settings flow created");
    Ok(flow)
}

/// Decode the request body into a normalized submission. JSON bodies
/// must be flat objects; everything else is treated as form-encoded.
fn parse_submission(headers: &HeaderMap, body: &Bytes) -> AppResult<Submission> {
    if transport::is_json(headers) {
        let object: serde_json::Map<String, serde_json::Value> = serde_json::from_slice(body)
            .map_err(|e| {
                AppError::BadRequest(format!("Unable to decode the JSON request body: {e}"))
            })?;
        Ok(Submission::from_json_object(&object))
    } else {
        let pairs: Vec<(String, String)> = serde_urlencoded::from_bytes(body)
            .map_err(|e| AppError::BadRequest(format!("Unable to decode the form body: {e}")))?;
        Ok(Submission::from_form_pairs(pairs))
    }
}
