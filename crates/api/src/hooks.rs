//! Post-settings hooks.
//!
//! After a settings update is persisted, an ordered list of hooks runs
//! synchronously. A hook failure aborts the chain; the caller rolls the
//! flow and identity back via compensating writes.

use std::time::Duration;

use serde_json::json;
use veridian_core::flow::SettingsFlow;
use veridian_core::identity::{Identity, VerifiableAddress};
use veridian_courier::verification_message;
use veridian_store::{Persisters, StoreError};

use crate::config::ServerConfig;

/// HTTP request timeout for a web-hook delivery attempt.
const WEB_HOOK_TIMEOUT: Duration = Duration::from_secs(10);

/// A configured post-settings hook.
#[derive(Debug, Clone)]
pub enum SettingsHook {
    /// Enqueue a verification message for each newly introduced or
    /// changed verifiable address.
    VerifyAddress,
    /// POST a completion notice to an external URL.
    WebHook(String),
    /// Send the browser to this URL after success.
    Redirect(String),
}

/// Error type for hook execution failures.
#[derive(Debug, thiserror::Error)]
pub enum HookError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Web hook request failed: {0}")]
    WebHookRequest(#[from] reqwest::Error),

    #[error("Web hook returned HTTP {0}")]
    WebHookStatus(u16),
}

/// What the hook chain decided about the final response.
#[derive(Debug, Default)]
pub struct HookOutput {
    /// Overrides the browser's post-success redirect target.
    pub redirect_to: Option<String>,
}

/// Runs the configured hook list in order.
pub struct HookExecutor {
    hooks: Vec<SettingsHook>,
    http: reqwest::Client,
}

impl HookExecutor {
    /// Assemble the hook list from configuration. Order is fixed:
    /// verification first, then the web hook, then the redirect.
    pub fn from_config(config: &ServerConfig) -> Self {
        let mut hooks = Vec::new();
        if config.verification_enabled {
            hooks.push(SettingsHook::VerifyAddress);
        }
        if let Some(url) = &config.after_settings_web_hook_url {
            hooks.push(SettingsHook::WebHook(url.clone()));
        }
        if let Some(url) = &config.after_settings_redirect_url {
            hooks.push(SettingsHook::Redirect(url.clone()));
        }

        let http = reqwest::Client::builder()
            .timeout(WEB_HOOK_TIMEOUT)
            .build()
            .expect("Failed to build reqwest HTTP client");

        Self { hooks, http }
    }

    /// Execute every hook in order; the first failure aborts the chain.
    pub async fn run(
        &self,
        persisters: &Persisters,
        flow: &SettingsFlow,
        identity: &Identity,
        introduced_addresses: &[VerifiableAddress],
    ) -> Result<HookOutput, HookError> {
        let mut output = HookOutput::default();

        for hook in &self.hooks {
            match hook {
                SettingsHook::VerifyAddress => {
                    for address in introduced_addresses {
                        persisters
                            .courier
                            .enqueue_message(verification_message(&address.value))
                            .await?;
                    }
                }
                SettingsHook::WebHook(url) => {
                    let body = json!({
                        "flow": flow.id,
                        "identity": identity.id,
                        "state": flow.state,
                    });
                    let response = self.http.post(url).json(&body).send().await?;
                    if !response.status().is_success() {
                        return Err(HookError::WebHookStatus(response.status().as_u16()));
                    }
                    tracing::debug!(url, flow_id = %flow.id, "Settings web hook delivered");
                }
                SettingsHook::Redirect(url) => {
                    output.redirect_to = Some(url.clone());
                }
            }
        }

        Ok(output)
    }
}
