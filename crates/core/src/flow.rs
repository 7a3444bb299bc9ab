//! Settings flow record and its state machine.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::Timestamp;
use crate::ui::UiContainer;

/// The client-facing surface a flow was initiated on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlowType {
    /// Cookie session, redirects, HTML-friendly errors.
    Browser,
    /// Bearer token, JSON, status-coded errors.
    Api,
}

/// Flow lifecycle state. `show_form -> show_form` on validation
/// failure, `show_form -> success` on an accepted submission; `success`
/// is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowState {
    ShowForm,
    Success,
}

/// A server-persisted, id-addressable settings interaction.
///
/// The owning `identity_id` is frozen at creation; no submission may
/// mutate it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettingsFlow {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub flow_type: FlowType,
    pub identity_id: Uuid,
    pub issued_at: Timestamp,
    pub expires_at: Timestamp,
    /// URL of the request that initiated the flow.
    pub request_url: String,
    pub state: FlowState,
    pub ui: UiContainer,
}

impl SettingsFlow {
    pub fn new(
        flow_type: FlowType,
        identity_id: Uuid,
        issued_at: Timestamp,
        lifespan: Duration,
        request_url: impl Into<String>,
        ui: UiContainer,
    ) -> Self {
        let expires_at = issued_at
            + chrono::Duration::from_std(lifespan).unwrap_or_else(|_| chrono::Duration::hours(1));
        Self {
            id: Uuid::new_v4(),
            flow_type,
            identity_id,
            issued_at,
            expires_at,
            request_url: request_url.into(),
            state: FlowState::ShowForm,
            ui,
        }
    }

    pub fn is_expired_at(&self, now: Timestamp) -> bool {
        now > self.expires_at
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::ui::UiContainer;

    fn empty_ui() -> UiContainer {
        UiContainer::new("http://localhost/self-service/settings?flow=x")
    }

    #[test]
    fn new_flow_shows_form_and_expires_after_lifespan() {
        let now = Utc::now();
        let flow = SettingsFlow::new(
            FlowType::Browser,
            Uuid::new_v4(),
            now,
            Duration::from_secs(3600),
            "http://localhost/self-service/settings/browser",
            empty_ui(),
        );

        assert_eq!(flow.state, FlowState::ShowForm);
        assert!(!flow.is_expired_at(now));
        assert!(flow.is_expired_at(now + chrono::Duration::seconds(3601)));
    }

    #[test]
    fn flow_type_serializes_lowercase() {
        let now = Utc::now();
        let flow = SettingsFlow::new(
            FlowType::Api,
            Uuid::new_v4(),
            now,
            Duration::from_secs(60),
            "http://localhost/self-service/settings/api",
            empty_ui(),
        );
        let json = serde_json::to_value(&flow).unwrap();
        assert_eq!(json["type"], "api");
        assert_eq!(json["state"], "show_form");
    }
}
