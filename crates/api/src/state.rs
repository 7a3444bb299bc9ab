use std::sync::Arc;

use uuid::Uuid;
use veridian_core::schema::SchemaRegistry;
use veridian_store::Persisters;

use crate::config::ServerConfig;
use crate::routes::settings::ROUTE_SUBMIT_FLOW;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc`).
#[derive(Clone)]
pub struct AppState {
    /// Abstract persisters for identities, flows, sessions, and the
    /// courier queue.
    pub persisters: Persisters,
    /// Server configuration (accessed by middleware and handlers).
    pub config: Arc<ServerConfig>,
    /// Registered identity trait schemas.
    pub schemas: Arc<SchemaRegistry>,
}

impl AppState {
    /// Action URL a flow's form submits to.
    pub fn settings_submit_url(&self, flow_id: Uuid) -> String {
        format!("{}{ROUTE_SUBMIT_FLOW}?flow={flow_id}", self.config.public_url)
    }
}
