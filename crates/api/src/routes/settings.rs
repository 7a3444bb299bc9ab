//! Route definitions for the self-service settings flow.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::settings;
use crate::state::AppState;

/// Initiate a browser flow (redirect-based).
pub const ROUTE_INIT_BROWSER_FLOW: &str = "/self-service/settings/browser";
/// Initiate an API flow (JSON).
pub const ROUTE_INIT_API_FLOW: &str = "/self-service/settings/api";
/// Fetch a flow by `?id=`.
pub const ROUTE_GET_FLOW: &str = "/self-service/settings/flows";
/// Submit a flow via `?flow=`.
pub const ROUTE_SUBMIT_FLOW: &str = "/self-service/settings";

/// Routes for the settings self-service area.
///
/// ```text
/// GET  /self-service/settings/browser   -> init_browser_flow
/// GET  /self-service/settings/api       -> init_api_flow
/// GET  /self-service/settings/flows     -> get_flow
/// POST /self-service/settings           -> submit_flow
/// GET  /self-service/settings           -> 404 (fixed body when disabled)
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route(ROUTE_INIT_BROWSER_FLOW, get(settings::init_browser_flow))
        .route(ROUTE_INIT_API_FLOW, get(settings::init_api_flow))
        .route(ROUTE_GET_FLOW, get(settings::get_flow))
        .route(
            ROUTE_SUBMIT_FLOW,
            post(settings::submit_flow).get(settings::submit_flow_get),
        )
}
