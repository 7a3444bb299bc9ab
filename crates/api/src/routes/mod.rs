pub mod health;
pub mod settings;

use axum::Router;

use crate::state::AppState;

/// Build the public route tree.
///
/// ```text
/// /health                              liveness
///
/// /self-service/settings/browser       initiate browser flow (GET)
/// /self-service/settings/api           initiate API flow (GET)
/// /self-service/settings/flows         fetch flow state (GET)
/// /self-service/settings               submit flow (POST)
/// ```
pub fn public_routes() -> Router<AppState> {
    Router::new()
        .merge(health::router())
        .merge(settings::router())
}
