//! Liveness endpoint.

use axum::Json;
use serde_json::{json, Value};

/// GET /health
///
/// Returns 200 with service status and version.
pub async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
