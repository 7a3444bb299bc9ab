use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use serde_json::json;
use veridian_core::error::CoreError;
use veridian_store::StoreError;

/// Application-level error type for HTTP handlers.
///
/// Wraps domain errors from `veridian-core` and storage errors from
/// `veridian-store`, and adds HTTP-specific variants. Implements
/// [`IntoResponse`] to produce the API error envelope.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A domain-level error from `veridian-core`.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A storage error from the persisters.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A bad request with a human-readable message.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// An internal error with a human-readable message.
    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

/// The generic error payload rendered for API transport failures.
///
/// Fields mirror the platform's public error model; empty fields are
/// omitted from the JSON.
#[derive(Debug, Default, Clone, Serialize)]
pub struct GenericErrorPayload {
    pub code: u16,
    pub status: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub reason: String,
    pub message: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub request: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub debug: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl GenericErrorPayload {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            code: status.as_u16(),
            status: status.canonical_reason().unwrap_or_default().to_string(),
            message: message.into(),
            ..Self::default()
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = reason.into();
        self
    }

    pub fn with_request(mut self, request: impl Into<String>) -> Self {
        self.request = request.into();
        self
    }
}

/// Render a payload as the `{"error": ...}` envelope.
pub fn envelope(payload: GenericErrorPayload) -> Response {
    let status =
        StatusCode::from_u16(payload.code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, axum::Json(json!({ "error": payload }))).into_response()
}

/// Build an envelope response, echoing the request id when present.
pub fn error_response(
    status: StatusCode,
    message: impl Into<String>,
    reason: Option<&str>,
    headers: &HeaderMap,
) -> Response {
    let mut payload = GenericErrorPayload::new(status, message);
    if let Some(reason) = reason {
        payload = payload.with_reason(reason);
    }
    if let Some(request_id) = request_id(headers) {
        payload = payload.with_request(request_id);
    }
    envelope(payload)
}

/// The request id assigned by the request-id middleware, if any.
pub fn request_id(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_string())
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::Core(core) => match core {
                CoreError::NotFound { entity, id } => (
                    StatusCode::NOT_FOUND,
                    format!("{entity} with id {id} not found"),
                ),
                CoreError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
                CoreError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
                CoreError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg.clone()),
                CoreError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg.clone()),
                CoreError::Internal(msg) => {
                    tracing::error!(error = %msg, "Internal core error");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "An internal error occurred".to_string(),
                    )
                }
            },

            AppError::Store(store) => match store {
                StoreError::NotFound { .. } => (StatusCode::NOT_FOUND, store.to_string()),
                StoreError::Expired { .. } => (StatusCode::GONE, store.to_string()),
                StoreError::Conflict { .. } => (StatusCode::CONFLICT, store.to_string()),
                StoreError::Internal(msg) => {
                    tracing::error!(error = %msg, "Internal store error");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "An internal error occurred".to_string(),
                    )
                }
            },

            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::InternalError(msg) => {
                tracing::error!(error = %msg, "Internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "An internal error occurred".to_string(),
                )
            }
        };

        envelope(GenericErrorPayload::new(status, message))
    }
}
