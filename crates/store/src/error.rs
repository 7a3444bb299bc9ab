use uuid::Uuid;

/// Storage-level failures surfaced to the transport layer.
///
/// The `Conflict` display text is load-bearing: callers and tests match
/// on `conflict, flow was modified`.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: Uuid },

    #[error("{entity} expired: {id}")]
    Expired { entity: &'static str, id: Uuid },

    #[error("conflict, {entity} was modified")]
    Conflict { entity: &'static str },

    #[error("Internal store error: {0}")]
    Internal(String),
}
