//! Session model and the sudo-mode predicate.

use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CoreError;
use crate::types::Timestamp;

/// An authenticated session. Immutable after issuance.
///
/// Invariant: `issued_at <= authenticated_at <= expires_at`, checked by
/// [`Session::new`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: Uuid,
    pub identity_id: Uuid,
    /// Opaque bearer credential; presented as a cookie value on the
    /// browser transport and as a `Bearer` token on the API transport.
    #[serde(skip_serializing)]
    pub token: String,
    pub issued_at: Timestamp,
    pub authenticated_at: Timestamp,
    pub expires_at: Timestamp,
    pub active: bool,
}

impl Session {
    /// Create a session, enforcing the timestamp ordering invariant.
    pub fn new(
        identity_id: Uuid,
        token: impl Into<String>,
        issued_at: Timestamp,
        authenticated_at: Timestamp,
        expires_at: Timestamp,
    ) -> Result<Self, CoreError> {
        if issued_at > authenticated_at || authenticated_at > expires_at {
            return Err(CoreError::Validation(
                "session timestamps must satisfy issued_at <= authenticated_at <= expires_at"
                    .to_string(),
            ));
        }
        Ok(Self {
            id: Uuid::new_v4(),
            identity_id,
            token: token.into(),
            issued_at,
            authenticated_at,
            expires_at,
            active: true,
        })
    }

    /// Issue a session authenticated right now with the given lifetime.
    pub fn issue(identity_id: Uuid, token: impl Into<String>, lifetime: Duration) -> Self {
        let now = Utc::now();
        let expires_at = now
            + chrono::Duration::from_std(lifetime).unwrap_or_else(|_| chrono::Duration::hours(24));
        Self {
            id: Uuid::new_v4(),
            identity_id,
            token: token.into(),
            issued_at: now,
            authenticated_at: now,
            expires_at,
            active: true,
        }
    }

    /// Whether the session can authenticate a request at `now`.
    pub fn is_valid_at(&self, now: Timestamp) -> bool {
        self.active && self.expires_at > now
    }

    /// Sudo-mode predicate: true when the session's authentication is
    /// older than `max_age` and a protected mutation must be refused.
    ///
    /// Kept as a pure function over (session, now, config) so other
    /// strategies can reuse it.
    pub fn needs_reauth(&self, now: Timestamp, max_age: Duration) -> bool {
        let age = now.signed_duration_since(self.authenticated_at);
        match chrono::Duration::from_std(max_age) {
            Ok(max) => age > max,
            // Durations beyond chrono's range never force reauth.
            Err(_) => false,
        }
    }
}
