//! CSRF protection.
//!
//! The synchronizer token is derived per session: hex-encoded
//! HMAC-SHA256 of the session id under the configured secret. Browser
//! submissions must echo the token; the API transport ignores the body
//! field but rejects requests that carry `Cookie` or `Origin` headers,
//! which would indicate a cookie-authenticated browser being tricked
//! into calling the API surface.

use std::fmt::Write as _;

use axum::http::{HeaderMap, StatusCode};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use uuid::Uuid;

use crate::error::GenericErrorPayload;

type HmacSha256 = Hmac<Sha256>;

/// Headers that must not appear on API-transport submissions.
const FORBIDDEN_API_HEADERS: [&str; 2] = ["Cookie", "Origin"];

/// Derive the CSRF synchronizer token for a session.
pub fn token(secret: &str, session_id: Uuid) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(session_id.as_bytes());
    let digest = mac.finalize().into_bytes();

    let mut encoded = String::with_capacity(digest.len() * 2);
    for byte in digest {
        let _ = write!(encoded, "{byte:02x}");
    }
    encoded
}

/// Check a presented token against the session's derived token.
pub fn verify(secret: &str, session_id: Uuid, presented: Option<&str>) -> bool {
    presented == Some(token(secret, session_id).as_str())
}

/// The canonical CSRF error object, embedded as the first element of
/// the browser response body on token mismatch.
pub fn invalid_token_payload() -> GenericErrorPayload {
    GenericErrorPayload::new(
        StatusCode::BAD_REQUEST,
        "The request was rejected to protect you from Cross-Site-Request-Forgery (CSRF) \
         which could cause harm.",
    )
    .with_reason("Please retry the flow and optionally clear your browser cookies.")
}

/// Returns the name of a forbidden header present on an API request,
/// if any.
pub fn forbidden_api_header(headers: &HeaderMap) -> Option<&'static str> {
    FORBIDDEN_API_HEADERS
        .into_iter()
        .find(|name| headers.contains_key(*name))
}

/// Error message naming the offending header on the API surface.
pub fn forbidden_header_message(name: &str) -> String {
    format!(
        "The HTTP Request Header included the {name:?} key, which is only allowed on \
         browser requests. Please remove it and retry."
    )
}
