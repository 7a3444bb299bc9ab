//! Session resolution for Axum handlers.
//!
//! The caller's session arrives as the `veridian_session` cookie on the
//! browser transport or as an `Authorization: Bearer` token on the API
//! transport. [`MaybeSession`] never rejects; handlers decide between a
//! login redirect and a 401 envelope based on the request transport.

use std::convert::Infallible;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::HeaderMap;
use chrono::Utc;
use veridian_core::session::Session;

use crate::state::AppState;

/// Name of the browser session cookie.
pub const SESSION_COOKIE: &str = "veridian_session";

/// The caller's session, if any credentials resolved.
#[derive(Debug, Clone)]
pub struct MaybeSession(pub Option<Session>);

impl FromRequestParts<AppState> for MaybeSession {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let Some(token) = bearer_token(&parts.headers).or_else(|| session_cookie(&parts.headers))
        else {
            return Ok(MaybeSession(None));
        };

        match state
            .persisters
            .sessions
            .get_session_by_token(token, Utc::now())
            .await
        {
            Ok(session) => Ok(MaybeSession(session)),
            Err(err) => {
                tracing::warn!(error = %err, "Session lookup failed");
                Ok(MaybeSession(None))
            }
        }
    }
}

/// Extract a bearer token from the `Authorization` header.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
}

/// Extract the session cookie value from the `Cookie` header.
pub fn session_cookie(headers: &HeaderMap) -> Option<&str> {
    let cookies = headers.get("cookie").and_then(|v| v.to_str().ok())?;
    cookies.split(';').find_map(|pair| {
        let (name, value) = pair.trim().split_once('=')?;
        (name == SESSION_COOKIE).then_some(value)
    })
}
