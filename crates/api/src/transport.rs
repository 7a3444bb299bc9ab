//! Transport adapter: normalizes the browser and API surfaces onto the
//! engine's input/output contract.
//!
//! The browser surface is cookie-authenticated and redirect-based:
//! user-correctable errors render as HTTP 200 with the flow body, hard
//! authentication failures redirect (303) to the configured UI. The API
//! surface is bearer-authenticated and status-coded: errors are JSON
//! envelopes or flow bodies with 4xx codes.

use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Redirect, Response};
use axum::Json;
use serde::Serialize;
use veridian_core::flow::{FlowType, SettingsFlow};
use veridian_core::identity::Identity;

use crate::config::ServerConfig;
use crate::error::{error_response, GenericErrorPayload};
use crate::middleware::session::bearer_token;

/// The client-facing surface of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    Browser,
    Api,
}

impl Transport {
    /// Classify a request before a flow is loaded: bearer credentials
    /// or a JSON body mean the API surface.
    pub fn of_request(headers: &HeaderMap) -> Self {
        if bearer_token(headers).is_some() || is_json(headers) {
            Transport::Api
        } else {
            Transport::Browser
        }
    }

    pub fn of_flow(flow_type: FlowType) -> Self {
        match flow_type {
            FlowType::Browser => Transport::Browser,
            FlowType::Api => Transport::Api,
        }
    }
}

/// Whether the request body is JSON (as opposed to form-encoded).
pub fn is_json(headers: &HeaderMap) -> bool {
    headers
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.contains("json"))
}

/// The HTTP representation of a settings flow. The owning identity is
/// embedded for the owner and omitted on ownership-error bodies.
#[derive(Debug, Serialize)]
pub struct FlowBody {
    #[serde(flatten)]
    pub flow: SettingsFlow,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identity: Option<Identity>,
}

impl FlowBody {
    pub fn new(flow: SettingsFlow, identity: Identity) -> Self {
        Self {
            flow,
            identity: Some(identity),
        }
    }

    pub fn without_identity(flow: SettingsFlow) -> Self {
        Self {
            flow,
            identity: None,
        }
    }
}

/// Successful API submission: the completed flow plus the updated
/// identity.
#[derive(Debug, Serialize)]
pub struct SuccessBody {
    pub flow: FlowBody,
    pub identity: Identity,
}

/// See-Other redirect used for all browser-transport redirects.
pub fn redirect_to(url: &str) -> Response {
    Redirect::to(url).into_response()
}

/// No valid session credentials: browser goes to the login UI, API
/// gets a 401 envelope.
pub fn unauthenticated(transport: Transport, config: &ServerConfig, headers: &HeaderMap) -> Response {
    match transport {
        Transport::Browser => redirect_to(&config.login_ui_url),
        Transport::Api => error_response(
            StatusCode::UNAUTHORIZED,
            "No valid session credentials found in the request.",
            None,
            headers,
        ),
    }
}

/// A protected field change was refused because the session's
/// authentication is too old: browser re-authenticates at the login
/// UI, API gets a 403 directing the client to re-authenticate.
pub fn sudo_required(transport: Transport, config: &ServerConfig, headers: &HeaderMap) -> Response {
    match transport {
        Transport::Browser => redirect_to(&config.login_ui_url),
        Transport::Api => error_response(
            StatusCode::FORBIDDEN,
            "The requested action was forbidden.",
            Some(
                "The login session is too old to change protected settings. \
                 Please re-authenticate and retry.",
            ),
            headers,
        ),
    }
}

/// Render a flow body with a transport-dependent status code: the
/// browser always sees 200 when the error is rendered into the flow
/// body, the API uses the given status.
pub fn flow_response(transport: Transport, api_status: StatusCode, body: FlowBody) -> Response {
    let status = match transport {
        Transport::Browser => StatusCode::OK,
        Transport::Api => api_status,
    };
    (status, Json(body)).into_response()
}

/// Browser CSRF failure: HTTP 200 whose body is a JSON array carrying
/// the canonical CSRF error object first.
pub fn browser_csrf_failure(payload: GenericErrorPayload) -> Response {
    (StatusCode::OK, Json(vec![payload])).into_response()
}
