//! Shared test harness for the settings flow integration tests.
//!
//! Builds the full application router with the same middleware stack
//! production uses, backed by in-memory persisters the tests seed
//! directly.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, Response, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;
use veridian_core::identity::{Identity, VerifiableAddress};
use veridian_core::schema::{SchemaRegistry, TraitSchema, DEFAULT_SCHEMA_ID};
use veridian_core::session::Session;
use veridian_store::Persisters;

use veridian_api::config::ServerConfig;
use veridian_api::router::build_app_router;
use veridian_api::state::AppState;

/// Build a test `ServerConfig` with safe defaults: profile strategy
/// enabled, verification off, a one-hour sudo window.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        public_url: "http://localhost:3000".to_string(),
        cors_origins: vec!["http://localhost:4455".to_string()],
        request_timeout_secs: 30,
        identity_schema_url: schema_path(),
        settings_ui_url: "http://localhost:4455/settings".to_string(),
        login_ui_url: "http://localhost:4455/login".to_string(),
        privileged_session_max_age: Duration::from_secs(3600),
        settings_flow_lifespan: Duration::from_secs(3600),
        verification_enabled: false,
        profile_strategy_enabled: true,
        courier_smtp_url: None,
        courier_from_address: None,
        after_settings_redirect_url: None,
        after_settings_web_hook_url: None,
        csrf_secret: "test-csrf-secret".to_string(),
    }
}

pub fn schema_path() -> String {
    format!(
        "file://{}/tests/stub/identity.schema.json",
        env!("CARGO_MANIFEST_DIR")
    )
}

fn schema_registry() -> SchemaRegistry {
    let path = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/stub/identity.schema.json");
    let raw = std::fs::read_to_string(path).expect("test schema must be readable");
    let schema = TraitSchema::parse(DEFAULT_SCHEMA_ID, &raw).expect("test schema must parse");

    let mut registry = SchemaRegistry::new();
    registry.register(schema);
    registry
}

/// Build the application router over the given persisters, mirroring
/// the router construction in `main.rs`.
pub fn build_test_app(config: ServerConfig, persisters: Persisters) -> Router {
    let state = AppState {
        persisters,
        config: Arc::new(config.clone()),
        schemas: Arc::new(schema_registry()),
    };
    build_app_router(state, &config)
}

// ---------------------------------------------------------------------------
// Seeding
// ---------------------------------------------------------------------------

/// The traits document of a freshly seeded identity, mirroring the
/// shape of the test schema.
pub fn default_traits(email: &str) -> Value {
    json!({
        "email": email,
        "stringy": "foobar",
        "booly": false,
        "numby": 2.5,
        "should_big_number": 2048,
        "should_long_string": "asdfasdfasdfasdfasfdasdfasdfasdf"
    })
}

/// Create an identity with the default traits directly in the store.
pub async fn seed_identity(persisters: &Persisters, email: &str) -> Identity {
    let mut identity = Identity::new(DEFAULT_SCHEMA_ID, default_traits(email));
    identity.verifiable_addresses = vec![VerifiableAddress {
        value: email.to_string(),
        via: "email".to_string(),
        verified: false,
    }];
    persisters
        .identities
        .create_identity(identity.clone())
        .await
        .expect("identity seeding should succeed");
    identity
}

/// Create an active session for the identity, authenticated right now.
pub async fn seed_session(persisters: &Persisters, identity_id: Uuid) -> Session {
    let session = Session::issue(
        identity_id,
        format!("token-{}", Uuid::new_v4()),
        Duration::from_secs(86400),
    );
    persisters
        .sessions
        .create_session(session.clone())
        .await
        .expect("session seeding should succeed");
    session
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

pub fn cookie_header(session: &Session) -> String {
    format!("veridian_session={}", session.token)
}

pub fn bearer_header(session: &Session) -> String {
    format!("Bearer {}", session.token)
}

/// GET with an optional cookie session.
pub async fn get_browser(app: Router, path: &str, session: Option<&Session>) -> Response<Body> {
    let mut builder = Request::builder().method("GET").uri(path);
    if let Some(session) = session {
        builder = builder.header("cookie", cookie_header(session));
    }
    app.oneshot(builder.body(Body::empty()).unwrap())
        .await
        .unwrap()
}

/// GET with an optional bearer session.
pub async fn get_bearer(app: Router, path: &str, session: Option<&Session>) -> Response<Body> {
    let mut builder = Request::builder().method("GET").uri(path);
    if let Some(session) = session {
        builder = builder.header("authorization", bearer_header(session));
    }
    app.oneshot(builder.body(Body::empty()).unwrap())
        .await
        .unwrap()
}

/// POST a form-encoded body with an optional cookie session.
pub async fn post_form(
    app: Router,
    path: &str,
    session: Option<&Session>,
    body: String,
) -> Response<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(path)
        .header("content-type", "application/x-www-form-urlencoded");
    if let Some(session) = session {
        builder = builder.header("cookie", cookie_header(session));
    }
    app.oneshot(builder.body(Body::from(body)).unwrap())
        .await
        .unwrap()
}

/// POST a JSON body with an optional bearer session.
pub async fn post_json(
    app: Router,
    path: &str,
    session: Option<&Session>,
    body: Value,
) -> Response<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(path)
        .header("content-type", "application/json");
    if let Some(session) = session {
        builder = builder.header("authorization", bearer_header(session));
    }
    app.oneshot(builder.body(Body::from(body.to_string())).unwrap())
        .await
        .unwrap()
}

pub async fn body_text(response: Response<Body>) -> String {
    use http_body_util::BodyExt;
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

pub async fn body_json(response: Response<Body>) -> Value {
    serde_json::from_str(&body_text(response).await).expect("response body must be JSON")
}

// ---------------------------------------------------------------------------
// Flow helpers
// ---------------------------------------------------------------------------

/// Initiate a browser flow and return its JSON body (via the flows
/// fetch endpoint, like the settings UI would).
pub async fn init_browser_flow(app: &Router, session: &Session) -> Value {
    let response = get_browser(app.clone(), "/self-service/settings/browser", Some(session)).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);

    let location = response
        .headers()
        .get("location")
        .expect("redirect must carry a location")
        .to_str()
        .unwrap()
        .to_string();
    let flow_id = location
        .split("flow=")
        .nth(1)
        .expect("location must carry the flow id");

    let response = get_browser(
        app.clone(),
        &format!("/self-service/settings/flows?id={flow_id}"),
        Some(session),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    body_json(response).await
}

/// Initiate an API flow and return its JSON body.
pub async fn init_api_flow(app: &Router, session: &Session) -> Value {
    let response = get_bearer(app.clone(), "/self-service/settings/api", Some(session)).await;
    assert_eq!(response.status(), StatusCode::OK);
    body_json(response).await
}

/// Collect the flow's form fields the way a browser would submit them:
/// every named input with its current value rendered as a string.
pub fn form_values(flow: &Value) -> Vec<(String, String)> {
    flow["ui"]["nodes"]
        .as_array()
        .expect("flow must carry ui nodes")
        .iter()
        .filter_map(|node| {
            let name = node["attributes"]["name"].as_str()?.to_string();
            let value = match &node["attributes"]["value"] {
                Value::Null => return None,
                Value::Bool(b) => b.to_string(),
                Value::Number(n) => n.to_string(),
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            Some((name, value))
        })
        .collect()
}

/// Replace or insert a form value.
pub fn set_value(values: &mut Vec<(String, String)>, name: &str, value: &str) {
    if let Some(entry) = values.iter_mut().find(|(n, _)| n == name) {
        entry.1 = value.to_string();
    } else {
        values.push((name.to_string(), value.to_string()));
    }
}

/// Remove a form value.
pub fn remove_value(values: &mut Vec<(String, String)>, name: &str) {
    values.retain(|(n, _)| n != name);
}

/// Encode form pairs for a browser submission.
pub fn encode_form(values: &[(String, String)]) -> String {
    serde_urlencoded::to_string(values).expect("form values must encode")
}

/// Encode form pairs as the flat JSON object an API client submits.
pub fn encode_form_as_json(values: &[(String, String)]) -> Value {
    let mut object = serde_json::Map::new();
    for (name, value) in values {
        object.insert(name.clone(), Value::String(value.clone()));
    }
    Value::Object(object)
}

/// The flow's submit action path (relative, for the in-process router).
pub fn action_path(flow: &Value) -> String {
    let id = flow["id"].as_str().expect("flow must have an id");
    format!("/self-service/settings?flow={id}")
}

/// Find a UI node by its attribute name.
pub fn node<'a>(flow: &'a Value, name: &str) -> &'a Value {
    flow["ui"]["nodes"]
        .as_array()
        .expect("flow must carry ui nodes")
        .iter()
        .find(|n| n["attributes"]["name"] == name)
        .unwrap_or_else(|| panic!("no node named {name}"))
}
