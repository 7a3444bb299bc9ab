use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use veridian_core::schema::{SchemaRegistry, TraitSchema, DEFAULT_SCHEMA_ID};
use veridian_courier::SmtpMailer;
use veridian_store::Persisters;

use veridian_api::config::ServerConfig;
use veridian_api::router::build_app_router;
use veridian_api::state::AppState;
use veridian_api::background;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "veridian_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    // --- Identity schema ---
    let schemas = load_schema_registry(&config);
    tracing::info!(url = %config.identity_schema_url, "Identity schema registered");

    // --- Persisters ---
    // The reference wiring is in-memory; production deployments plug
    // their own persisters into `AppState`.
    let persisters = Persisters::in_memory();

    // --- Courier ---
    if let Some(smtp_url) = &config.courier_smtp_url {
        let mailer = SmtpMailer::from_url(smtp_url, config.courier_from_address.as_deref())
            .expect("COURIER_SMTP_URL must be a valid SMTP URL");
        background::spawn_courier_drain(persisters.clone(), mailer);
        tracing::info!("Courier drain started");
    } else {
        tracing::info!("COURIER_SMTP_URL not set, courier delivery disabled");
    }

    // --- Router ---
    let state = AppState {
        persisters,
        config: Arc::new(config.clone()),
        schemas: Arc::new(schemas),
    };
    let app = build_app_router(state, &config);

    // --- Serve ---
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .unwrap_or_else(|e| panic!("Failed to bind {addr}: {e}"));
    tracing::info!(%addr, "Veridian API listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");
}

/// Load the default identity trait schema from the configured URL.
/// Supports `file://` URLs and bare filesystem paths.
fn load_schema_registry(config: &ServerConfig) -> SchemaRegistry {
    let path = config
        .identity_schema_url
        .strip_prefix("file://")
        .unwrap_or(&config.identity_schema_url);
    let raw = std::fs::read_to_string(path)
        .unwrap_or_else(|e| panic!("Failed to read identity schema {path}: {e}"));
    let schema = TraitSchema::parse(DEFAULT_SCHEMA_ID, &raw)
        .unwrap_or_else(|e| panic!("Failed to parse identity schema {path}: {e}"));

    let mut registry = SchemaRegistry::new();
    registry.register(schema);
    registry
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to listen for ctrl-c");
    tracing::info!("Shutdown signal received, draining connections");
}
