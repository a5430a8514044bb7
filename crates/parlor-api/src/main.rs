//! Parlor API server entry point.

use std::error::Error;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use parlor_api::gateway::LogGateway;
use parlor_api::routes;
use parlor_api::state::AppState;
use parlor_core::id::UserId;
use parlor_runtime::{RuntimeDeps, SessionRegistry};
use parlor_store::PgStore;
use sqlx::postgres::PgPoolOptions;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // Initialize tracing subscriber.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    tracing::info!("Starting Parlor API server");

    // Read configuration from environment.
    let database_url = std::env::var("DATABASE_URL")
        .map_err(|_| "DATABASE_URL environment variable must be set")?;
    let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port: u16 = std::env::var("PORT")
        .unwrap_or_else(|_| "3000".to_string())
        .parse()
        .map_err(|e| format!("PORT must be a valid u16: {e}"))?;

    let mut game = parlor_engine::GameConfig::default();
    if let Ok(value) = std::env::var("TURN_TIMEOUT_SEC") {
        game.turn_timeout = Duration::from_secs(
            value
                .parse()
                .map_err(|e| format!("TURN_TIMEOUT_SEC must be a number of seconds: {e}"))?,
        );
    }
    if let Ok(value) = std::env::var("MAX_REROLL_PER_PLAYER") {
        game.max_rerolls = value
            .parse()
            .map_err(|e| format!("MAX_REROLL_PER_PLAYER must be a count: {e}"))?;
    }
    if let Ok(value) = std::env::var("ADMIN_ID") {
        game.admin = Some(UserId(
            value
                .parse()
                .map_err(|e| format!("ADMIN_ID must be a user id: {e}"))?,
        ));
    }

    // Create database connection pool and apply migrations.
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&database_url)
        .await?;
    let store = Arc::new(PgStore::new(pool));
    store.migrate().await?;

    // Build the runtime and application state.
    let mut deps = RuntimeDeps::new(store.clone(), Arc::new(LogGateway));
    deps.game = game;
    let registry = Arc::new(SessionRegistry::new(deps));
    let clock = Arc::new(parlor_core::clock::SystemClock);
    let app_state = AppState::new(registry, store, clock);

    // Build router.
    let app = routes::app(app_state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    // Start server.
    let addr: SocketAddr = format!("{host}:{port}")
        .parse()
        .map_err(|e| format!("invalid HOST:PORT combination: {e}"))?;
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app).await?;

    Ok(())
}
