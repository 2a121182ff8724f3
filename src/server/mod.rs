//! HTTP server for the resize API.
//!
//! [`build_router`] assembles the routes with CORS and request tracing;
//! [`serve`] wires the store, backend, and task manager together, binds the
//! listener, and runs the expiry sweeper alongside until Ctrl-C.
//!
//! Handlers never resize anything themselves: `create_task` only validates
//! and schedules, and the work runs on the task manager's rayon pool.

pub mod error;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use state::AppState;

use crate::config::{Config, ConfigError, ServerConfig};
use crate::imaging::{Quality, RustBackend};
use crate::store::ImageStore;
use crate::task::{ManagerOptions, TaskError, TaskManager};
use axum::{
    Router,
    http::{HeaderValue, header::CONTENT_DISPOSITION},
    routing::get,
};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};

#[derive(Error, Debug)]
pub enum ServeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Task(#[from] TaskError),
}

/// Build the router with all routes
pub fn build_router(state: AppState, server: &ServerConfig) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .nest("/api", routes::api_routes(&state))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&server.cors_origins))
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let allow_origin = if origins.iter().any(|o| o == "*") {
        AllowOrigin::any()
    } else {
        let values: Vec<HeaderValue> = origins
            .iter()
            .filter_map(|origin| match origin.parse() {
                Ok(value) => Some(value),
                Err(_) => {
                    tracing::warn!(%origin, "ignoring unparseable CORS origin");
                    None
                }
            })
            .collect();
        AllowOrigin::list(values)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods(Any)
        .allow_headers(Any)
        // Lets browsers read the download filename
        .expose_headers([CONTENT_DISPOSITION])
}

/// Periodically drop expired tasks and stale uploads.
pub fn spawn_sweeper(manager: Arc<TaskManager>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            let stats = manager.purge_expired(Utc::now());
            tracing::debug!(tasks = stats.tasks, uploads = stats.uploads, "expiry sweep");
        }
    })
}

/// Start the server and block until shutdown.
pub async fn serve(config: Config) -> Result<(), ServeError> {
    let store = Arc::new(ImageStore::new());
    let backend = Arc::new(RustBackend::with_quality(Quality::new(
        config.processing.jpeg_quality,
    )));
    let manager = Arc::new(TaskManager::new(
        store,
        backend,
        ManagerOptions::from_config(&config)?,
    )?);

    let state = AppState::new(Arc::clone(&manager), config.uploads.clone());
    let router = build_router(state, &config.server);
    let sweeper = spawn_sweeper(
        manager,
        Duration::from_secs(config.tasks.sweep_interval_secs),
    );

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Listening on http://{}", listener.local_addr()?);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    sweeper.abort();
    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown requested");
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}
