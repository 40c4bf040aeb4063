//! TAMS Anomaly Prediction Server
//!
//! Scores maintenance-anomaly reports and stores the results.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    TAMS PREDICTION API                      │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ┌───────────┐  ┌───────────┐  ┌─────────────────────────┐ │
//! │  │  API      │  │  Ingest   │  │  Scoring Engine         │ │
//! │  │  (Axum)   │─►│  (JSON,   │─►│  (ONNX model or         │ │
//! │  │           │  │ CSV, XLSX)│  │   keyword fallback)     │ │
//! │  └─────┬─────┘  └───────────┘  └────────────┬────────────┘ │
//! │        └──────────────┬─────────────────────┘              │
//! │                       ▼                                     │
//! │                ┌─────────────┐                             │
//! │                │ PostgreSQL  │                             │
//! │                └─────────────┘                             │
//! └─────────────────────────────────────────────────────────────┘
//! ```

mod config;
mod db;
mod error;
mod handlers;
mod ingest;
mod models;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower_http::{compression::CompressionLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tams_scoring::ScoringEngine;

pub use error::{AppError, AppResult};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    dotenvy::dotenv().ok();
    let config = config::Config::from_env();

    // Initialize logging (core `log` records are bridged into tracing)
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "tams_server=debug,tams_scoring=info,tower_http=debug".into());

    if config.is_production() {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    tracing::info!("TAMS Prediction Server starting ({})...", config.environment);
    tracing::info!("Database: {}", config.database_url.split('@').last().unwrap_or("***"));

    // Load the scoring artifact once; failure means fallback, not exit
    let engine = Arc::new(ScoringEngine::initialize(&config.engine));
    tracing::info!("Scoring path: {}", engine.path());

    // Initialize database pool
    let pool = db::create_pool(&config.database_url).await
        .context("Failed to create database pool")?;

    // Run migrations
    tracing::info!("Running database migrations...");
    db::run_migrations(&pool).await
        .context("Failed to run migrations")?;

    // Build application state
    let state = AppState {
        pool,
        engine,
        config: config.clone(),
    };

    // Build router
    let app = create_router(state);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app).await
        .context("Server error")?;

    Ok(())
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub pool: sqlx::PgPool,
    pub engine: Arc<ScoringEngine>,
    pub config: config::Config,
}

/// Create the main router with all routes
fn create_router(state: AppState) -> Router {
    let max_upload = state.config.max_upload_bytes;

    Router::new()
        // Health
        .route("/", get(handlers::health::check))
        .route("/health", get(handlers::health::check))

        // Predictions (return stored rows)
        .route("/predict/single", post(handlers::predictions::single))
        .route("/predict/batch", post(handlers::predictions::batch))
        .route("/predict/file/csv", post(handlers::predictions::csv_file))
        .route("/predict/file/excel", post(handlers::predictions::excel_file))

        // Storage (return confirmations)
        .route("/store/single", post(handlers::storage::single))
        .route("/store/batch", post(handlers::storage::batch))

        // Retrieval
        .route("/anomalies", get(handlers::anomalies::list))
        .route("/anomalies/:id", get(handlers::anomalies::get))

        .layer(DefaultBodyLimit::max(max_upload))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
