mod applications;
mod config;
mod db;
mod errors;
mod models;
mod routes;
mod state;
mod uploads;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::http::HeaderValue;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::applications::pg_store::PgApplicationStore;
use crate::config::Config;
use crate::db::create_pool;
use crate::routes::build_router;
use crate::state::AppState;
use crate::uploads::CvStorage;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Job Board API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize PostgreSQL
    let db = create_pool(&config.database_url, config.storage_timeout).await?;

    // CV uploads live on local disk; the directory is created on first upload
    let cv_storage = CvStorage::new(&config.upload_dir, config.storage_timeout);
    info!("CV upload directory: {}", cv_storage.upload_dir().display());

    let state = AppState {
        applications: Arc::new(PgApplicationStore::new(db, config.storage_timeout)),
        cv_storage,
    };

    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(build_cors(&config)?);

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Restricts CORS to `CORS_ORIGIN` when set; permissive otherwise.
fn build_cors(config: &Config) -> Result<CorsLayer> {
    match &config.cors_origin {
        Some(origin) => {
            let origin: HeaderValue = origin
                .parse()
                .with_context(|| format!("CORS_ORIGIN '{origin}' is not a valid header value"))?;
            Ok(CorsLayer::new()
                .allow_origin(origin)
                .allow_methods(tower_http::cors::Any)
                .allow_headers(tower_http::cors::Any))
        }
        None => Ok(CorsLayer::permissive()),
    }
}
