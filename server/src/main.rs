//! Autoinc Server - document store with auto-increment fields.
//!
//! Serves the collections of a schema over HTTP, allocating and reconciling
//! auto-increment fields through a PostgreSQL-backed counter store.

mod auth;
mod config;
mod db;
mod error;
mod handlers;
mod registry;
mod routes;

use crate::config::Config;
use crate::db::{PgCounterBackend, Pool};
use crate::registry::Registry;
use autoinc_engine::AutoincrementOptions;
use axum::Router;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub pool: Pool,
    pub config: Arc<Config>,
    pub registry: Arc<Registry>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "autoinc_server=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;

    tracing::info!("Starting Autoinc Server on {}:{}", config.host, config.port);

    let pool = db::create_pool(&config.database_url, config.max_connections).await?;

    tracing::info!("Running database migrations...");
    db::run_migrations(&pool).await?;

    let schema = registry::load_schema(config.schema_path.as_deref())?;
    let registry = Registry::new(
        schema,
        Arc::new(PgCounterBackend::new(pool.clone())),
        AutoincrementOptions {
            counter_name: config.counter_name.clone(),
        },
    );
    tracing::info!(
        collections = ?registry.names().collect::<Vec<_>>(),
        "Schema loaded"
    );

    let state = AppState {
        pool,
        config: Arc::new(config.clone()),
        registry: Arc::new(registry),
    };

    let app = Router::new()
        .merge(routes::create_routes())
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
