//! Liveness and service info.

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use crate::AppState;

/// Health check response.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    /// Counter collection auto-increment fields draw from
    pub counter_name: String,
    pub collections: Vec<String>,
}

/// Create health routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_check))
        .route("/", get(root))
}

async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let mut collections: Vec<String> = state.registry.names().map(str::to_string).collect();
    collections.sort();

    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        counter_name: state.config.counter_name.clone(),
        collections,
    })
}

async fn root() -> &'static str {
    "Autoinc Server"
}
