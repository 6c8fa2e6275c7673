//! HTTP route definitions.

mod counters;
mod documents;
mod health;

use crate::AppState;
use axum::Router;

/// Create all application routes.
pub fn create_routes() -> Router<AppState> {
    Router::new()
        .merge(health::routes())
        .merge(documents::routes())
        .merge(counters::routes())
}
