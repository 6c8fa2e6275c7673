//! Counter administration routes.

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};

use crate::auth::AuthUser;
use crate::error::Result;
use crate::handlers::{handle_get_counter, handle_set_counter, CounterResponse, SetCounterRequest};
use crate::AppState;

/// Create counter routes.
pub fn routes() -> Router<AppState> {
    Router::new().route(
        "/collections/{name}/counters/{field}",
        get(get_handler).put(set_handler),
    )
}

/// GET /collections/{name}/counters/{field} - Read a counter.
async fn get_handler(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path((name, field)): Path<(String, String)>,
) -> Result<Json<CounterResponse>> {
    let response = handle_get_counter(&state.registry, &name, &field).await?;
    Ok(Json(response))
}

/// PUT /collections/{name}/counters/{field} - Overwrite a counter.
async fn set_handler(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path((name, field)): Path<(String, String)>,
    Json(request): Json<SetCounterRequest>,
) -> Result<Json<CounterResponse>> {
    let response = handle_set_counter(&state.registry, &name, &field, request).await?;
    Ok(Json(response))
}
