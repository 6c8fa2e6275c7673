//! Document endpoint routes.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};

use crate::auth::AuthUser;
use crate::error::Result;
use crate::handlers::{
    handle_create, handle_get, handle_save, handle_update, CreateDocumentRequest,
    DocumentResponse, SaveDocumentRequest, UpdateDocumentsRequest, UpdateDocumentsResponse,
};
use crate::AppState;

/// Create document routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/collections/{name}/documents",
            post(create_handler).patch(update_handler),
        )
        .route(
            "/collections/{name}/documents/{id}",
            get(get_handler).put(save_handler),
        )
}

/// POST /collections/{name}/documents - Create a document.
async fn create_handler(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(name): Path<String>,
    Json(request): Json<CreateDocumentRequest>,
) -> Result<(StatusCode, Json<DocumentResponse>)> {
    let doc = handle_create(&state.pool, &state.registry, &name, request).await?;
    Ok((StatusCode::CREATED, Json(doc)))
}

/// GET /collections/{name}/documents/{id} - Fetch a document.
async fn get_handler(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path((name, id)): Path<(String, String)>,
) -> Result<Json<DocumentResponse>> {
    let doc = handle_get(&state.pool, &state.registry, &name, &id).await?;
    Ok(Json(doc))
}

/// PUT /collections/{name}/documents/{id} - Save changes to a document.
async fn save_handler(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path((name, id)): Path<(String, String)>,
    Json(request): Json<SaveDocumentRequest>,
) -> Result<Json<DocumentResponse>> {
    let doc = handle_save(&state.pool, &state.registry, &name, &id, request).await?;
    Ok(Json(doc))
}

/// PATCH /collections/{name}/documents - Query-level update.
async fn update_handler(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(name): Path<String>,
    Json(request): Json<UpdateDocumentsRequest>,
) -> Result<Json<UpdateDocumentsResponse>> {
    let response = handle_update(&state.pool, &state.registry, &name, request).await?;
    Ok(Json(response))
}
