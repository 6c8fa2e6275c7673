//! Unified error handling for the server.

use autoinc_engine::Error as EngineError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Application error type.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

impl From<crate::db::CandidateError> for AppError {
    fn from(e: crate::db::CandidateError) -> Self {
        match e {
            crate::db::CandidateError::Database(e) => AppError::Database(e),
            crate::db::CandidateError::Filter(e) => AppError::Engine(e),
        }
    }
}

/// Error response body.
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message, details) = match &self {
            AppError::Database(e) => {
                tracing::error!("Database error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Database error".to_string(),
                    None,
                )
            }
            AppError::Engine(e) => engine_status(e),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone(), None),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone(), None),
        };

        let body = Json(ErrorResponse {
            error: error_message,
            details,
        });

        (status, body).into_response()
    }
}

fn engine_status(e: &EngineError) -> (StatusCode, String, Option<String>) {
    match e {
        EngineError::CollectionNotFound(_) | EngineError::DocumentNotFound(_) => {
            (StatusCode::NOT_FOUND, e.to_string(), None)
        }
        EngineError::Backend(msg) => {
            tracing::error!("Counter backend error: {}", msg);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Counter backend error".to_string(),
                Some(msg.clone()),
            )
        }
        EngineError::DuplicateKey { .. }
        | EngineError::CounterMissing { .. }
        | EngineError::CounterOverflow { .. } => {
            tracing::error!("Counter error: {}", e);
            (
                StatusCode::CONFLICT,
                "Counter conflict".to_string(),
                Some(e.to_string()),
            )
        }
        _ => {
            tracing::warn!("Engine error: {:?}", e);
            (StatusCode::BAD_REQUEST, e.to_string(), None)
        }
    }
}

/// Result type alias for handlers.
pub type Result<T> = std::result::Result<T, AppError>;
