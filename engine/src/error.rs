//! Error types for the autoinc engine.

use crate::{CollectionName, DocumentId};
use thiserror::Error;

/// All possible errors from the autoinc engine.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    // Counter errors
    #[error("duplicate counter key: {entity_type}.{field_path}")]
    DuplicateKey {
        entity_type: String,
        field_path: String,
    },

    #[error("counter vanished during retry: {entity_type}.{field_path}")]
    CounterMissing {
        entity_type: String,
        field_path: String,
    },

    #[error("counter exhausted: {entity_type}.{field_path}")]
    CounterOverflow {
        entity_type: String,
        field_path: String,
    },

    #[error("backend error: {0}")]
    Backend(String),

    // Validation errors
    #[error("collection not found: {0}")]
    CollectionNotFound(CollectionName),

    #[error("document not found: {0}")]
    DocumentNotFound(DocumentId),

    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    #[error("invalid field path: '{0}'")]
    InvalidPath(String),

    #[error("invalid update: {0}")]
    InvalidUpdate(String),

    #[error("missing required field: {0}")]
    MissingRequiredField(String),

    #[error("type mismatch for field '{field}': expected {expected}, got {got}")]
    TypeMismatch {
        field: String,
        expected: String,
        got: String,
    },
}

impl Error {
    /// Whether this is the conflict reported when a concurrent writer created
    /// the same counter first.
    pub fn is_duplicate_key(&self) -> bool {
        matches!(self, Error::DuplicateKey { .. })
    }
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;
