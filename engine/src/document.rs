//! In-flight documents with change tracking.

use crate::{error::Result, path, CollectionName, DocumentId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A document being created or saved.
///
/// Tracks whether it has been persisted and which paths were written since
/// it was loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    /// Unique identifier
    pub id: DocumentId,
    /// Collection (entity type) this document belongs to
    pub collection: CollectionName,
    /// The document body
    pub payload: serde_json::Value,
    #[serde(skip)]
    is_new: bool,
    #[serde(skip)]
    modified: BTreeSet<String>,
}

impl Document {
    /// Create a new, unsaved document with a fresh ID.
    ///
    /// Every top-level key already in `payload` counts as modified.
    pub fn new(collection: impl Into<CollectionName>, payload: serde_json::Value) -> Self {
        let modified = payload
            .as_object()
            .map(|obj| obj.keys().cloned().collect())
            .unwrap_or_default();

        Self {
            id: uuid::Uuid::new_v4().to_string(),
            collection: collection.into(),
            payload,
            is_new: true,
            modified,
        }
    }

    /// Rehydrate a persisted document with no pending modifications.
    pub fn loaded(
        id: impl Into<DocumentId>,
        collection: impl Into<CollectionName>,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            id: id.into(),
            collection: collection.into(),
            payload,
            is_new: false,
            modified: BTreeSet::new(),
        }
    }

    /// Whether the document has never been persisted.
    pub fn is_new(&self) -> bool {
        self.is_new
    }

    /// Whether `path`, a parent of it or a child of it was written.
    pub fn is_modified(&self, path: &str) -> bool {
        self.modified.iter().any(|m| path::overlaps(m, path))
    }

    /// Paths written since load.
    pub fn modified_paths(&self) -> impl Iterator<Item = &str> {
        self.modified.iter().map(String::as_str)
    }

    /// Value at `path`.
    pub fn get(&self, path: &str) -> Option<&serde_json::Value> {
        path::get(&self.payload, path)
    }

    /// Write `value` at `path` and mark it modified.
    pub fn set(&mut self, path: &str, value: serde_json::Value) -> Result<()> {
        path::set(&mut self.payload, path, value)?;
        self.modified.insert(path.to_string());
        Ok(())
    }

    /// Put every modified path among `paths` back to its value in
    /// `persisted`, removing it when `persisted` has none.
    ///
    /// Returns the paths that were restored.
    pub fn revert(&mut self, paths: &[&str], persisted: &serde_json::Value) -> Result<Vec<String>> {
        let mut reverted = Vec::new();
        for &target in paths {
            if !self.is_modified(target) {
                continue;
            }
            match path::get(persisted, target) {
                Some(original) => path::set(&mut self.payload, target, original.clone())?,
                None => {
                    path::remove(&mut self.payload, target);
                }
            }
            self.modified
                .retain(|m| !(m == target || m.starts_with(&format!("{target}."))));
            reverted.push(target.to_string());
        }
        Ok(reverted)
    }

    /// Record a successful write: the document is no longer new and has no
    /// pending modifications.
    pub fn mark_persisted(&mut self) {
        self.is_new = false;
        self.modified.clear();
    }
}
