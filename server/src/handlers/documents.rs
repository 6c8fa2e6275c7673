//! Document handlers - writes that run auto-increment hooks.

use crate::db::{self, Timestamps};
use crate::error::{AppError, Result};
use crate::registry::Registry;
use autoinc_engine::{Document, UpdateKind, UpdateQuery, UpdateResult};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

/// Request body for document creation.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateDocumentRequest {
    /// Initial document body
    #[serde(default = "empty_object")]
    pub payload: serde_json::Value,
}

/// Request body for saving changes to one document.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveDocumentRequest {
    /// Values to write, keyed by (dotted) field path
    pub changes: serde_json::Map<String, serde_json::Value>,
}

/// Request body for a query-level update.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateDocumentsRequest {
    pub kind: UpdateKind,
    #[serde(default)]
    pub filter: serde_json::Value,
    pub update: serde_json::Value,
}

/// A document with its row timestamps.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentResponse {
    #[serde(flatten)]
    pub document: Document,
    #[serde(flatten)]
    pub timestamps: Timestamps,
}

/// Response for a query-level update.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateDocumentsResponse {
    #[serde(flatten)]
    pub result: UpdateResult,
    /// For `findOneAndUpdate`, the matched document before the update
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document: Option<DocumentResponse>,
}

fn empty_object() -> serde_json::Value {
    serde_json::Value::Object(serde_json::Map::new())
}

fn not_found(id: &str) -> AppError {
    AppError::NotFound(format!("document {id}"))
}

/// Create a document, allocating its auto-increment fields.
pub async fn handle_create(
    pool: &PgPool,
    registry: &Registry,
    collection: &str,
    request: CreateDocumentRequest,
) -> Result<DocumentResponse> {
    let entry = registry.get(collection)?;
    if !request.payload.is_object() {
        return Err(AppError::BadRequest(
            "payload must be a JSON object".to_string(),
        ));
    }
    let mut doc = Document::new(collection, request.payload);

    if let Some(plugin) = &entry.autoincrement {
        plugin.pre_save(&mut doc).await?;
    }
    entry.schema.validate_payload(&doc.payload)?;

    let timestamps = db::insert_document(pool, &doc).await?;
    doc.mark_persisted();

    Ok(DocumentResponse {
        document: doc,
        timestamps,
    })
}

/// Fetch one document.
pub async fn handle_get(
    pool: &PgPool,
    registry: &Registry,
    collection: &str,
    id: &str,
) -> Result<DocumentResponse> {
    registry.get(collection)?;
    let stored = db::get_document(pool, collection, id)
        .await?
        .ok_or_else(|| not_found(id))?;
    Ok(DocumentResponse {
        document: stored.to_document(),
        timestamps: stored.timestamps,
    })
}

/// Write `changes` into a persisted document and save it.
///
/// Changes to immutable fields are dropped. Changed auto-increment fields
/// advance their counters. The row stays locked from read to write.
pub async fn handle_save(
    pool: &PgPool,
    registry: &Registry,
    collection: &str,
    id: &str,
    request: SaveDocumentRequest,
) -> Result<DocumentResponse> {
    let entry = registry.get(collection)?;
    let mut tx = pool.begin().await?;

    let stored = db::lock_document(&mut *tx, collection, id)
        .await?
        .ok_or_else(|| not_found(id))?;
    let mut doc = stored.to_document();

    for (path, value) in request.changes {
        doc.set(&path, value)?;
    }
    let reverted = doc.revert(&entry.schema.immutable_paths(), &stored.payload)?;
    if !reverted.is_empty() {
        tracing::debug!(collection, id, paths = ?reverted, "ignored writes to immutable fields");
    }

    if let Some(plugin) = &entry.autoincrement {
        plugin.pre_save(&mut doc).await?;
    }
    entry.schema.validate_payload(&doc.payload)?;

    let timestamps = db::replace_document(&mut *tx, collection, id, &doc.payload)
        .await?
        .ok_or_else(|| not_found(id))?;
    tx.commit().await?;
    doc.mark_persisted();

    Ok(DocumentResponse {
        document: doc,
        timestamps,
    })
}

/// Apply a query-level update to the matching documents.
///
/// Counters are reconciled before any document is written. Matching rows
/// are locked, every new payload is validated, and all writes commit
/// together.
pub async fn handle_update(
    pool: &PgPool,
    registry: &Registry,
    collection: &str,
    request: UpdateDocumentsRequest,
) -> Result<UpdateDocumentsResponse> {
    let entry = registry.get(collection)?;
    let query = UpdateQuery::new(request.kind, collection, request.filter, request.update);
    query.validate()?;

    if let Some(plugin) = &entry.autoincrement {
        plugin.pre_update(&query).await?;
    }

    let mut tx = pool.begin().await?;
    let candidates = db::lock_candidate_documents(&mut *tx, collection, &query.filter).await?;
    let mut matching = candidates
        .iter()
        .filter(|d| query.matches(&d.id, &d.payload));
    let selected: Vec<_> = if query.kind.is_multi() {
        matching.collect()
    } else {
        matching.next().into_iter().collect()
    };

    let immutable = entry.schema.immutable_paths();
    let mut staged = Vec::with_capacity(selected.len());
    for stored in &selected {
        let mut payload = stored.payload.clone();
        if query.apply_to(&mut payload, &immutable)? {
            entry.schema.validate_payload(&payload)?;
            staged.push((stored.id.as_str(), payload));
        }
    }

    let result = UpdateResult {
        matched: selected.len(),
        modified: staged.len(),
    };
    for (id, payload) in &staged {
        db::replace_document(&mut *tx, collection, id, payload).await?;
    }
    tx.commit().await?;

    let document = match query.kind {
        UpdateKind::FindOneAndUpdate => selected.first().map(|d| DocumentResponse {
            document: d.to_document(),
            timestamps: d.timestamps,
        }),
        _ => None,
    };

    tracing::debug!(
        collection,
        kind = %query.kind,
        matched = result.matched,
        modified = result.modified,
        "applied update"
    );

    Ok(UpdateDocumentsResponse { result, document })
}
