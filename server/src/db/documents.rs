//! Database operations for the documents table.

use autoinc_engine::{path, Document, Error};
use serde::Serialize;
use serde_json::{Map, Value};
use sqlx::{FromRow, PgExecutor, Row};

/// Row timestamps, returned alongside documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Timestamps {
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl<'r> FromRow<'r, sqlx::postgres::PgRow> for Timestamps {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(Timestamps {
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

/// A stored document row from the database.
#[derive(Debug)]
pub struct StoredDocument {
    pub id: String,
    pub collection: String,
    pub payload: Value,
    pub timestamps: Timestamps,
}

impl<'r> FromRow<'r, sqlx::postgres::PgRow> for StoredDocument {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(StoredDocument {
            id: row.try_get("id")?,
            collection: row.try_get("collection")?,
            payload: row.try_get("payload")?,
            timestamps: Timestamps::from_row(row)?,
        })
    }
}

impl StoredDocument {
    /// Convert the row to an engine document with no pending modifications.
    pub fn to_document(&self) -> Document {
        Document::loaded(
            self.id.clone(),
            self.collection.clone(),
            self.payload.clone(),
        )
    }
}

/// Insert a new document.
pub async fn insert_document<'e>(
    executor: impl PgExecutor<'e>,
    doc: &Document,
) -> Result<Timestamps, sqlx::Error> {
    sqlx::query_as::<_, Timestamps>(
        r#"
        INSERT INTO documents (id, collection, payload)
        VALUES ($1, $2, $3)
        RETURNING created_at, updated_at
        "#,
    )
    .bind(&doc.id)
    .bind(&doc.collection)
    .bind(&doc.payload)
    .fetch_one(executor)
    .await
}

/// Replace the payload of an existing document.
///
/// Returns `None` when no such document exists.
pub async fn replace_document<'e>(
    executor: impl PgExecutor<'e>,
    collection: &str,
    id: &str,
    payload: &Value,
) -> Result<Option<Timestamps>, sqlx::Error> {
    sqlx::query_as::<_, Timestamps>(
        r#"
        UPDATE documents SET payload = $3, updated_at = NOW()
        WHERE collection = $1 AND id = $2
        RETURNING created_at, updated_at
        "#,
    )
    .bind(collection)
    .bind(id)
    .bind(payload)
    .fetch_optional(executor)
    .await
}

/// Get a document by collection and ID.
pub async fn get_document<'e>(
    executor: impl PgExecutor<'e>,
    collection: &str,
    id: &str,
) -> Result<Option<StoredDocument>, sqlx::Error> {
    sqlx::query_as::<_, StoredDocument>(
        r#"
        SELECT id, collection, payload, created_at, updated_at
        FROM documents
        WHERE collection = $1 AND id = $2
        "#,
    )
    .bind(collection)
    .bind(id)
    .fetch_optional(executor)
    .await
}

/// Get a document and lock its row until the surrounding transaction ends.
pub async fn lock_document<'e>(
    executor: impl PgExecutor<'e>,
    collection: &str,
    id: &str,
) -> Result<Option<StoredDocument>, sqlx::Error> {
    sqlx::query_as::<_, StoredDocument>(
        r#"
        SELECT id, collection, payload, created_at, updated_at
        FROM documents
        WHERE collection = $1 AND id = $2
        FOR UPDATE
        "#,
    )
    .bind(collection)
    .bind(id)
    .fetch_optional(executor)
    .await
}

/// Lock the documents of a collection that may match `filter`, oldest first.
///
/// The filter is narrowed in SQL through JSONB containment; containment
/// accepts supersets of nested values, so callers still apply the exact
/// equality check to the returned rows.
pub async fn lock_candidate_documents<'e>(
    executor: impl PgExecutor<'e>,
    collection: &str,
    filter: &Value,
) -> Result<Vec<StoredDocument>, CandidateError> {
    let Some(candidates) = CandidateFilter::from_filter(filter)? else {
        return Ok(Vec::new());
    };

    let rows = sqlx::query_as::<_, StoredDocument>(
        r#"
        SELECT id, collection, payload, created_at, updated_at
        FROM documents
        WHERE collection = $1
          AND payload @> $2
          AND ($3::TEXT IS NULL OR id = $3)
        ORDER BY seq ASC
        FOR UPDATE
        "#,
    )
    .bind(collection)
    .bind(&candidates.contains)
    .bind(candidates.id.as_deref())
    .fetch_all(executor)
    .await?;

    Ok(rows)
}

/// Failure while selecting candidate documents.
#[derive(Debug, thiserror::Error)]
pub enum CandidateError {
    #[error(transparent)]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Filter(#[from] Error),
}

/// SQL-side narrowing of an equality filter.
#[derive(Debug, PartialEq)]
struct CandidateFilter {
    /// Nested object every candidate payload must contain
    contains: Value,
    /// Required document ID
    id: Option<String>,
}

impl CandidateFilter {
    /// `None` when no document can match.
    fn from_filter(filter: &Value) -> Result<Option<Self>, Error> {
        let mut contains = Value::Object(Map::new());
        let mut id = None;

        let Some(entries) = filter.as_object() else {
            if filter.is_null() {
                return Ok(Some(Self { contains, id }));
            }
            return Ok(None);
        };

        for (key, expected) in entries {
            if key == "_id" {
                match expected.as_str() {
                    Some(expected) => id = Some(expected.to_string()),
                    None => return Ok(None),
                }
            } else if !expected.is_null() {
                // `null` also matches a missing field, which containment cannot express
                path::set(&mut contains, key, expected.clone())?;
            }
        }

        Ok(Some(Self { contains, id }))
    }
}
