//! Counter backend over the autoinc_counters table.
//!
//! Find-and-modify is an `UPDATE ... RETURNING`; when nothing matched and an
//! upsert was requested it becomes an `INSERT ... RETURNING`. Two first
//! writers racing on the insert hit the table's unique constraint, which is
//! reported as [`Error::DuplicateKey`] so the counter store can retry.

use async_trait::async_trait;
use autoinc_engine::{CounterBackend, CounterKey, CounterRecord, CounterUpdate, Error};
use sqlx::{PgPool, Row};

/// Counter backend storing records in PostgreSQL.
#[derive(Debug, Clone)]
pub struct PgCounterBackend {
    pool: PgPool,
}

impl PgCounterBackend {
    /// Create a backend over `pool`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CounterBackend for PgCounterBackend {
    async fn find(
        &self,
        collection: &str,
        key: &CounterKey,
    ) -> autoinc_engine::error::Result<Option<CounterRecord>> {
        let row = sqlx::query(
            r#"
            SELECT entity_type, field_path, count
            FROM autoinc_counters
            WHERE collection = $1 AND entity_type = $2 AND field_path = $3
            "#,
        )
        .bind(collection)
        .bind(&key.entity_type)
        .bind(&key.field_path)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend_error)?;

        row.as_ref().map(to_record).transpose()
    }

    async fn find_and_modify(
        &self,
        collection: &str,
        key: &CounterKey,
        update: CounterUpdate,
        upsert: bool,
    ) -> autoinc_engine::error::Result<Option<CounterRecord>> {
        let (sql, operand) = match update {
            CounterUpdate::Increment(n) => (
                r#"
                UPDATE autoinc_counters SET count = count + $4
                WHERE collection = $1 AND entity_type = $2 AND field_path = $3
                RETURNING entity_type, field_path, count
                "#,
                n,
            ),
            CounterUpdate::Max(n) => (
                r#"
                UPDATE autoinc_counters SET count = GREATEST(count, $4)
                WHERE collection = $1 AND entity_type = $2 AND field_path = $3
                RETURNING entity_type, field_path, count
                "#,
                n,
            ),
            CounterUpdate::Set(n) => (
                r#"
                UPDATE autoinc_counters SET count = $4
                WHERE collection = $1 AND entity_type = $2 AND field_path = $3
                RETURNING entity_type, field_path, count
                "#,
                n,
            ),
        };

        let updated = sqlx::query(sql)
            .bind(collection)
            .bind(&key.entity_type)
            .bind(&key.field_path)
            .bind(to_db_count(key, operand)?)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| modify_error(key, e))?;

        if let Some(row) = updated {
            return to_record(&row).map(Some);
        }
        if !upsert {
            return Ok(None);
        }

        let inserted = sqlx::query(
            r#"
            INSERT INTO autoinc_counters (collection, entity_type, field_path, count)
            VALUES ($1, $2, $3, $4)
            RETURNING entity_type, field_path, count
            "#,
        )
        .bind(collection)
        .bind(&key.entity_type)
        .bind(&key.field_path)
        .bind(to_db_count(key, update.initial())?)
        .fetch_one(&self.pool)
        .await;

        match inserted {
            Ok(row) => to_record(&row).map(Some),
            Err(e) if is_unique_violation(&e) => Err(Error::DuplicateKey {
                entity_type: key.entity_type.clone(),
                field_path: key.field_path.clone(),
            }),
            Err(e) => Err(backend_error(e)),
        }
    }
}

fn to_record(row: &sqlx::postgres::PgRow) -> autoinc_engine::error::Result<CounterRecord> {
    let count: i64 = row.try_get("count").map_err(backend_error)?;
    Ok(CounterRecord {
        entity_type: row.try_get("entity_type").map_err(backend_error)?,
        field_path: row.try_get("field_path").map_err(backend_error)?,
        count: u64::try_from(count)
            .map_err(|_| Error::Backend(format!("negative counter value: {count}")))?,
    })
}

/// Counts live in a BIGINT column, so values above `i64::MAX` are out of range.
fn to_db_count(key: &CounterKey, count: u64) -> autoinc_engine::error::Result<i64> {
    i64::try_from(count).map_err(|_| overflow(key))
}

fn overflow(key: &CounterKey) -> Error {
    Error::CounterOverflow {
        entity_type: key.entity_type.clone(),
        field_path: key.field_path.clone(),
    }
}

fn backend_error(e: sqlx::Error) -> Error {
    Error::Backend(e.to_string())
}

fn modify_error(key: &CounterKey, e: sqlx::Error) -> Error {
    if has_code(&e, "22003") {
        overflow(key)
    } else {
        backend_error(e)
    }
}

/// Check if a SQL error is a unique constraint violation.
fn is_unique_violation(e: &sqlx::Error) -> bool {
    has_code(e, "23505")
}

fn has_code(e: &sqlx::Error, code: &str) -> bool {
    match e {
        sqlx::Error::Database(db_err) => db_err.code().is_some_and(|c| c == code),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use autoinc_engine::CounterStore;
    use std::collections::BTreeSet;
    use std::sync::Arc;

    #[test]
    fn count_conversion_bounds() {
        let key = CounterKey::new("order", "code");
        assert_eq!(to_db_count(&key, 42).unwrap(), 42);
        assert_eq!(to_db_count(&key, i64::MAX as u64).unwrap(), i64::MAX);
        assert!(matches!(
            to_db_count(&key, u64::MAX),
            Err(Error::CounterOverflow { .. })
        ));
    }

    #[test]
    fn non_database_errors_are_not_conflicts() {
        assert!(!is_unique_violation(&sqlx::Error::RowNotFound));
    }

    fn counter_collection() -> String {
        format!("counters_{}", uuid::Uuid::new_v4().simple())
    }

    #[tokio::test]
    #[ignore = "requires DATABASE_URL"]
    async fn concurrent_first_allocations_are_unique() {
        let pool = crate::db::test_pool().await;
        let store = CounterStore::new(Arc::new(PgCounterBackend::new(pool)), counter_collection());

        let handles: Vec<_> = (0..32)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move { store.allocate_next("orders", "code").await.unwrap() })
            })
            .collect();

        let mut values = BTreeSet::new();
        for handle in handles {
            assert!(values.insert(handle.await.unwrap()));
        }
        assert_eq!(values, (1..=32).collect());
        assert_eq!(store.get_current("orders", "code").await.unwrap(), 32);
    }

    #[tokio::test]
    #[ignore = "requires DATABASE_URL"]
    async fn second_insert_is_a_unique_violation() {
        let pool = crate::db::test_pool().await;
        let collection = counter_collection();
        let insert = || {
            sqlx::query(
                "INSERT INTO autoinc_counters (collection, entity_type, field_path, count) \
                 VALUES ($1, 'orders', 'code', 1)",
            )
            .bind(&collection)
            .execute(&pool)
        };

        insert().await.unwrap();
        let err = insert().await.unwrap_err();
        assert!(is_unique_violation(&err));

        // The record the competitor created is picked up by a plain modify
        let backend = PgCounterBackend::new(pool.clone());
        let record = backend
            .find_and_modify(&collection, &CounterKey::new("orders", "code"), CounterUpdate::Increment(1), false)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.count, 2);
    }

    #[tokio::test]
    #[ignore = "requires DATABASE_URL"]
    async fn bigint_overflow_is_reported() {
        let pool = crate::db::test_pool().await;
        let collection = counter_collection();
        let backend = PgCounterBackend::new(pool);
        let key = CounterKey::new("orders", "code");

        backend
            .find_and_modify(&collection, &key, CounterUpdate::Set(i64::MAX as u64), true)
            .await
            .unwrap();
        let err = backend
            .find_and_modify(&collection, &key, CounterUpdate::Increment(1), true)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::CounterOverflow { .. }));

        let record = backend.find(&collection, &key).await.unwrap().unwrap();
        assert_eq!(record.count, i64::MAX as u64);
    }
}
