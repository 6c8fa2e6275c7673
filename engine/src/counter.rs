//! Counter store - persistent per-(entity type, field path) counters.
//!
//! Every operation is a single atomic find-and-modify against the backend
//! with upsert enabled. Two concurrent first writers can both try to create
//! the record; the loser gets [`Error::DuplicateKey`] and retries once as a
//! plain modify, which succeeds because the record now exists.

use crate::{backend::CounterBackend, error::Result, Count, Error};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Default name of the counter collection.
pub const DEFAULT_COUNTER_NAME: &str = "__Autoincrement_Counter";

/// Normalized identity of a counter record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CounterKey {
    /// Owning entity type (trimmed, lowercased)
    pub entity_type: String,
    /// Field path within the entity (trimmed, lowercased)
    pub field_path: String,
}

impl CounterKey {
    /// Build a key, normalizing both components.
    pub fn new(entity_type: &str, field_path: &str) -> Self {
        Self {
            entity_type: normalize(entity_type),
            field_path: normalize(field_path),
        }
    }

    pub(crate) fn duplicate(&self) -> Error {
        Error::DuplicateKey {
            entity_type: self.entity_type.clone(),
            field_path: self.field_path.clone(),
        }
    }

    pub(crate) fn overflow(&self) -> Error {
        Error::CounterOverflow {
            entity_type: self.entity_type.clone(),
            field_path: self.field_path.clone(),
        }
    }

    fn missing(&self) -> Error {
        Error::CounterMissing {
            entity_type: self.entity_type.clone(),
            field_path: self.field_path.clone(),
        }
    }
}

fn normalize(s: &str) -> String {
    s.trim().to_lowercase()
}

/// A stored counter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CounterRecord {
    pub entity_type: String,
    pub field_path: String,
    /// Highest value allocated or observed so far
    pub count: Count,
}

impl CounterRecord {
    /// Create a record for `key` holding `count`.
    pub fn new(key: &CounterKey, count: Count) -> Self {
        Self {
            entity_type: key.entity_type.clone(),
            field_path: key.field_path.clone(),
            count,
        }
    }
}

/// Modification applied atomically to a counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", content = "value", rename_all = "lowercase")]
pub enum CounterUpdate {
    /// `count += n`
    Increment(Count),
    /// `count = max(count, n)`
    Max(Count),
    /// `count = n`
    Set(Count),
}

impl CounterUpdate {
    /// Apply to an existing count; `None` when an increment would overflow.
    pub fn apply(self, current: Count) -> Option<Count> {
        match self {
            CounterUpdate::Increment(n) => current.checked_add(n),
            CounterUpdate::Max(n) => Some(current.max(n)),
            CounterUpdate::Set(n) => Some(n),
        }
    }

    /// Value of a record created by this update (an absent record counts as 0).
    pub fn initial(self) -> Count {
        match self {
            CounterUpdate::Increment(n) | CounterUpdate::Max(n) | CounterUpdate::Set(n) => n,
        }
    }
}

/// Handle to the counters of one counter collection.
///
/// Cheap to clone; clones share the backend.
#[derive(Clone)]
pub struct CounterStore {
    backend: Arc<dyn CounterBackend>,
    collection: String,
}

impl std::fmt::Debug for CounterStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CounterStore")
            .field("collection", &self.collection)
            .finish_non_exhaustive()
    }
}

impl CounterStore {
    /// Create a store over `backend`, isolated under `collection`.
    pub fn new(backend: Arc<dyn CounterBackend>, collection: impl Into<String>) -> Self {
        Self {
            backend,
            collection: collection.into(),
        }
    }

    /// Name of the counter collection this store writes to.
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Current count, or 0 if the counter was never touched.
    pub async fn get_current(&self, entity_type: &str, field_path: &str) -> Result<Count> {
        let key = CounterKey::new(entity_type, field_path);
        let record = self.backend.find(&self.collection, &key).await?;
        Ok(record.map(|r| r.count).unwrap_or(0))
    }

    /// Increment the counter and return the new value.
    pub async fn allocate_next(&self, entity_type: &str, field_path: &str) -> Result<Count> {
        let key = CounterKey::new(entity_type, field_path);
        let record = self
            .update_current(&key, CounterUpdate::Increment(1))
            .await?;
        tracing::trace!(
            entity_type = %key.entity_type,
            field_path = %key.field_path,
            count = record.count,
            "allocated counter value"
        );
        Ok(record.count)
    }

    /// Raise the counter to `candidate` if it is below it.
    pub async fn force_advance(
        &self,
        entity_type: &str,
        field_path: &str,
        candidate: Count,
    ) -> Result<Count> {
        let key = CounterKey::new(entity_type, field_path);
        let record = self.update_current(&key, CounterUpdate::Max(candidate)).await?;
        Ok(record.count)
    }

    /// Overwrite the counter unconditionally.
    pub async fn force_set(&self, entity_type: &str, field_path: &str, value: Count) -> Result<()> {
        let key = CounterKey::new(entity_type, field_path);
        self.update_current(&key, CounterUpdate::Set(value)).await?;
        Ok(())
    }

    /// Administrative alias of [`CounterStore::force_set`].
    pub async fn set_current(&self, entity_type: &str, field_path: &str, value: Count) -> Result<()> {
        self.force_set(entity_type, field_path, value).await
    }

    async fn update_current(&self, key: &CounterKey, update: CounterUpdate) -> Result<CounterRecord> {
        let upserted = self
            .backend
            .find_and_modify(&self.collection, key, update, true)
            .await;

        match upserted {
            Ok(Some(record)) => Ok(record),
            Ok(None) => Err(key.missing()),
            Err(e) if e.is_duplicate_key() => {
                tracing::debug!(
                    entity_type = %key.entity_type,
                    field_path = %key.field_path,
                    "lost counter creation race, retrying as update"
                );
                self.backend
                    .find_and_modify(&self.collection, key, update, false)
                    .await?
                    .ok_or_else(|| key.missing())
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;
    use proptest::prelude::*;

    fn store() -> CounterStore {
        CounterStore::new(Arc::new(MemoryBackend::new()), DEFAULT_COUNTER_NAME)
    }

    #[test]
    fn key_normalization() {
        let key = CounterKey::new("  Order ", "Meta.Code ");
        assert_eq!(key.entity_type, "order");
        assert_eq!(key.field_path, "meta.code");
        assert_eq!(key, CounterKey::new("ORDER", "meta.code"));
    }

    #[test]
    fn update_application() {
        assert_eq!(CounterUpdate::Increment(1).apply(4), Some(5));
        assert_eq!(CounterUpdate::Max(3).apply(4), Some(4));
        assert_eq!(CounterUpdate::Max(9).apply(4), Some(9));
        assert_eq!(CounterUpdate::Set(2).apply(4), Some(2));
        assert_eq!(CounterUpdate::Increment(1).initial(), 1);
        assert_eq!(CounterUpdate::Max(7).initial(), 7);
    }

    #[test]
    fn increment_at_max_is_refused() {
        assert_eq!(CounterUpdate::Increment(1).apply(u64::MAX), None);
        assert_eq!(CounterUpdate::Increment(2).apply(u64::MAX - 1), None);
        assert_eq!(CounterUpdate::Max(u64::MAX).apply(u64::MAX), Some(u64::MAX));
    }

    #[tokio::test]
    async fn exhausted_counter_never_repeats_a_value() {
        let store = store();
        store.force_advance("order", "code", u64::MAX).await.unwrap();

        for _ in 0..2 {
            let err = store.allocate_next("order", "code").await.unwrap_err();
            assert_eq!(
                err,
                Error::CounterOverflow {
                    entity_type: "order".into(),
                    field_path: "code".into(),
                }
            );
        }
        assert_eq!(store.get_current("order", "code").await.unwrap(), u64::MAX);
    }

    proptest! {
        #[test]
        fn max_never_decreases(current in any::<u64>(), candidate in any::<u64>()) {
            let next = CounterUpdate::Max(candidate).apply(current).unwrap();
            prop_assert!(next >= current);
            prop_assert!(next >= candidate);
        }

        #[test]
        fn increment_is_strictly_increasing(current in 0u64..u64::MAX) {
            prop_assert!(CounterUpdate::Increment(1).apply(current).unwrap() > current);
        }
    }

    #[tokio::test]
    async fn get_current_missing_is_zero() {
        let store = store();
        assert_eq!(store.get_current("order", "code").await.unwrap(), 0);
        // Reading does not create a record
        assert_eq!(store.get_current("order", "code").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn allocate_sequential() {
        let store = store();
        assert_eq!(store.allocate_next("order", "code").await.unwrap(), 1);
        assert_eq!(store.allocate_next("order", "code").await.unwrap(), 2);
        assert_eq!(store.get_current("Order", "code").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn force_advance_only_raises() {
        let store = store();
        assert_eq!(store.force_advance("order", "code", 10).await.unwrap(), 10);
        assert_eq!(store.force_advance("order", "code", 3).await.unwrap(), 10);
        assert_eq!(store.allocate_next("order", "code").await.unwrap(), 11);
    }

    #[tokio::test]
    async fn force_set_can_lower() {
        let store = store();
        store.force_advance("order", "code", 10).await.unwrap();
        store.set_current("order", "code", 2).await.unwrap();
        assert_eq!(store.get_current("order", "code").await.unwrap(), 2);
        assert_eq!(store.allocate_next("order", "code").await.unwrap(), 3);
    }

    #[tokio::test]
    async fn collections_are_isolated() {
        let backend: Arc<dyn CounterBackend> = Arc::new(MemoryBackend::new());
        let a = CounterStore::new(backend.clone(), "a");
        let b = CounterStore::new(backend, "b");

        a.allocate_next("order", "code").await.unwrap();
        a.allocate_next("order", "code").await.unwrap();

        assert_eq!(a.get_current("order", "code").await.unwrap(), 2);
        assert_eq!(b.get_current("order", "code").await.unwrap(), 0);
        assert_eq!(b.allocate_next("order", "code").await.unwrap(), 1);
    }
}
