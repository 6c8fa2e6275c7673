//! Storage backends for counters.
//!
//! A backend supplies one atomic primitive, find-and-modify with optional
//! upsert, plus a plain read. The [`CounterStore`](crate::CounterStore)
//! builds every counter operation on top of these two.

use crate::{
    counter::{CounterKey, CounterRecord, CounterUpdate},
    error::Result,
};
use async_trait::async_trait;
use dashmap::{mapref::entry::Entry, DashMap};

/// Persistence primitive behind a counter store.
#[async_trait]
pub trait CounterBackend: Send + Sync {
    /// Read the record for `key` in `collection`.
    async fn find(&self, collection: &str, key: &CounterKey) -> Result<Option<CounterRecord>>;

    /// Atomically apply `update` to the record for `key` and return the
    /// post-update record.
    ///
    /// With `upsert`, a missing record is created holding
    /// [`CounterUpdate::initial`]. When that creation loses to a concurrent
    /// writer, implementations return [`Error::DuplicateKey`](crate::Error::DuplicateKey).
    /// Without `upsert`, a missing record yields `Ok(None)`. An update that
    /// would exceed the backend's range fails with
    /// [`Error::CounterOverflow`](crate::Error::CounterOverflow) and leaves
    /// the record unchanged.
    async fn find_and_modify(
        &self,
        collection: &str,
        key: &CounterKey,
        update: CounterUpdate,
        upsert: bool,
    ) -> Result<Option<CounterRecord>>;
}

/// In-process backend.
///
/// Each `(collection, key)` lives in a sharded map entry; the entry lock
/// makes find-and-modify atomic per key, so creation never races.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    counters: DashMap<(String, CounterKey), CounterRecord>,
}

impl MemoryBackend {
    /// Create an empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of counter records across all collections.
    pub fn len(&self) -> usize {
        self.counters.len()
    }

    /// Whether no counter record exists yet.
    pub fn is_empty(&self) -> bool {
        self.counters.is_empty()
    }
}

#[async_trait]
impl CounterBackend for MemoryBackend {
    async fn find(&self, collection: &str, key: &CounterKey) -> Result<Option<CounterRecord>> {
        Ok(self
            .counters
            .get(&(collection.to_string(), key.clone()))
            .map(|r| r.value().clone()))
    }

    async fn find_and_modify(
        &self,
        collection: &str,
        key: &CounterKey,
        update: CounterUpdate,
        upsert: bool,
    ) -> Result<Option<CounterRecord>> {
        match self.counters.entry((collection.to_string(), key.clone())) {
            Entry::Occupied(mut entry) => {
                let record = entry.get_mut();
                record.count = update.apply(record.count).ok_or_else(|| key.overflow())?;
                Ok(Some(record.clone()))
            }
            Entry::Vacant(entry) if upsert => {
                let record = CounterRecord::new(key, update.initial());
                entry.insert(record.clone());
                Ok(Some(record))
            }
            Entry::Vacant(_) => Ok(None),
        }
    }
}
