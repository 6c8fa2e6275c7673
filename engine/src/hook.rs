//! Lifecycle hooks around document writes.

use crate::{error::Result, Document, UpdateKind, UpdateQuery};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Write events a hook can subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum HookEvent {
    Save,
    FindOneAndUpdate,
    UpdateOne,
    UpdateMany,
    Update,
}

impl From<UpdateKind> for HookEvent {
    fn from(kind: UpdateKind) -> Self {
        match kind {
            UpdateKind::FindOneAndUpdate => HookEvent::FindOneAndUpdate,
            UpdateKind::UpdateOne => HookEvent::UpdateOne,
            UpdateKind::UpdateMany => HookEvent::UpdateMany,
            UpdateKind::Update => HookEvent::Update,
        }
    }
}

/// Code run before a write is committed.
///
/// An error from any hook aborts the write.
#[async_trait]
pub trait DocumentHook: Send + Sync {
    /// Events this hook runs for.
    fn events(&self) -> Vec<HookEvent>;

    /// Runs before a document is inserted or replaced.
    async fn pre_save(&self, _doc: &mut Document) -> Result<()> {
        Ok(())
    }

    /// Runs before a query-level update executes.
    async fn pre_update(&self, _query: &UpdateQuery) -> Result<()> {
        Ok(())
    }
}
