//! Model - an in-memory collection of documents with write hooks.
//!
//! A model owns the documents of one collection schema, runs the hooks
//! registered for each write event, validates payloads and applies
//! query-level updates.

use crate::{
    backend::CounterBackend,
    counter::CounterStore,
    error::Result,
    hook::{DocumentHook, HookEvent},
    query::filter_matches,
    sync::{Autoincrement, AutoincrementOptions},
    CollectionSchema, Document, DocumentId, Error, UpdateKind, UpdateQuery,
};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

#[derive(Debug, Clone)]
struct StoredDocument {
    id: DocumentId,
    payload: Value,
}

/// Outcome of a query-level update.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateResult {
    /// Documents matched by the filter (and selected by the update kind)
    pub matched: usize,
    /// Documents whose payload actually changed
    pub modified: usize,
}

/// A collection of documents bound to one schema.
pub struct Model {
    schema: CollectionSchema,
    // Insertion order is the natural order for `find_one`.
    documents: RwLock<Vec<StoredDocument>>,
    hooks: Vec<Arc<dyn DocumentHook>>,
    counters: Option<CounterStore>,
}

impl std::fmt::Debug for Model {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Model")
            .field("name", &self.schema.name)
            .field("documents", &self.documents.read().len())
            .field("hooks", &self.hooks.len())
            .field("counters", &self.counters)
            .finish()
    }
}

impl Model {
    /// Create an empty model for `schema`.
    pub fn new(schema: CollectionSchema) -> Self {
        Self {
            schema,
            documents: RwLock::new(Vec::new()),
            hooks: Vec::new(),
            counters: None,
        }
    }

    /// Install auto-increment handling for the schema's fields.
    ///
    /// A schema without auto-increment fields is left unchanged.
    pub fn with_autoincrement(
        mut self,
        backend: Arc<dyn CounterBackend>,
        options: AutoincrementOptions,
    ) -> Self {
        if let Some(plugin) = Autoincrement::new(&self.schema, backend, options) {
            self.counters = Some(plugin.counter_store().clone());
            self.hooks.push(Arc::new(plugin));
        }
        self
    }

    /// Register an additional hook.
    pub fn plugin(mut self, hook: Arc<dyn DocumentHook>) -> Self {
        self.hooks.push(hook);
        self
    }

    /// Collection name; also the entity type of its counters.
    pub fn name(&self) -> &str {
        &self.schema.name
    }

    /// The schema.
    pub fn schema(&self) -> &CollectionSchema {
        &self.schema
    }

    /// Counter store installed by [`Model::with_autoincrement`], for
    /// administrative reads and writes.
    pub fn counter_store(&self) -> Option<&CounterStore> {
        self.counters.as_ref()
    }

    /// Start a new, unsaved document.
    pub fn new_document(&self, payload: Value) -> Document {
        Document::new(self.schema.name.clone(), payload)
    }

    /// Number of stored documents.
    pub fn len(&self) -> usize {
        self.documents.read().len()
    }

    /// Whether no document is stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn hooks_for(&self, event: HookEvent) -> impl Iterator<Item = &Arc<dyn DocumentHook>> {
        self.hooks
            .iter()
            .filter(move |hook| hook.events().contains(&event))
    }

    /// Insert a new document or replace a persisted one.
    ///
    /// Writes to immutable fields of a persisted document are dropped. Save
    /// hooks run next; their failure aborts the save.
    pub async fn save(&self, doc: &mut Document) -> Result<()> {
        if doc.collection != self.schema.name {
            return Err(Error::CollectionNotFound(doc.collection.clone()));
        }

        if !doc.is_new() {
            let persisted = self
                .documents
                .read()
                .iter()
                .find(|d| d.id == doc.id)
                .map(|d| d.payload.clone())
                .ok_or_else(|| Error::DocumentNotFound(doc.id.clone()))?;
            let reverted = doc.revert(&self.schema.immutable_paths(), &persisted)?;
            if !reverted.is_empty() {
                tracing::debug!(
                    collection = %self.schema.name,
                    id = %doc.id,
                    paths = ?reverted,
                    "ignored writes to immutable fields"
                );
            }
        }

        for hook in self.hooks_for(HookEvent::Save) {
            hook.pre_save(doc).await?;
        }

        self.schema.validate_payload(&doc.payload)?;

        {
            let mut documents = self.documents.write();
            if doc.is_new() {
                documents.push(StoredDocument {
                    id: doc.id.clone(),
                    payload: doc.payload.clone(),
                });
            } else {
                let stored = documents
                    .iter_mut()
                    .find(|d| d.id == doc.id)
                    .ok_or_else(|| Error::DocumentNotFound(doc.id.clone()))?;
                stored.payload = doc.payload.clone();
            }
        }

        doc.mark_persisted();
        Ok(())
    }

    /// Get a document by ID.
    pub fn find_by_id(&self, id: &str) -> Option<Document> {
        self.documents
            .read()
            .iter()
            .find(|d| d.id == id)
            .map(|d| self.load(d))
    }

    /// All documents matching an equality filter.
    pub fn find(&self, filter: &Value) -> Vec<Document> {
        self.documents
            .read()
            .iter()
            .filter(|d| filter_matches(filter, &d.id, &d.payload))
            .map(|d| self.load(d))
            .collect()
    }

    /// The first document matching an equality filter.
    pub fn find_one(&self, filter: &Value) -> Option<Document> {
        self.documents
            .read()
            .iter()
            .find(|d| filter_matches(filter, &d.id, &d.payload))
            .map(|d| self.load(d))
    }

    fn load(&self, stored: &StoredDocument) -> Document {
        Document::loaded(
            stored.id.clone(),
            self.schema.name.clone(),
            stored.payload.clone(),
        )
    }

    /// Update the first match and return it as it was before the update.
    pub async fn find_one_and_update(&self, filter: Value, update: Value) -> Result<Option<Document>> {
        let query = self.query(UpdateKind::FindOneAndUpdate, filter, update);
        let (_, before) = self.execute(&query).await?;
        Ok(before)
    }

    /// Update the first match.
    pub async fn update_one(&self, filter: Value, update: Value) -> Result<UpdateResult> {
        let query = self.query(UpdateKind::UpdateOne, filter, update);
        Ok(self.execute(&query).await?.0)
    }

    /// Update every match.
    pub async fn update_many(&self, filter: Value, update: Value) -> Result<UpdateResult> {
        let query = self.query(UpdateKind::UpdateMany, filter, update);
        Ok(self.execute(&query).await?.0)
    }

    /// Deprecated generic update; updates the first match.
    #[deprecated(note = "use update_one or update_many")]
    pub async fn update(&self, filter: Value, update: Value) -> Result<UpdateResult> {
        let query = self.query(UpdateKind::Update, filter, update);
        Ok(self.execute(&query).await?.0)
    }

    fn query(&self, kind: UpdateKind, filter: Value, update: Value) -> UpdateQuery {
        UpdateQuery::new(kind, self.schema.name.clone(), filter, update)
    }

    /// Run update hooks, then apply `query` to the selected documents.
    ///
    /// All new payloads are validated before any of them is written.
    pub async fn execute(&self, query: &UpdateQuery) -> Result<(UpdateResult, Option<Document>)> {
        query.validate()?;

        for hook in self.hooks_for(query.kind.into()) {
            hook.pre_update(query).await?;
        }

        let immutable = self.schema.immutable_paths();
        let mut documents = self.documents.write();

        let selected: Vec<usize> = {
            let mut matching = documents
                .iter()
                .enumerate()
                .filter(|(_, d)| query.matches(&d.id, &d.payload))
                .map(|(i, _)| i);
            if query.kind.is_multi() {
                matching.collect()
            } else {
                matching.next().into_iter().collect()
            }
        };

        let first_before = selected.first().map(|&i| self.load(&documents[i]));

        let mut staged = Vec::with_capacity(selected.len());
        for &i in &selected {
            let mut payload = documents[i].payload.clone();
            if query.apply_to(&mut payload, &immutable)? {
                self.schema.validate_payload(&payload)?;
                staged.push((i, payload));
            }
        }

        let result = UpdateResult {
            matched: selected.len(),
            modified: staged.len(),
        };
        for (i, payload) in staged {
            documents[i].payload = payload;
        }

        tracing::trace!(
            collection = %self.schema.name,
            kind = %query.kind,
            matched = result.matched,
            modified = result.modified,
            "applied update"
        );

        Ok((result, first_before))
    }
}
