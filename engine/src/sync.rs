//! Field synchronization - keeps counters in step with document writes.
//!
//! [`Autoincrement`] is installed on a collection as a [`DocumentHook`].
//! Before a save it allocates values for empty auto-increment fields of new
//! documents and advances counters past values written by hand. Before a
//! query-level update it advances counters past values assigned by the
//! update document.

use crate::{
    backend::CounterBackend,
    counter::{CounterStore, DEFAULT_COUNTER_NAME},
    error::Result,
    hook::{DocumentHook, HookEvent},
    schema::{CollectionSchema, FieldType},
    Count, Document, UpdateQuery,
};
use async_trait::async_trait;
use futures::future::try_join_all;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

/// Value representation of an auto-increment field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    /// Stored as a JSON number
    Integer,
    /// Stored as a JSON string of digits
    String,
}

impl FieldKind {
    /// Kind for a declared field type; `None` if it cannot auto-increment.
    pub fn from_field_type(field_type: FieldType) -> Option<Self> {
        match field_type {
            FieldType::Int => Some(FieldKind::Integer),
            FieldType::String => Some(FieldKind::String),
            _ => None,
        }
    }

    /// Render an allocated count in this representation.
    pub fn to_value(self, count: Count) -> Value {
        match self {
            FieldKind::Integer => Value::from(count),
            FieldKind::String => Value::String(count.to_string()),
        }
    }
}

/// An auto-increment field discovered in a schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutoincrementField {
    pub path: String,
    pub kind: FieldKind,
    /// Only set at creation; never reconciled from update paths
    pub immutable: bool,
}

/// Collect the auto-increment fields of a collection.
///
/// Fields flagged `autoincrement` with a type other than `Int` or `String`
/// are ignored.
pub fn autoincrement_fields(schema: &CollectionSchema) -> Vec<AutoincrementField> {
    let mut fields = Vec::new();
    schema.each_path(|path, def| {
        if !def.autoincrement {
            return;
        }
        if let Some(kind) = FieldKind::from_field_type(def.field_type) {
            fields.push(AutoincrementField {
                path: path.to_string(),
                kind,
                immutable: def.immutable,
            });
        }
    });
    fields
}

/// Plugin options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutoincrementOptions {
    /// Counter collection backing this plugin
    pub counter_name: String,
}

impl Default for AutoincrementOptions {
    fn default() -> Self {
        Self {
            counter_name: DEFAULT_COUNTER_NAME.to_string(),
        }
    }
}

/// Auto-increment hook for one collection schema.
#[derive(Debug, Clone)]
pub struct Autoincrement {
    counters: CounterStore,
    fields: Vec<AutoincrementField>,
}

enum SaveAction {
    Allocate,
    Advance(Count),
}

impl Autoincrement {
    /// Build the hook for `schema`.
    ///
    /// Returns `None` when the schema declares no usable auto-increment
    /// field, in which case nothing needs to be installed.
    pub fn new(
        schema: &CollectionSchema,
        backend: Arc<dyn CounterBackend>,
        options: AutoincrementOptions,
    ) -> Option<Self> {
        let fields = autoincrement_fields(schema);
        if fields.is_empty() {
            return None;
        }

        Some(Self {
            counters: CounterStore::new(backend, options.counter_name),
            fields,
        })
    }

    /// The counter store this hook allocates from.
    pub fn counter_store(&self) -> &CounterStore {
        &self.counters
    }

    /// All auto-increment fields.
    pub fn fields(&self) -> &[AutoincrementField] {
        &self.fields
    }

    fn mutable_fields(&self) -> impl Iterator<Item = &AutoincrementField> {
        self.fields.iter().filter(|f| !f.immutable)
    }

    /// Allocate or reconcile every auto-increment field of `doc`.
    ///
    /// Immutable fields are only considered while `doc` is new.
    /// All counter calls run concurrently; `doc` is only written once all of
    /// them have succeeded.
    pub async fn pre_save(&self, doc: &mut Document) -> Result<()> {
        let plan: Vec<(&AutoincrementField, SaveAction)> = self
            .fields
            .iter()
            .filter_map(|field| {
                let value = doc.get(&field.path);
                if doc.is_new() && is_falsy(value) {
                    Some((field, SaveAction::Allocate))
                } else if doc.is_modified(&field.path) && (doc.is_new() || !field.immutable) {
                    reconcilable(value).map(|n| (field, SaveAction::Advance(n)))
                } else {
                    None
                }
            })
            .collect();

        if plan.is_empty() {
            return Ok(());
        }

        let entity_type = doc.collection.as_str();
        let allocated = try_join_all(plan.iter().map(|(field, action)| async move {
            match action {
                SaveAction::Allocate => {
                    let n = self.counters.allocate_next(entity_type, &field.path).await?;
                    Ok::<_, crate::Error>(Some((*field, n)))
                }
                SaveAction::Advance(candidate) => {
                    let count = self
                        .counters
                        .force_advance(entity_type, &field.path, *candidate)
                        .await?;
                    tracing::debug!(
                        entity_type,
                        path = %field.path,
                        candidate,
                        count,
                        "reconciled counter on save"
                    );
                    Ok(None)
                }
            }
        }))
        .await?;

        for (field, n) in allocated.into_iter().flatten() {
            doc.set(&field.path, field.kind.to_value(n))?;
        }

        Ok(())
    }

    /// Advance counters past values assigned by a query-level update.
    ///
    /// Immutable fields are skipped. The update itself is left untouched.
    pub async fn pre_update(&self, query: &UpdateQuery) -> Result<()> {
        let entity_type = query.collection.as_str();
        let advances = self.mutable_fields().filter_map(|field| {
            let candidate = reconcilable(query.get(&field.path))?;
            Some(async move {
                let count = self
                    .counters
                    .force_advance(entity_type, &field.path, candidate)
                    .await?;
                tracing::debug!(
                    entity_type,
                    path = %field.path,
                    kind = %query.kind,
                    candidate,
                    count,
                    "reconciled counter on update"
                );
                Ok::<_, crate::Error>(())
            })
        });

        try_join_all(advances).await?;
        Ok(())
    }
}

#[async_trait]
impl DocumentHook for Autoincrement {
    fn events(&self) -> Vec<HookEvent> {
        let mut events = vec![HookEvent::Save];
        if self.mutable_fields().next().is_some() {
            events.extend([
                HookEvent::FindOneAndUpdate,
                HookEvent::UpdateOne,
                HookEvent::UpdateMany,
                HookEvent::Update,
            ]);
        }
        events
    }

    async fn pre_save(&self, doc: &mut Document) -> Result<()> {
        Autoincrement::pre_save(self, doc).await
    }

    async fn pre_update(&self, query: &UpdateQuery) -> Result<()> {
        Autoincrement::pre_update(self, query).await
    }
}

/// Numeric reading of a field value; `None` means "not a number".
///
/// Missing values are not numbers, `null` and blank strings read as 0,
/// booleans as 0 or 1, strings by their trimmed numeric content.
fn numeric(value: Option<&Value>) -> Option<f64> {
    match value? {
        Value::Null => Some(0.0),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let s = s.trim();
            if s.is_empty() {
                Some(0.0)
            } else {
                s.parse::<f64>().ok().filter(|n| n.is_finite())
            }
        }
        Value::Array(_) | Value::Object(_) => None,
    }
}

/// Empty for allocation purposes: missing, not a number, or zero.
///
/// A new document explicitly holding `0` or `""` is therefore still
/// allocated a value.
fn is_falsy(value: Option<&Value>) -> bool {
    numeric(value).map_or(true, |n| n == 0.0)
}

/// The counter candidate a written value represents, if it is a
/// non-negative integer.
fn reconcilable(value: Option<&Value>) -> Option<Count> {
    match value {
        Some(Value::Number(n)) if n.is_u64() => n.as_u64(),
        Some(Value::String(s)) if s.trim().parse::<Count>().is_ok() => s.trim().parse().ok(),
        _ => numeric(value)
            .filter(|n| n.fract() == 0.0 && *n >= 0.0 && *n <= Count::MAX as f64)
            .map(|n| n as Count),
    }
}
