//! Collections served by this instance and their auto-increment hooks.

use crate::config::ConfigError;
use autoinc_engine::{
    Autoincrement, AutoincrementOptions, CollectionSchema, CounterBackend, Error, FieldDef,
    FieldType, Schema,
};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

/// A served collection.
#[derive(Debug)]
pub struct RegisteredCollection {
    pub schema: CollectionSchema,
    /// Present when the schema declares auto-increment fields
    pub autoincrement: Option<Autoincrement>,
}

/// Every served collection, keyed by name.
#[derive(Debug, Default)]
pub struct Registry {
    collections: HashMap<String, RegisteredCollection>,
}

impl Registry {
    /// Register every collection of `schema`, installing auto-increment
    /// handling on those that need it.
    ///
    /// Each collection gets its own counter store handle; all of them share
    /// `backend` and the configured counter collection.
    pub fn new(
        schema: Schema,
        backend: Arc<dyn CounterBackend>,
        options: AutoincrementOptions,
    ) -> Self {
        let collections = schema
            .collections
            .into_iter()
            .map(|(name, collection)| {
                let autoincrement =
                    Autoincrement::new(&collection, backend.clone(), options.clone());
                if let Some(plugin) = &autoincrement {
                    tracing::info!(
                        collection = %name,
                        fields = plugin.fields().len(),
                        counter = plugin.counter_store().collection(),
                        "auto-increment enabled"
                    );
                }
                (
                    name,
                    RegisteredCollection {
                        schema: collection,
                        autoincrement,
                    },
                )
            })
            .collect();

        Self { collections }
    }

    /// Look up a collection.
    pub fn get(&self, name: &str) -> Result<&RegisteredCollection, Error> {
        self.collections
            .get(name)
            .ok_or_else(|| Error::CollectionNotFound(name.to_string()))
    }

    /// Names of all served collections.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.collections.keys().map(String::as_str)
    }
}

/// Load the schema from `path`, or fall back to [`default_schema`].
pub fn load_schema(path: Option<&Path>) -> Result<Schema, ConfigError> {
    match path {
        Some(path) => {
            let raw = std::fs::read_to_string(path)?;
            Ok(serde_json::from_str(&raw)?)
        }
        None => Ok(default_schema()),
    }
}

/// Built-in schema used when no schema file is configured.
pub fn default_schema() -> Schema {
    Schema::new().with_collection(CollectionSchema::new(
        "orders",
        vec![
            FieldDef::optional("code", FieldType::Int)
                .autoincrement()
                .immutable(),
            FieldDef::optional("number", FieldType::String).autoincrement(),
            FieldDef::optional("customer", FieldType::String),
            FieldDef::optional("total", FieldType::Float),
        ],
    ))
}
