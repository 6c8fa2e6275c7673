//! # Autoinc Engine
//!
//! Per-field auto-increment counters for document stores.
//!
//! Documents declare auto-increment fields in their schema. When a new
//! document is saved with such a field empty, the next value is drawn from a
//! persistent counter keyed by (entity type, field path). When a value is
//! written by hand, through a save or a query-level update, the counter is
//! advanced past it so later allocations never collide with it.
//!
//! ## Core Concepts
//!
//! ### Counter Store
//!
//! [`CounterStore`] hands out values from a [`CounterBackend`]. Every
//! operation is one atomic find-and-modify with upsert; a lost creation race
//! surfaces as [`Error::DuplicateKey`] and is retried once as a plain update.
//!
//! - [`CounterStore::get_current`] - read, 0 when missing
//! - [`CounterStore::allocate_next`] - increment and read
//! - [`CounterStore::force_advance`] - raise to a candidate, never lower
//! - [`CounterStore::force_set`] - administrative overwrite
//!
//! ### Field Synchronization
//!
//! [`Autoincrement`] is a [`DocumentHook`] that allocates or reconciles
//! values before saves and reconciles values assigned by updates
//! ([`UpdateKind`]). Immutable fields are never reconciled from updates.
//!
//! ### Model
//!
//! [`Model`] is an in-memory collection that runs hooks around
//! `save`, `find_one_and_update`, `update_one`, `update_many` and `update`.
//!
//! ## Quick Start
//!
//! ```rust
//! use autoinc_engine::{
//!     AutoincrementOptions, CollectionSchema, FieldDef, FieldType, MemoryBackend, Model,
//! };
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! # futures::executor::block_on(async {
//! // 1. Declare an auto-increment field
//! let schema = CollectionSchema::new(
//!     "orders",
//!     vec![FieldDef::optional("code", FieldType::Int).autoincrement()],
//! );
//!
//! // 2. Build a model backed by an in-memory counter backend
//! let model = Model::new(schema)
//!     .with_autoincrement(Arc::new(MemoryBackend::new()), AutoincrementOptions::default());
//!
//! // 3. Save documents
//! let mut order = model.new_document(json!({}));
//! model.save(&mut order).await.unwrap();
//! assert_eq!(order.get("code"), Some(&json!(1)));
//!
//! // 4. Inspect the counter
//! let counters = model.counter_store().unwrap();
//! assert_eq!(counters.get_current("orders", "code").await.unwrap(), 1);
//! # });
//! ```

pub mod backend;
pub mod counter;
pub mod document;
pub mod error;
pub mod hook;
pub mod model;
pub mod path;
pub mod query;
pub mod schema;
pub mod sync;

// Re-export main types at crate root
pub use backend::{CounterBackend, MemoryBackend};
pub use counter::{CounterKey, CounterRecord, CounterStore, CounterUpdate, DEFAULT_COUNTER_NAME};
pub use document::Document;
pub use error::Error;
pub use hook::{DocumentHook, HookEvent};
pub use model::{Model, UpdateResult};
pub use query::{UpdateKind, UpdateQuery};
pub use schema::{CollectionSchema, FieldDef, FieldType, Schema};
pub use sync::{autoincrement_fields, Autoincrement, AutoincrementField, AutoincrementOptions, FieldKind};

/// Type aliases for clarity
pub type CollectionName = String;
pub type DocumentId = String;
pub type Count = u64;
