//! Counter administration through a collection's counter store handle.

use crate::error::{AppError, Result};
use crate::registry::Registry;
use autoinc_engine::{CounterStore, Count};
use serde::{Deserialize, Serialize};

/// Request body for overwriting a counter.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetCounterRequest {
    pub count: Count,
}

/// Current state of a counter.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CounterResponse {
    pub collection: String,
    pub field_path: String,
    pub count: Count,
}

/// Resolve the counter store of `collection`, requiring `field` to be one of
/// its auto-increment fields.
fn counter_store<'a>(registry: &'a Registry, collection: &str, field: &str) -> Result<&'a CounterStore> {
    let plugin = registry
        .get(collection)?
        .autoincrement
        .as_ref()
        .filter(|plugin| plugin.fields().iter().any(|f| f.path == field))
        .ok_or_else(|| {
            AppError::NotFound(format!("auto-increment field {collection}.{field}"))
        })?;
    Ok(plugin.counter_store())
}

/// Read a counter.
pub async fn handle_get_counter(
    registry: &Registry,
    collection: &str,
    field: &str,
) -> Result<CounterResponse> {
    let store = counter_store(registry, collection, field)?;
    let count = store.get_current(collection, field).await?;
    Ok(CounterResponse {
        collection: collection.to_string(),
        field_path: field.to_string(),
        count,
    })
}

/// Overwrite a counter.
pub async fn handle_set_counter(
    registry: &Registry,
    collection: &str,
    field: &str,
    request: SetCounterRequest,
) -> Result<CounterResponse> {
    let store = counter_store(registry, collection, field)?;
    store.set_current(collection, field, request.count).await?;
    tracing::info!(collection, field, count = request.count, "counter overwritten");
    Ok(CounterResponse {
        collection: collection.to_string(),
        field_path: field.to_string(),
        count: request.count,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::default_schema;
    use autoinc_engine::{AutoincrementOptions, MemoryBackend};
    use std::sync::Arc;

    fn registry() -> Registry {
        Registry::new(
            default_schema(),
            Arc::new(MemoryBackend::new()),
            AutoincrementOptions::default(),
        )
    }

    #[tokio::test]
    async fn get_and_set_counter() {
        let registry = registry();

        let current = handle_get_counter(&registry, "orders", "code").await.unwrap();
        assert_eq!(current.count, 0);

        handle_set_counter(&registry, "orders", "code", SetCounterRequest { count: 41 })
            .await
            .unwrap();
        let current = handle_get_counter(&registry, "orders", "code").await.unwrap();
        assert_eq!(current.count, 41);
    }

    #[tokio::test]
    async fn unknown_field_is_not_found() {
        let registry = registry();
        let result = handle_get_counter(&registry, "orders", "customer").await;
        assert!(matches!(result, Err(AppError::NotFound(_))));

        let result = handle_get_counter(&registry, "invoices", "code").await;
        assert!(matches!(result, Err(AppError::Engine(_))));
    }
}
