//! Wire-format tests for the document and counter API.
//!
//! These exercise the engine through the JSON shapes the server accepts and
//! returns, against an in-memory counter backend, so no database is needed.

use autoinc_engine::{
    AutoincrementOptions, Document, MemoryBackend, Model, Schema, UpdateKind, UpdateQuery,
};
use serde_json::json;
use std::sync::Arc;

const SCHEMA_FILE: &str = r#"{
    "collections": {
        "orders": {
            "name": "orders",
            "fields": [
                { "name": "code", "fieldType": "int", "required": false,
                  "autoincrement": true, "immutable": true },
                { "name": "number", "fieldType": "string", "required": false,
                  "autoincrement": true },
                { "name": "customer", "fieldType": "string", "required": false }
            ]
        }
    }
}"#;

fn orders() -> Model {
    let schema: Schema = serde_json::from_str(SCHEMA_FILE).unwrap();
    let orders = schema.get_collection("orders").unwrap().clone();
    Model::new(orders).with_autoincrement(
        Arc::new(MemoryBackend::new()),
        AutoincrementOptions::default(),
    )
}

#[cfg(test)]
mod schema_tests {
    use super::*;
    use autoinc_engine::FieldType;

    #[test]
    fn test_schema_file_parsing() {
        let schema: Schema = serde_json::from_str(SCHEMA_FILE).unwrap();
        let orders = schema.get_collection("orders").unwrap();

        let code = orders.field("code").unwrap();
        assert_eq!(code.field_type, FieldType::Int);
        assert!(code.autoincrement);
        assert!(code.immutable);

        // Flags default to off
        let customer = orders.field("customer").unwrap();
        assert!(!customer.autoincrement);
        assert!(!customer.immutable);
    }

    #[test]
    fn test_update_request_deserialization() {
        let json = r#"{
            "kind": "findOneAndUpdate",
            "filter": { "customer": "acme" },
            "update": { "$set": { "number": "7" } }
        }"#;

        #[derive(serde::Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct TestUpdateRequest {
            kind: UpdateKind,
            #[serde(default)]
            filter: serde_json::Value,
            update: serde_json::Value,
        }

        let request: TestUpdateRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.kind, UpdateKind::FindOneAndUpdate);
        assert_eq!(request.filter["customer"], "acme");

        let query = UpdateQuery::new(request.kind, "orders", request.filter, request.update);
        assert!(query.validate().is_ok());
        assert_eq!(query.get("number"), Some(&json!("7")));
    }

    #[test]
    fn test_update_kinds_on_the_wire() {
        for (raw, kind) in [
            ("\"findOneAndUpdate\"", UpdateKind::FindOneAndUpdate),
            ("\"updateOne\"", UpdateKind::UpdateOne),
            ("\"updateMany\"", UpdateKind::UpdateMany),
            ("\"update\"", UpdateKind::Update),
        ] {
            let parsed: UpdateKind = serde_json::from_str(raw).unwrap();
            assert_eq!(parsed, kind);
        }
    }
}

#[cfg(test)]
mod document_tests {
    use super::*;

    #[tokio::test]
    async fn test_created_document_response() {
        let model = orders();
        let mut doc = model.new_document(json!({ "customer": "acme" }));
        model.save(&mut doc).await.unwrap();

        let body = serde_json::to_value(&doc).unwrap();
        assert_eq!(body["collection"], "orders");
        assert_eq!(body["payload"]["code"], 1);
        assert_eq!(body["payload"]["number"], "1");
        assert!(body["id"].as_str().is_some_and(|id| !id.is_empty()));

        // Change tracking stays server-side
        let parsed: Document = serde_json::from_value(body).unwrap();
        assert_eq!(parsed.id, doc.id);
        assert!(!parsed.is_new());
    }

    #[tokio::test]
    async fn test_update_then_create_continues_sequence() {
        let model = orders();
        let mut first = model.new_document(json!({ "customer": "acme" }));
        model.save(&mut first).await.unwrap();

        let result = model
            .update_one(json!({ "_id": first.id }), json!({ "$set": { "number": "10" } }))
            .await
            .unwrap();
        assert_eq!(result.matched, 1);
        assert_eq!(result.modified, 1);

        let mut second = model.new_document(json!({ "customer": "globex" }));
        model.save(&mut second).await.unwrap();
        assert_eq!(second.get("number"), Some(&json!("11")));
        assert_eq!(second.get("code"), Some(&json!(2)));
    }

    #[tokio::test]
    async fn test_immutable_field_not_reconciled() {
        let model = orders();
        let mut doc = model.new_document(json!({}));
        model.save(&mut doc).await.unwrap();

        model
            .update_many(json!({}), json!({ "code": 500 }))
            .await
            .unwrap();

        let counters = model.counter_store().unwrap();
        assert_eq!(counters.get_current("orders", "code").await.unwrap(), 1);
        // The stored value is untouched as well
        let stored = model.find_by_id(&doc.id).unwrap();
        assert_eq!(stored.get("code"), Some(&json!(1)));
    }

    #[tokio::test]
    async fn test_update_result_serialization() {
        let model = orders();
        for customer in ["a", "b", "c"] {
            let mut doc = model.new_document(json!({ "customer": customer }));
            model.save(&mut doc).await.unwrap();
        }

        let result = model
            .update_many(json!({}), json!({ "customer": "z" }))
            .await
            .unwrap();
        let body = serde_json::to_value(result).unwrap();
        assert_eq!(body, json!({ "matched": 3, "modified": 3 }));
    }
}
