//! Schema definition and validation.
//!
//! Schemas declare the fields of each collection, including which of them
//! are auto-incrementing, and validate payloads before they are written.

use crate::{error::Result, path, CollectionName, Error};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Field types supported in schemas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Int,
    Float,
    Bool,
    Timestamp,
    /// Arbitrary nested JSON
    Json,
}

impl std::fmt::Display for FieldType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldType::String => write!(f, "String"),
            FieldType::Int => write!(f, "Int"),
            FieldType::Float => write!(f, "Float"),
            FieldType::Bool => write!(f, "Bool"),
            FieldType::Timestamp => write!(f, "Timestamp"),
            FieldType::Json => write!(f, "Json"),
        }
    }
}

/// Definition of a field in a collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDef {
    /// Field path, dotted for nested fields
    pub name: String,
    /// Field type
    pub field_type: FieldType,
    /// Whether this field is required
    pub required: bool,
    /// Whether values are drawn from a counter
    #[serde(default)]
    pub autoincrement: bool,
    /// Whether the field may only be written at creation
    #[serde(default)]
    pub immutable: bool,
}

impl FieldDef {
    /// Create a new required field definition.
    pub fn required(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            required: true,
            autoincrement: false,
            immutable: false,
        }
    }

    /// Create a new optional field definition.
    pub fn optional(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            required: false,
            autoincrement: false,
            immutable: false,
        }
    }

    /// Mark the field as auto-incrementing.
    pub fn autoincrement(mut self) -> Self {
        self.autoincrement = true;
        self
    }

    /// Mark the field as immutable.
    pub fn immutable(mut self) -> Self {
        self.immutable = true;
        self
    }

    /// Validate a JSON value against this field definition.
    pub fn validate(&self, value: Option<&serde_json::Value>) -> Result<()> {
        match value {
            None if self.required => Err(Error::MissingRequiredField(self.name.clone())),
            None => Ok(()),
            Some(serde_json::Value::Null) if self.required => {
                Err(Error::MissingRequiredField(self.name.clone()))
            }
            Some(serde_json::Value::Null) => Ok(()),
            Some(v) => self.validate_type(v),
        }
    }

    fn validate_type(&self, value: &serde_json::Value) -> Result<()> {
        let valid = match self.field_type {
            FieldType::String => value.is_string(),
            FieldType::Int => value.is_i64() || value.is_u64(),
            FieldType::Float => value.is_f64() || value.is_i64() || value.is_u64(),
            FieldType::Bool => value.is_boolean(),
            FieldType::Timestamp => value.is_u64() || value.is_i64(),
            FieldType::Json => true,
        };

        if valid {
            Ok(())
        } else {
            Err(Error::TypeMismatch {
                field: self.name.clone(),
                expected: self.field_type.to_string(),
                got: json_type_name(value).to_string(),
            })
        }
    }
}

fn json_type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "Null",
        serde_json::Value::Bool(_) => "Bool",
        serde_json::Value::Number(n) if n.is_i64() || n.is_u64() => "Int",
        serde_json::Value::Number(_) => "Float",
        serde_json::Value::String(_) => "String",
        serde_json::Value::Array(_) => "Array",
        serde_json::Value::Object(_) => "Object",
    }
}

/// Schema for a collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionSchema {
    /// Collection name, also the entity type of its counters
    pub name: CollectionName,
    /// Field definitions
    pub fields: Vec<FieldDef>,
}

impl CollectionSchema {
    /// Create a new collection schema.
    pub fn new(name: impl Into<CollectionName>, fields: Vec<FieldDef>) -> Self {
        Self {
            name: name.into(),
            fields,
        }
    }

    /// Visit every declared field with its path.
    pub fn each_path<F>(&self, mut visit: F)
    where
        F: FnMut(&str, &FieldDef),
    {
        for field in &self.fields {
            visit(&field.name, field);
        }
    }

    /// Look up a field definition by path.
    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Paths of all immutable fields.
    pub fn immutable_paths(&self) -> Vec<&str> {
        self.fields
            .iter()
            .filter(|f| f.immutable)
            .map(|f| f.name.as_str())
            .collect()
    }

    /// Validate a payload against this schema.
    pub fn validate_payload(&self, payload: &serde_json::Value) -> Result<()> {
        if !payload.is_object() {
            return Err(Error::InvalidPayload("payload must be an object".into()));
        }

        for field in &self.fields {
            field.validate(path::get(payload, &field.name))?;
        }

        Ok(())
    }
}

/// Schema for every collection served.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Schema {
    /// Collection schemas by name
    pub collections: HashMap<CollectionName, CollectionSchema>,
}

impl Schema {
    /// Create an empty schema.
    pub fn new() -> Self {
        Self {
            collections: HashMap::new(),
        }
    }

    /// Add a collection to the schema.
    pub fn add_collection(&mut self, collection: CollectionSchema) -> &mut Self {
        self.collections.insert(collection.name.clone(), collection);
        self
    }

    /// Builder-style method to add a collection.
    pub fn with_collection(mut self, collection: CollectionSchema) -> Self {
        self.add_collection(collection);
        self
    }

    /// Get a collection schema by name.
    pub fn get_collection(&self, name: &str) -> Option<&CollectionSchema> {
        self.collections.get(name)
    }
}

impl Default for Schema {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn orders() -> CollectionSchema {
        CollectionSchema::new(
            "orders",
            vec![
                FieldDef::optional("code", FieldType::Int)
                    .autoincrement()
                    .immutable(),
                FieldDef::required("customer", FieldType::String),
                FieldDef::optional("meta.ref", FieldType::String),
            ],
        )
    }

    #[test]
    fn validate_valid_payload() {
        let collection = orders();
        assert!(collection
            .validate_payload(&json!({"customer": "Alice"}))
            .is_ok());
        assert!(collection
            .validate_payload(&json!({"customer": "Bob", "code": 3, "meta": {"ref": "x"}}))
            .is_ok());
    }

    #[test]
    fn validate_missing_required_field() {
        let result = orders().validate_payload(&json!({"code": 1}));
        assert!(matches!(result, Err(Error::MissingRequiredField(f)) if f == "customer"));
    }

    #[test]
    fn validate_wrong_type() {
        let result = orders().validate_payload(&json!({"customer": "Alice", "code": "one"}));
        assert!(matches!(result, Err(Error::TypeMismatch { field, .. }) if field == "code"));
    }

    #[test]
    fn validate_nested_path() {
        let result = orders().validate_payload(&json!({"customer": "A", "meta": {"ref": 1}}));
        assert!(matches!(result, Err(Error::TypeMismatch { field, .. }) if field == "meta.ref"));
    }

    #[test]
    fn validate_non_object() {
        let result = orders().validate_payload(&json!([1, 2]));
        assert!(matches!(result, Err(Error::InvalidPayload(_))));
    }

    #[test]
    fn each_path_visits_in_order() {
        let mut seen = Vec::new();
        orders().each_path(|path, def| seen.push((path.to_string(), def.autoincrement)));
        assert_eq!(
            seen,
            vec![
                ("code".to_string(), true),
                ("customer".to_string(), false),
                ("meta.ref".to_string(), false),
            ]
        );
    }

    #[test]
    fn immutable_paths_listed() {
        assert_eq!(orders().immutable_paths(), vec!["code"]);
    }

    #[test]
    fn field_flags_default_when_absent() {
        let def: FieldDef =
            serde_json::from_value(json!({"name": "code", "fieldType": "int", "required": false}))
                .unwrap();
        assert!(!def.autoincrement);
        assert!(!def.immutable);
    }

    #[test]
    fn schema_serialization() {
        let schema = Schema::new().with_collection(orders());
        let json = serde_json::to_string(&schema).unwrap();
        let parsed: Schema = serde_json::from_str(&json).unwrap();
        assert_eq!(schema, parsed);
        assert!(parsed.get_collection("orders").is_some());
    }

    #[test]
    fn field_type_display() {
        assert_eq!(FieldType::String.to_string(), "String");
        assert_eq!(FieldType::Int.to_string(), "Int");
        assert_eq!(FieldType::Json.to_string(), "Json");
    }
}
