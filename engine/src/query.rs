//! Query-level updates.
//!
//! An update pairs an equality filter with an update document. The update
//! document assigns fields either directly (`{"code": 10}`) or through the
//! set operator (`{"$set": {"code": 10}}`); both forms may be mixed.

use crate::{error::Result, path, CollectionName, Error};
use serde::{Deserialize, Serialize};
use serde_json::Value;

const SET_OPERATOR: &str = "$set";

/// Which update entry point issued the query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum UpdateKind {
    /// Update the first match and return it as it was before the update
    FindOneAndUpdate,
    /// Update the first match
    UpdateOne,
    /// Update every match
    UpdateMany,
    /// Deprecated generic update; behaves like `UpdateOne`
    Update,
}

impl UpdateKind {
    /// Whether every matching document is updated.
    pub fn is_multi(self) -> bool {
        matches!(self, UpdateKind::UpdateMany)
    }
}

impl std::fmt::Display for UpdateKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UpdateKind::FindOneAndUpdate => write!(f, "findOneAndUpdate"),
            UpdateKind::UpdateOne => write!(f, "updateOne"),
            UpdateKind::UpdateMany => write!(f, "updateMany"),
            UpdateKind::Update => write!(f, "update"),
        }
    }
}

/// A partial update against a collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateQuery {
    /// Entry point
    pub kind: UpdateKind,
    /// Target collection
    pub collection: CollectionName,
    /// Equality filter on (dotted) paths; `_id` matches the document ID
    #[serde(default)]
    pub filter: Value,
    /// Update document
    pub update: Value,
}

impl UpdateQuery {
    /// Create a new update query.
    pub fn new(
        kind: UpdateKind,
        collection: impl Into<CollectionName>,
        filter: Value,
        update: Value,
    ) -> Self {
        Self {
            kind,
            collection: collection.into(),
            filter,
            update,
        }
    }

    /// Check that the update document only uses supported forms.
    pub fn validate(&self) -> Result<()> {
        let update = self
            .update
            .as_object()
            .ok_or_else(|| Error::InvalidUpdate("update must be an object".into()))?;

        for (key, value) in update {
            if key == SET_OPERATOR {
                if !value.is_object() {
                    return Err(Error::InvalidUpdate("$set must be an object".into()));
                }
            } else if key.starts_with('$') {
                return Err(Error::InvalidUpdate(format!("unsupported operator: {key}")));
            } else {
                path::segments(key)?;
            }
        }

        if !(self.filter.is_null() || self.filter.is_object()) {
            return Err(Error::InvalidUpdate("filter must be an object".into()));
        }

        Ok(())
    }

    /// The value this update assigns to `path`, if any.
    ///
    /// The set operator takes precedence over direct assignment.
    pub fn get(&self, path: &str) -> Option<&Value> {
        let set = self.update.get(SET_OPERATOR).and_then(|s| lookup(s, path));
        set.or_else(|| {
            if path.starts_with('$') {
                None
            } else {
                lookup(&self.update, path)
            }
        })
    }

    /// All `(path, value)` assignments, direct ones first.
    pub fn assignments(&self) -> Vec<(&str, &Value)> {
        let Some(update) = self.update.as_object() else {
            return Vec::new();
        };

        let mut out: Vec<(&str, &Value)> = update
            .iter()
            .filter(|(k, _)| !k.starts_with('$'))
            .map(|(k, v)| (k.as_str(), v))
            .collect();

        if let Some(set) = update.get(SET_OPERATOR).and_then(Value::as_object) {
            out.extend(set.iter().map(|(k, v)| (k.as_str(), v)));
        }

        out
    }

    /// Whether a document matches the filter.
    pub fn matches(&self, id: &str, payload: &Value) -> bool {
        filter_matches(&self.filter, id, payload)
    }

    /// Apply the assignments to `payload`, skipping any path that overlaps
    /// an immutable one. Returns whether the payload changed.
    pub fn apply_to(&self, payload: &mut Value, immutable: &[&str]) -> Result<bool> {
        let mut changed = false;

        for (target, value) in self.assignments() {
            if immutable.iter().any(|p| path::overlaps(p, target)) {
                tracing::trace!(path = target, "skipping write to immutable path");
                continue;
            }
            if path::get(payload, target) != Some(value) {
                path::set(payload, target, value.clone())?;
                changed = true;
            }
        }

        Ok(changed)
    }
}

/// Whether a document matches an equality filter.
///
/// A `null` filter matches everything; `null` in a filter also matches a
/// missing field.
pub fn filter_matches(filter: &Value, id: &str, payload: &Value) -> bool {
    let Some(filter) = filter.as_object() else {
        return filter.is_null();
    };

    filter.iter().all(|(key, expected)| {
        if key == "_id" {
            return expected.as_str() == Some(id);
        }
        match path::get(payload, key) {
            Some(actual) => actual == expected,
            None => expected.is_null(),
        }
    })
}

// Literal dotted key first (`{"meta.code": 1}`), then nested objects.
fn lookup<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    value.get(path).or_else(|| path::get(value, path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn query(update: Value) -> UpdateQuery {
        UpdateQuery::new(UpdateKind::UpdateOne, "orders", json!({"code": 1}), update)
    }

    #[test]
    fn get_direct_assignment() {
        let q = query(json!({"code": 10}));
        assert_eq!(q.get("code"), Some(&json!(10)));
        assert_eq!(q.get("other"), None);
    }

    #[test]
    fn get_set_operator() {
        let q = query(json!({"$set": {"code": 20}}));
        assert_eq!(q.get("code"), Some(&json!(20)));
    }

    #[test]
    fn set_operator_wins_over_direct() {
        let q = query(json!({"code": 1, "$set": {"code": 2}}));
        assert_eq!(q.get("code"), Some(&json!(2)));
    }

    #[test]
    fn get_nested_paths() {
        let dotted = query(json!({"$set": {"meta.code": 4}}));
        assert_eq!(dotted.get("meta.code"), Some(&json!(4)));

        let nested = query(json!({"meta": {"code": 5}}));
        assert_eq!(nested.get("meta.code"), Some(&json!(5)));
    }

    #[test]
    fn validate_rejects_unsupported() {
        assert!(query(json!({"code": 1})).validate().is_ok());
        assert!(query(json!({"$set": {"code": 1}})).validate().is_ok());
        assert!(matches!(
            query(json!({"$inc": {"code": 1}})).validate(),
            Err(Error::InvalidUpdate(_))
        ));
        assert!(matches!(
            query(json!({"$set": 5})).validate(),
            Err(Error::InvalidUpdate(_))
        ));
        assert!(matches!(
            query(json!("code")).validate(),
            Err(Error::InvalidUpdate(_))
        ));
    }

    #[test]
    fn filter_matching() {
        let q = UpdateQuery::new(
            UpdateKind::UpdateMany,
            "orders",
            json!({"code": 1, "meta.ref": "a"}),
            json!({}),
        );
        assert!(q.matches("d1", &json!({"code": 1, "meta": {"ref": "a"}})));
        assert!(!q.matches("d1", &json!({"code": 2, "meta": {"ref": "a"}})));
        assert!(!q.matches("d1", &json!({"code": 1})));

        let by_id = UpdateQuery::new(UpdateKind::UpdateOne, "orders", json!({"_id": "d1"}), json!({}));
        assert!(by_id.matches("d1", &json!({})));
        assert!(!by_id.matches("d2", &json!({})));

        let all = UpdateQuery::new(UpdateKind::UpdateOne, "orders", Value::Null, json!({}));
        assert!(all.matches("d1", &json!({"x": 1})));
    }

    #[test]
    fn apply_skips_immutable() {
        let q = query(json!({"code": 10, "$set": {"customer": "Bob"}}));
        let mut payload = json!({"code": 1, "customer": "Alice"});

        let changed = q.apply_to(&mut payload, &["code"]).unwrap();
        assert!(changed);
        assert_eq!(payload, json!({"code": 1, "customer": "Bob"}));
    }

    #[test]
    fn apply_reports_no_change() {
        let q = query(json!({"code": 1}));
        let mut payload = json!({"code": 1});
        assert!(!q.apply_to(&mut payload, &[]).unwrap());
    }

    #[test]
    fn kind_serialization() {
        assert_eq!(
            serde_json::to_value(UpdateKind::FindOneAndUpdate).unwrap(),
            json!("findOneAndUpdate")
        );
        assert_eq!(UpdateKind::UpdateMany.to_string(), "updateMany");
        assert!(UpdateKind::UpdateMany.is_multi());
        assert!(!UpdateKind::Update.is_multi());
    }
}
