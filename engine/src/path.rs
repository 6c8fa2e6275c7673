//! Dotted field paths over JSON payloads.
//!
//! A path such as `meta.code` addresses `{"meta": {"code": ...}}`. Only
//! object nesting is supported; array indices are not.

use crate::{error::Result, Error};
use serde_json::{Map, Value};

/// Split a dotted path into its segments, rejecting empty segments.
pub fn segments(path: &str) -> Result<Vec<&str>> {
    let parts: Vec<&str> = path.split('.').collect();
    if parts.iter().any(|p| p.is_empty()) {
        return Err(Error::InvalidPath(path.to_string()));
    }
    Ok(parts)
}

/// Look up the value at `path`.
pub fn get<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.')
        .try_fold(value, |current, segment| current.as_object()?.get(segment))
}

/// Write `new_value` at `path`, creating intermediate objects as needed.
///
/// Intermediate values that are not objects are replaced.
pub fn set(value: &mut Value, path: &str, new_value: Value) -> Result<()> {
    let parts = segments(path)?;
    let (last, parents) = parts
        .split_last()
        .ok_or_else(|| Error::InvalidPath(path.to_string()))?;

    let mut current = value;
    for segment in parents {
        current = object_mut(current)
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
    }
    object_mut(current).insert(last.to_string(), new_value);
    Ok(())
}

/// Remove the value at `path`, if any.
pub fn remove(value: &mut Value, path: &str) -> Option<Value> {
    let (parents, last) = match path.rsplit_once('.') {
        Some((parents, last)) => (Some(parents), last),
        None => (None, path),
    };
    let parent = match parents {
        Some(parents) => parents
            .split('.')
            .try_fold(value, |current, segment| current.as_object_mut()?.get_mut(segment))?,
        None => value,
    };
    parent.as_object_mut()?.remove(last)
}

fn object_mut(value: &mut Value) -> &mut Map<String, Value> {
    if !value.is_object() {
        *value = Value::Object(Map::new());
    }
    match value {
        Value::Object(map) => map,
        _ => unreachable!("value was just replaced by an object"),
    }
}

/// Whether `a` and `b` address overlapping fields (equal, or one nested in the other).
pub fn overlaps(a: &str, b: &str) -> bool {
    let (short, long) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    long == short || long.starts_with(short) && long[short.len()..].starts_with('.')
}
