//! Entries: JSON objects addressed by key path.

use crate::error::StoreError;
use crate::store::schema::CollectionSchema;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

/// A stored entry: a JSON object carrying its own primary key
pub type Entry = Value;

/// Serialize a typed value into an entry.
pub fn to_entry<T: Serialize>(value: &T) -> Result<Entry, StoreError> {
    let entry = serde_json::to_value(value)
        .map_err(|e| StoreError::WriteFailed(format!("Failed to serialize entry: {}", e)))?;
    if !entry.is_object() {
        return Err(StoreError::WriteFailed(
            "Entries must serialize to JSON objects".to_string(),
        ));
    }
    Ok(entry)
}

/// Deserialize an entry into a typed value.
pub fn from_entry<T: DeserializeOwned>(entry: Entry) -> Result<T, StoreError> {
    serde_json::from_value(entry)
        .map_err(|e| StoreError::ReadFailed(format!("Failed to deserialize entry: {}", e)))
}

/// Render a key-path value as index/primary key text; None for non-key values.
fn key_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Extract the primary key of an entry.
pub fn primary_key(schema: &CollectionSchema, entry: &Entry) -> Result<String, StoreError> {
    entry
        .get(schema.key_path)
        .and_then(key_text)
        .filter(|key| !key.is_empty())
        .ok_or_else(|| {
            StoreError::WriteFailed(format!(
                "Entry for '{}' has no usable '{}' key",
                schema.name, schema.key_path
            ))
        })
}

/// Extract an index value; entries without one are simply not indexed.
pub fn index_value(entry: &Entry, key_path: &str) -> Option<String> {
    entry.get(key_path).and_then(key_text)
}

/// Index tree key: `<index value> 0x00 <primary key>`, so one value may map to many entries.
pub(crate) fn index_key(value: &str, primary_key: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(value.len() + primary_key.len() + 1);
    key.extend_from_slice(value.as_bytes());
    key.push(0);
    key.extend_from_slice(primary_key.as_bytes());
    key
}
