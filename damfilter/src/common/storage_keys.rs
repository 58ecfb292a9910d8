use serde_json::{Map, Value};

use crate::errors::DamResult;

use super::{DOC_REV, ESCAPED_DOLLAR, ESCAPED_DOT};

/// Escapes one object key for storage: every `.` and a leading `$` are
/// replaced with their full-width forms.
pub fn escape_key(key: &str) -> String {
    let mut escaped = String::with_capacity(key.len());
    for (i, ch) in key.chars().enumerate() {
        match ch {
            '.' => escaped.push(ESCAPED_DOT),
            '$' if i == 0 => escaped.push(ESCAPED_DOLLAR),
            other => escaped.push(other),
        }
    }
    escaped
}

/// Reverses [escape_key].
pub fn unescape_key(key: &str) -> String {
    let mut unescaped = String::with_capacity(key.len());
    for (i, ch) in key.chars().enumerate() {
        match ch {
            ESCAPED_DOT => unescaped.push('.'),
            ESCAPED_DOLLAR if i == 0 => unescaped.push('$'),
            other => unescaped.push(other),
        }
    }
    unescaped
}

fn map_keys(value: Value, rename: &dyn Fn(&str) -> String) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(key, value)| (rename(&key), map_keys(value, rename)))
                .collect::<Map<String, Value>>(),
        ),
        Value::Array(items) => {
            Value::Array(items.into_iter().map(|item| map_keys(item, rename)).collect())
        }
        other => other,
    }
}

/// Escapes every object key in `value`, recursively.
pub fn escape_keys(value: Value) -> Value {
    map_keys(value, &escape_key)
}

/// Restores every object key in `value`, recursively.
pub fn unescape_keys(value: Value) -> Value {
    map_keys(value, &unescape_key)
}

/// Turns a raw stored document into the shape returned to callers.
pub trait DocumentNormalizer: Send + Sync {
    fn prepare_document(&self, raw: Value) -> DamResult<Value>;
}

/// Default normalizer: restores escaped keys and drops storage-internal
/// top-level fields.
#[derive(Debug, Clone, Default)]
pub struct StorageKeyNormalizer {
    drop_fields: Vec<String>,
}

impl StorageKeyNormalizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Normalizer for graph-store documents, which carry a `_rev` field.
    pub fn for_graph_store() -> Self {
        Self::new().drop_field(DOC_REV)
    }

    pub fn drop_field(mut self, field: &str) -> Self {
        self.drop_fields.push(field.to_string());
        self
    }
}

impl DocumentNormalizer for StorageKeyNormalizer {
    fn prepare_document(&self, raw: Value) -> DamResult<Value> {
        let mut document = unescape_keys(raw);
        if let Value::Object(map) = &mut document {
            for field in &self.drop_fields {
                map.remove(field);
            }
        }
        Ok(document)
    }
}
