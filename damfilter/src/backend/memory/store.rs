use indexmap::IndexMap;
use parking_lot::RwLock;
use serde_json::Value;
use uuid::Uuid;

use crate::common::{escape_keys, DOC_ID};
use crate::errors::{DamError, DamResult, ErrorKind};

/// Collections of JSON documents kept in insertion order.
///
/// Documents are stored with escaped keys, the way a document store keeps
/// them, and receive a generated `_id` when they have none.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    collections: RwLock<IndexMap<String, Vec<Value>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `document` and returns the stored form.
    ///
    /// # Errors
    ///
    /// Returns [ErrorKind::ValidationError] when `document` is not an object.
    pub fn insert(&self, collection: &str, document: Value) -> DamResult<Value> {
        let Value::Object(mut map) = escape_keys(document) else {
            log::error!("Only objects can be stored in collection '{}'", collection);
            return Err(DamError::new(
                &format!("Only objects can be stored in collection '{}'", collection),
                ErrorKind::ValidationError,
            ));
        };
        if !map.contains_key(DOC_ID) {
            map.insert(DOC_ID.to_string(), Value::String(Uuid::new_v4().to_string()));
        }
        let stored = Value::Object(map);
        self.collections
            .write()
            .entry(collection.to_string())
            .or_default()
            .push(stored.clone());
        Ok(stored)
    }

    pub fn insert_many(&self, collection: &str, documents: Vec<Value>) -> DamResult<Vec<Value>> {
        documents
            .into_iter()
            .map(|document| self.insert(collection, document))
            .collect()
    }

    /// Snapshot of the documents of `collection`.
    pub fn documents(&self, collection: &str) -> Vec<Value> {
        self.collections
            .read()
            .get(collection)
            .cloned()
            .unwrap_or_default()
    }

    pub fn count(&self, collection: &str) -> usize {
        self.collections.read().get(collection).map_or(0, Vec::len)
    }

    pub fn collection_names(&self) -> Vec<String> {
        self.collections.read().keys().cloned().collect()
    }

    pub fn clear(&self) {
        self.collections.write().clear();
    }
}
