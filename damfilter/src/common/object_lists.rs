use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::{DamError, DamResult, ErrorKind};

use super::{
    FieldPath, Segment, ANY_COLLECTION, DOC_ID, DOC_KEY, METADATA_DISCRIMINATOR, METADATA_LEAF,
    METADATA_LIST, RELATIONS_DISCRIMINATOR, RELATIONS_LEAF, RELATIONS_LIST,
};

fn default_leaf() -> String {
    METADATA_LEAF.to_string()
}

/// A document field holding an array of typed records, such as
/// `metadata: [{"key": "title", "value": "..."}]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectList {
    /// Name of the array field.
    pub field: String,
    /// Record member that names the record (`key` for metadata).
    pub discriminator: String,
    /// Record member holding the record's value.
    #[serde(default = "default_leaf")]
    pub leaf: String,
}

impl ObjectList {
    pub fn new(field: &str, discriminator: &str, leaf: &str) -> Self {
        ObjectList {
            field: field.to_string(),
            discriminator: discriminator.to_string(),
            leaf: leaf.to_string(),
        }
    }
}

/// Object lists of one collection.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectionObjectLists {
    pub lists: Vec<ObjectList>,
    /// Object list that bare keys (`title`) resolve into.
    pub default_list: Option<String>,
    /// Top-level fields that bare keys never redirect away from.
    pub root_fields: Vec<String>,
}

impl CollectionObjectLists {
    pub fn list(&self, field: &str) -> Option<&ObjectList> {
        self.lists.iter().find(|list| list.field == field)
    }

    fn default_object_list(&self) -> Option<&ObjectList> {
        self.default_list.as_deref().and_then(|field| self.list(field))
    }

    fn is_root_field(&self, field: &str) -> bool {
        self.root_fields.iter().any(|root| root == field)
    }
}

/// Per-collection object-list layout, with a `"*"` entry used for
/// collections that are not listed explicitly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectListConfig {
    collections: HashMap<String, CollectionObjectLists>,
}

impl Default for ObjectListConfig {
    fn default() -> Self {
        let lists = CollectionObjectLists {
            lists: vec![
                ObjectList::new(METADATA_LIST, METADATA_DISCRIMINATOR, METADATA_LEAF),
                ObjectList::new(RELATIONS_LIST, RELATIONS_DISCRIMINATOR, RELATIONS_LEAF),
            ],
            default_list: Some(METADATA_LIST.to_string()),
            root_fields: [
                DOC_ID,
                DOC_KEY,
                "identifiers",
                "date_created",
                "date_updated",
                "version",
                "user",
                "schema",
            ]
            .iter()
            .map(|field| field.to_string())
            .collect(),
        };
        ObjectListConfig::empty().with_collection(ANY_COLLECTION, lists)
    }
}

impl ObjectListConfig {
    /// A configuration without any object list; every key is a root field.
    pub fn empty() -> Self {
        ObjectListConfig {
            collections: HashMap::new(),
        }
    }

    pub fn with_collection(mut self, collection: &str, lists: CollectionObjectLists) -> Self {
        self.collections.insert(collection.to_string(), lists);
        self
    }

    /// Object lists of `collection`, falling back to the `"*"` entry.
    pub fn lists_for(&self, collection: &str) -> Option<&CollectionObjectLists> {
        self.collections
            .get(collection)
            .or_else(|| self.collections.get(ANY_COLLECTION))
    }

    /// Resolves a flat filter key into its storage shape.
    ///
    /// - `metadata.rights` addresses the `value` of the `metadata` record
    ///   whose `key` is `rights`; `metadata.rights.lang` addresses `lang`
    ///   of that record instead.
    /// - a bare key that is not a root field resolves into the default
    ///   object list, so `title` reads `metadata.title`.
    /// - anything else is a plain path from the document root.
    pub fn resolve(&self, collection: &str, key: &str) -> DamResult<FieldTarget> {
        let path = FieldPath::parse(key)?;
        let Some(lists) = self.lists_for(collection) else {
            return Ok(FieldTarget::Root(path));
        };

        if let (Some(list), Some(Segment::Field(name))) = (
            path.first_field().and_then(|first| lists.list(first)),
            path.segments().get(1),
        ) {
            let leaf = if path.len() > 2 {
                path.skip(2)
            } else {
                FieldPath::parse(&list.leaf)?
            };
            return Ok(FieldTarget::ObjectList {
                list: list.field.clone(),
                discriminator: list.discriminator.clone(),
                name: name.clone(),
                leaf,
            });
        }

        let default_list = lists.default_object_list();
        if let (1, Some(field), Some(list)) = (path.len(), path.first_field(), default_list) {
            if !lists.is_root_field(field) && lists.list(field).is_none() {
                return Ok(FieldTarget::ObjectList {
                    list: list.field.clone(),
                    discriminator: list.discriminator.clone(),
                    name: field.to_string(),
                    leaf: FieldPath::parse(&list.leaf)?,
                });
            }
        }

        Ok(FieldTarget::Root(path))
    }

    /// Target of a relation of type `relation_type`.
    ///
    /// # Errors
    ///
    /// Returns [ErrorKind::ConfigurationError] when the collection has no
    /// relations object list.
    pub fn relation_target(&self, collection: &str, relation_type: &str) -> DamResult<FieldTarget> {
        let list = self
            .lists_for(collection)
            .and_then(|lists| lists.list(RELATIONS_LIST));
        match list {
            Some(list) => Ok(FieldTarget::ObjectList {
                list: list.field.clone(),
                discriminator: list.discriminator.clone(),
                name: relation_type.to_string(),
                leaf: FieldPath::parse(&list.leaf)?,
            }),
            None => {
                log::error!(
                    "Collection '{}' has no '{}' object list configured",
                    collection,
                    RELATIONS_LIST
                );
                Err(DamError::new(
                    &format!(
                        "Collection '{}' has no '{}' object list configured",
                        collection, RELATIONS_LIST
                    ),
                    ErrorKind::ConfigurationError,
                ))
            }
        }
    }
}

/// Storage shape of a filter key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FieldTarget {
    /// A field addressed by path from the document root.
    Root(FieldPath),
    /// The `leaf` of the records in `list` whose `discriminator` equals `name`.
    ObjectList {
        list: String,
        discriminator: String,
        name: String,
        leaf: FieldPath,
    },
}

impl FieldTarget {
    pub fn root(path: FieldPath) -> Self {
        FieldTarget::Root(path)
    }

    pub fn is_object_list(&self) -> bool {
        matches!(self, FieldTarget::ObjectList { .. })
    }

    /// Key that resolves back to this target.
    pub fn flat_key(&self) -> String {
        match self {
            FieldTarget::Root(path) => path.to_string(),
            FieldTarget::ObjectList { list, name, leaf, .. } => {
                format!("{}.{}.{}", list, name, leaf)
            }
        }
    }

    /// Every value this target reads from `document`.
    pub fn values<'a>(&self, document: &'a Value) -> Vec<&'a Value> {
        match self {
            FieldTarget::Root(path) => path.resolve(document),
            FieldTarget::ObjectList { .. } => self
                .records(document)
                .into_iter()
                .flat_map(|record| self.leaf_values(record))
                .collect(),
        }
    }

    /// Records of the object list whose discriminator matches.
    pub fn records<'a>(&self, document: &'a Value) -> Vec<&'a Value> {
        match self {
            FieldTarget::Root(_) => vec![],
            FieldTarget::ObjectList {
                list,
                discriminator,
                name,
                ..
            } => match document.get(list) {
                Some(Value::Array(items)) => items
                    .iter()
                    .filter(|item| {
                        item.get(discriminator).and_then(Value::as_str) == Some(name.as_str())
                    })
                    .collect(),
                _ => vec![],
            },
        }
    }

    /// Values of the leaf inside one record.
    pub fn leaf_values<'a>(&self, record: &'a Value) -> Vec<&'a Value> {
        match self {
            FieldTarget::Root(path) => path.resolve(record),
            FieldTarget::ObjectList { leaf, .. } => leaf.resolve(record),
        }
    }

    /// Builds the stored shape of `value`: the typed record for an object
    /// list, the nested object for a root path.
    pub fn record(&self, value: Value) -> Value {
        match self {
            FieldTarget::Root(path) => nest(path, value),
            FieldTarget::ObjectList {
                discriminator,
                name,
                leaf,
                ..
            } => {
                let mut record = match nest(leaf, value) {
                    Value::Object(map) => map,
                    _ => Map::new(),
                };
                record.insert(discriminator.clone(), Value::String(name.clone()));
                Value::Object(record)
            }
        }
    }

    /// Writes `value` into `document` so that [FieldTarget::values] reads it
    /// back.
    pub fn write(&self, document: &mut Value, value: Value) {
        if !document.is_object() {
            *document = Value::Object(Map::new());
        }
        match self {
            FieldTarget::Root(path) => merge(document, nest(path, value)),
            FieldTarget::ObjectList { list, .. } => {
                let record = self.record(value);
                if let Value::Object(map) = document {
                    let entry = map.entry(list.clone()).or_insert_with(|| Value::Array(vec![]));
                    match entry {
                        Value::Array(items) => items.push(record),
                        other => *other = Value::Array(vec![record]),
                    }
                }
            }
        }
    }
}

fn nest(path: &FieldPath, value: Value) -> Value {
    path.segments().iter().rev().fold(value, |inner, segment| match segment {
        Segment::Field(name) => {
            let mut map = Map::new();
            map.insert(name.clone(), inner);
            Value::Object(map)
        }
        Segment::Index(index) => {
            let mut items = vec![Value::Null; *index];
            items.push(inner);
            Value::Array(items)
        }
    })
}

fn merge(target: &mut Value, source: Value) {
    match (target, source) {
        (Value::Object(target), Value::Object(source)) => {
            for (key, value) in source {
                match target.get_mut(&key) {
                    Some(existing) if existing.is_object() && value.is_object() => {
                        merge(existing, value)
                    }
                    _ => {
                        target.insert(key, value);
                    }
                }
            }
        }
        (target, source) => *target = source,
    }
}
