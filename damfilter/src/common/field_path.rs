use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde_json::Value;

use crate::errors::{DamError, DamResult, ErrorKind};

use super::{PATH_SEPARATOR, SCHEMA_SEPARATOR, SCHEMA_VERSION_SEPARATOR};

/// One step of a [FieldPath].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Segment {
    /// Access an object member by name.
    Field(String),
    /// Access an array element by position.
    Index(usize),
}

/// A parsed field path such as `parent.child[0].grandchild`.
///
/// Paths are parsed once and then rendered into each backend's own syntax
/// (`parent.child.0.grandchild` for the document store,
/// ``doc.`parent`.`child`[0].`grandchild` `` for AQL) or navigated directly
/// against JSON documents.
///
/// Navigation follows document-store semantics: a named segment applied to
/// an array is applied to every element of that array.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldPath {
    segments: Vec<Segment>,
}

impl FieldPath {
    /// Parses a dotted path with optional `[n]` array indices.
    ///
    /// # Errors
    ///
    /// Returns [ErrorKind::InvalidFieldName] for empty paths, empty segments
    /// and malformed indices, [ErrorKind::ValidationError] for segments
    /// starting with `$`.
    pub fn parse(raw: &str) -> DamResult<FieldPath> {
        if raw.trim().is_empty() {
            log::error!("Field path cannot be empty");
            return Err(DamError::new("Field path cannot be empty", ErrorKind::InvalidFieldName));
        }

        let mut segments = Vec::new();
        for part in raw.split(PATH_SEPARATOR) {
            let (name, mut rest) = match part.find('[') {
                Some(pos) => (&part[..pos], &part[pos..]),
                None => (part, ""),
            };
            if name.is_empty() {
                log::error!("Field path '{}' contains an empty segment", raw);
                return Err(DamError::new(
                    &format!("Field path '{}' contains an empty segment", raw),
                    ErrorKind::InvalidFieldName,
                ));
            }
            if name.starts_with('$') {
                log::error!("Field path '{}' has an operator segment '{}'", raw, name);
                return Err(DamError::new(
                    &format!("Field path '{}' has an operator segment '{}'", raw, name),
                    ErrorKind::ValidationError,
                ));
            }
            segments.push(Segment::Field(name.to_string()));

            while !rest.is_empty() {
                let close = rest.find(']').filter(|_| rest.starts_with('['));
                let index = close
                    .and_then(|end| rest[1..end].parse::<usize>().ok().map(|i| (i, end)));
                match index {
                    Some((index, end)) => {
                        segments.push(Segment::Index(index));
                        rest = &rest[end + 1..];
                    }
                    None => {
                        log::error!("Field path '{}' has a malformed array index", raw);
                        return Err(DamError::new(
                            &format!("Field path '{}' has a malformed array index", raw),
                            ErrorKind::InvalidFieldName,
                        ));
                    }
                }
            }
        }
        Ok(FieldPath { segments })
    }

    /// Creates a single-segment path without parsing `name`.
    pub fn field(name: &str) -> FieldPath {
        FieldPath {
            segments: vec![Segment::Field(name.to_string())],
        }
    }

    pub fn from_segments(segments: Vec<Segment>) -> FieldPath {
        FieldPath { segments }
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Name of the first segment, when it is a named field.
    pub fn first_field(&self) -> Option<&str> {
        match self.segments.first() {
            Some(Segment::Field(name)) => Some(name),
            _ => None,
        }
    }

    /// Returns the path without its first `count` segments.
    pub fn skip(&self, count: usize) -> FieldPath {
        FieldPath {
            segments: self.segments.iter().skip(count).cloned().collect(),
        }
    }

    /// Renders the path in document-store dot notation (`a.0.b`).
    pub fn dotted(&self) -> String {
        self.segments
            .iter()
            .map(|segment| match segment {
                Segment::Field(name) => name.clone(),
                Segment::Index(index) => index.to_string(),
            })
            .collect::<Vec<_>>()
            .join(".")
    }

    /// Collects every value the path reaches inside `document`.
    ///
    /// Missing members produce no value, so an empty result means the field
    /// is absent.
    pub fn resolve<'a>(&self, document: &'a Value) -> Vec<&'a Value> {
        let mut found = Vec::new();
        collect(document, &self.segments, &mut found);
        found
    }
}

fn collect<'a>(value: &'a Value, segments: &[Segment], found: &mut Vec<&'a Value>) {
    let Some((head, rest)) = segments.split_first() else {
        found.push(value);
        return;
    };

    match (head, value) {
        (Segment::Field(name), Value::Object(map)) => {
            if let Some(next) = map.get(name) {
                collect(next, rest, found);
            }
        }
        (Segment::Field(_), Value::Array(items)) => {
            for item in items {
                collect(item, segments, found);
            }
        }
        (Segment::Index(index), Value::Array(items)) => {
            if let Some(next) = items.get(*index) {
                collect(next, rest, found);
            }
        }
        _ => {}
    }
}

impl Display for FieldPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            match segment {
                Segment::Field(name) if i == 0 => write!(f, "{}", name)?,
                Segment::Field(name) => write!(f, ".{}", name)?,
                Segment::Index(index) => write!(f, "[{}]", index)?,
            }
        }
        Ok(())
    }
}

impl FromStr for FieldPath {
    type Err = DamError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FieldPath::parse(s)
    }
}

/// A document schema reference such as `entity:1`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SchemaRef {
    schema_type: String,
    version: Option<String>,
}

impl SchemaRef {
    pub fn parse(raw: &str) -> DamResult<SchemaRef> {
        let (schema_type, version) = match raw.split_once(SCHEMA_VERSION_SEPARATOR) {
            Some((schema_type, version)) => (schema_type.trim(), Some(version.trim())),
            None => (raw.trim(), None),
        };
        if schema_type.is_empty() || version.is_some_and(str::is_empty) {
            log::error!("Invalid schema reference '{}'", raw);
            return Err(DamError::new(
                &format!("Invalid schema reference '{}'", raw),
                ErrorKind::InvalidFieldName,
            ));
        }
        Ok(SchemaRef {
            schema_type: schema_type.to_string(),
            version: version.map(str::to_string),
        })
    }

    pub fn schema_type(&self) -> &str {
        &self.schema_type
    }

    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    /// Values a stored version may take for this reference: the number when
    /// the version is numeric, and the raw string.
    pub fn version_values(&self) -> Vec<Value> {
        match &self.version {
            Some(version) => match version.parse::<i64>() {
                Ok(number) => vec![Value::from(number), Value::String(version.clone())],
                Err(_) => vec![Value::String(version.clone())],
            },
            None => vec![],
        }
    }
}

impl Display for SchemaRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.version {
            Some(version) => {
                write!(f, "{}{}{}", self.schema_type, SCHEMA_VERSION_SEPARATOR, version)
            }
            None => write!(f, "{}", self.schema_type),
        }
    }
}

/// A filter key optionally scoped to one schema: `schema|field`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopedKey {
    pub schema: Option<SchemaRef>,
    pub field: String,
}

impl ScopedKey {
    pub fn parse(raw: &str) -> DamResult<ScopedKey> {
        match raw.split_once(SCHEMA_SEPARATOR) {
            Some((schema, field)) => {
                if field.trim().is_empty() {
                    log::error!("Scoped key '{}' has no field", raw);
                    return Err(DamError::new(
                        &format!("Scoped key '{}' has no field", raw),
                        ErrorKind::InvalidFieldName,
                    ));
                }
                Ok(ScopedKey {
                    schema: Some(SchemaRef::parse(schema)?),
                    field: field.trim().to_string(),
                })
            }
            None => Ok(ScopedKey {
                schema: None,
                field: raw.trim().to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parse_nested_path_with_indices() {
        let path = FieldPath::parse("parent.child[0].grandchild").unwrap();
        assert_eq!(
            path.segments(),
            &[
                Segment::Field("parent".into()),
                Segment::Field("child".into()),
                Segment::Index(0),
                Segment::Field("grandchild".into()),
            ]
        );
        assert_eq!(path.dotted(), "parent.child.0.grandchild");
        assert_eq!(path.to_string(), "parent.child[0].grandchild");
    }

    #[test]
    fn parse_rejects_operator_segments() {
        for raw in ["$where", "metadata.$expr", "a[0].$ne"] {
            let err = FieldPath::parse(raw).unwrap_err();
            assert_eq!(err.kind(), &ErrorKind::ValidationError, "{}", raw);
        }
        assert!(FieldPath::parse("price$").is_ok());
    }

    #[test]
    fn parse_consecutive_indices() {
        let path = FieldPath::parse("matrix[1][2]").unwrap();
        assert_eq!(path.len(), 3);
        assert_eq!(path.to_string(), "matrix[1][2]");
    }

    #[test]
    fn parse_rejects_malformed_paths() {
        for raw in ["", "a..b", ".a", "a.", "a[x]", "a[1", "a[1]x", "[0]"] {
            let err = FieldPath::parse(raw).unwrap_err();
            assert_eq!(err.kind(), &ErrorKind::InvalidFieldName, "path {:?}", raw);
        }
    }

    #[test]
    fn resolve_traverses_arrays_implicitly() {
        let doc = json!({
            "metadata": [
                {"key": "title", "value": "Night Watch"},
                {"key": "rights", "value": "CC-BY"}
            ],
            "user": {"name": "ada"}
        });
        let values = FieldPath::parse("metadata.value").unwrap().resolve(&doc);
        assert_eq!(values, vec![&json!("Night Watch"), &json!("CC-BY")]);

        let indexed = FieldPath::parse("metadata[1].key").unwrap().resolve(&doc);
        assert_eq!(indexed, vec![&json!("rights")]);

        assert_eq!(FieldPath::parse("user.name").unwrap().resolve(&doc), vec![&json!("ada")]);
        assert!(FieldPath::parse("user.email").unwrap().resolve(&doc).is_empty());
    }

    #[test]
    fn scoped_key_splits_schema_and_field() {
        let key = ScopedKey::parse("entity:1|title").unwrap();
        let schema = key.schema.unwrap();
        assert_eq!(schema.schema_type(), "entity");
        assert_eq!(schema.version(), Some("1"));
        assert_eq!(schema.version_values(), vec![json!(1), json!("1")]);
        assert_eq!(key.field, "title");

        let plain = ScopedKey::parse("title").unwrap();
        assert!(plain.schema.is_none());
        assert_eq!(plain.field, "title");
    }

    #[test]
    fn scoped_key_rejects_missing_parts() {
        assert!(ScopedKey::parse("entity:1|").is_err());
        assert!(ScopedKey::parse("|title").is_err());
        assert!(ScopedKey::parse("entity:|title").is_err());
    }
}
