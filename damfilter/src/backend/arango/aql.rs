use std::fmt::{Display, Formatter};

use serde_json::{Map, Value};

use crate::common::{FieldPath, Segment};

/// One piece of an AQL query.
#[derive(Debug, Clone, PartialEq)]
pub enum AqlPart {
    Text(String),
    /// A value passed as a bind parameter.
    Bind(Value),
    /// A collection name passed as a collection bind parameter.
    Collection(String),
}

/// An AQL query under construction.
///
/// Values never appear in the query text; [Aql::render] numbers them as
/// `@value0`, `@value1`, ... and collections as `@@collection0`, ...
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Aql {
    parts: Vec<AqlPart>,
}

impl Aql {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(text: &str) -> Self {
        Aql::new().push(text)
    }

    pub fn bind(value: Value) -> Self {
        Aql::new().push_bind(value)
    }

    pub fn push(mut self, text: &str) -> Self {
        self.parts.push(AqlPart::Text(text.to_string()));
        self
    }

    pub fn push_bind(mut self, value: Value) -> Self {
        self.parts.push(AqlPart::Bind(value));
        self
    }

    pub fn push_collection(mut self, collection: &str) -> Self {
        self.parts.push(AqlPart::Collection(collection.to_string()));
        self
    }

    pub fn append(mut self, other: Aql) -> Self {
        self.parts.extend(other.parts);
        self
    }

    /// Joins `items` with `separator` between each pair.
    pub fn join(items: Vec<Aql>, separator: &str) -> Aql {
        let mut joined = Aql::new();
        for (i, item) in items.into_iter().enumerate() {
            if i > 0 {
                joined = joined.push(separator);
            }
            joined = joined.append(item);
        }
        joined
    }

    pub fn parts(&self) -> &[AqlPart] {
        &self.parts
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// Produces the query text and its bind variables.
    pub fn render(&self) -> (String, Map<String, Value>) {
        let mut query = String::new();
        let mut bind_vars = Map::new();
        let mut value_count = 0;
        let mut collections: Vec<&str> = Vec::new();

        for part in &self.parts {
            match part {
                AqlPart::Text(text) => query.push_str(text),
                AqlPart::Bind(value) => {
                    let name = format!("value{}", value_count);
                    value_count += 1;
                    query.push('@');
                    query.push_str(&name);
                    bind_vars.insert(name, value.clone());
                }
                AqlPart::Collection(collection) => {
                    let position = collections
                        .iter()
                        .position(|known| *known == collection.as_str());
                    let index = match position {
                        Some(index) => index,
                        None => {
                            collections.push(collection.as_str());
                            collections.len() - 1
                        }
                    };
                    let name = format!("@collection{}", index);
                    query.push('@');
                    query.push_str(&name);
                    bind_vars.insert(name, Value::String(collection.clone()));
                }
            }
        }
        (query, bind_vars)
    }
}

impl Display for Aql {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let (query, bind_vars) = self.render();
        write!(f, "{} {}", query, Value::Object(bind_vars))
    }
}

/// Quotes an attribute name with backticks.
pub fn quote(name: &str) -> String {
    format!("`{}`", name.replace('\\', "\\\\").replace('`', "\\`"))
}

/// Attribute access on `variable`, e.g. ``doc.`a`.`b`[0]``.
pub fn attribute(variable: &str, path: &FieldPath) -> String {
    let mut access = variable.to_string();
    for segment in path.segments() {
        match segment {
            Segment::Field(name) => {
                access.push('.');
                access.push_str(&quote(name));
            }
            Segment::Index(index) => access.push_str(&format!("[{}]", index)),
        }
    }
    access
}

/// Attribute access expanding every array along the path except the last
/// segment, e.g. ``doc.`relations`[*].`key` ``.
pub fn expanded_attribute(variable: &str, path: &FieldPath) -> String {
    let mut access = variable.to_string();
    let last = path.len().saturating_sub(1);
    for (i, segment) in path.segments().iter().enumerate() {
        match segment {
            Segment::Field(name) => {
                access.push('.');
                access.push_str(&quote(name));
                if i < last {
                    access.push_str("[*]");
                }
            }
            Segment::Index(index) => access.push_str(&format!("[{}]", index)),
        }
    }
    access
}

/// `expression` as a list: arrays unchanged, anything else wrapped.
pub fn as_list(expression: &str) -> String {
    format!("(IS_ARRAY({0}) ? {0} : [{0}])", expression)
}
