use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

/// Bounds of a range criterion: `{"min": .., "max": .., "included": ..}`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RangeValue {
    pub min: Option<Value>,
    pub max: Option<Value>,
    pub included: Option<bool>,
}

impl RangeValue {
    pub fn has_min(&self) -> bool {
        self.min.as_ref().is_some_and(|v| !v.is_null())
    }

    pub fn has_max(&self) -> bool {
        self.max.as_ref().is_some_and(|v| !v.is_null())
    }

    pub fn is_included(&self) -> bool {
        self.included == Some(true)
    }

    fn to_value(&self) -> Value {
        let mut map = Map::new();
        if let Some(min) = &self.min {
            map.insert("min".to_string(), min.clone());
        }
        if let Some(max) = &self.max {
            map.insert("max".to_string(), max.clone());
        }
        if let Some(included) = self.included {
            map.insert("included".to_string(), Value::Bool(included));
        }
        Value::Object(map)
    }
}

/// The `value` of a filter criterion, classified by shape.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum FilterValue {
    /// The criterion carried no `value` at all.
    #[default]
    Missing,
    Scalar(Value),
    List(Vec<Value>),
    Range(RangeValue),
}

fn is_range_object(map: &Map<String, Value>) -> bool {
    map.keys().all(|key| matches!(key.as_str(), "min" | "max" | "included"))
}

impl From<Value> for FilterValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Array(items) => FilterValue::List(items),
            Value::Object(map) if is_range_object(&map) => FilterValue::Range(RangeValue {
                min: map.get("min").cloned(),
                max: map.get("max").cloned(),
                included: map.get("included").and_then(Value::as_bool),
            }),
            other => FilterValue::Scalar(other),
        }
    }
}

impl FilterValue {
    pub fn is_missing(&self) -> bool {
        matches!(self, FilterValue::Missing)
    }

    pub fn as_scalar(&self) -> Option<&Value> {
        match self {
            FilterValue::Scalar(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_range(&self) -> Option<&RangeValue> {
        match self {
            FilterValue::Range(range) => Some(range),
            _ => None,
        }
    }

    /// The value as JSON, `None` when missing.
    pub fn to_json(&self) -> Option<Value> {
        match self {
            FilterValue::Missing => None,
            FilterValue::Scalar(value) => Some(value.clone()),
            FilterValue::List(items) => Some(Value::Array(items.clone())),
            FilterValue::Range(range) => Some(range.to_value()),
        }
    }
}

impl Serialize for FilterValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().unwrap_or(Value::Null).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for FilterValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Value::deserialize(deserializer).map(FilterValue::from)
    }
}
