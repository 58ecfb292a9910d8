use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::common::SortOrder;
use crate::criteria::FilterCriterion;

/// Arguments of one filter call.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterRequest {
    pub criteria: Vec<FilterCriterion>,
    pub collection: String,
    pub skip: u64,
    /// `None` uses the configured default limit.
    pub limit: Option<u64>,
    /// `None` sorts by the configured default key.
    pub order_by: Option<String>,
    pub order: SortOrder,
}

impl FilterRequest {
    pub fn new(collection: &str, criteria: Vec<FilterCriterion>) -> Self {
        FilterRequest {
            criteria,
            collection: collection.to_string(),
            skip: 0,
            limit: None,
            order_by: None,
            order: SortOrder::Ascending,
        }
    }

    pub fn skip(mut self, skip: u64) -> Self {
        self.skip = skip;
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn order_by(mut self, key: &str, order: SortOrder) -> Self {
        self.order_by = Some(key.to_string());
        self.order = order;
        self
    }
}

/// Result of a filter call.
///
/// `count` is the number of matching documents before pagination. For
/// options requests `results` holds `{label, value}` pairs and `count`
/// their number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultSet {
    pub count: u64,
    pub results: Vec<Value>,
    pub limit: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip: Option<u64>,
}

impl ResultSet {
    pub fn documents(count: u64, results: Vec<Value>, limit: u64, skip: u64) -> Self {
        ResultSet {
            count,
            results,
            limit,
            skip: Some(skip),
        }
    }

    pub fn options(options: Vec<ValueOption>, limit: u64) -> Self {
        ResultSet {
            count: options.len() as u64,
            results: options.into_iter().map(ValueOption::into_value).collect(),
            limit,
            skip: None,
        }
    }
}

/// One entry of a filter dropdown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueOption {
    pub label: String,
    pub value: Value,
}

impl ValueOption {
    pub fn into_value(self) -> Value {
        let mut map = serde_json::Map::new();
        map.insert(crate::common::OPTION_LABEL.to_string(), Value::String(self.label));
        map.insert(crate::common::OPTION_VALUE.to_string(), self.value);
        Value::Object(map)
    }
}
