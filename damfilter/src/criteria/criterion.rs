use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::common::ScopedKey;
use crate::errors::{DamError, DamResult, ErrorKind};

use super::FilterValue;

/// Kind of input a criterion filters on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputType {
    Text,
    Date,
    Number,
    Selection,
    Boolean,
    Type,
    Relation,
}

impl InputType {
    pub const ALL: [InputType; 7] = [
        InputType::Text,
        InputType::Date,
        InputType::Number,
        InputType::Selection,
        InputType::Boolean,
        InputType::Type,
        InputType::Relation,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            InputType::Text => "text",
            InputType::Date => "date",
            InputType::Number => "number",
            InputType::Selection => "selection",
            InputType::Boolean => "boolean",
            InputType::Type => "type",
            InputType::Relation => "relation",
        }
    }
}

impl Display for InputType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for InputType {
    type Err = DamError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        InputType::ALL
            .iter()
            .find(|input_type| input_type.as_str() == s)
            .copied()
            .ok_or_else(|| {
                log::error!("Unknown filter type '{}'", s);
                DamError::new(
                    &format!("Unknown filter type '{}'", s),
                    ErrorKind::ConfigurationError,
                )
            })
    }
}

/// `key` of a criterion: one field, or a list of `schema|field` keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterKey {
    Single(String),
    Scoped(Vec<String>),
}

impl Default for FilterKey {
    fn default() -> Self {
        FilterKey::Single(String::new())
    }
}

impl FilterKey {
    /// Parses every entry of the key.
    pub fn scoped_keys(&self) -> DamResult<Vec<ScopedKey>> {
        match self {
            FilterKey::Single(key) => Ok(vec![ScopedKey::parse(key)?]),
            FilterKey::Scoped(keys) => keys.iter().map(|key| ScopedKey::parse(key)).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            FilterKey::Single(key) => key.trim().is_empty(),
            FilterKey::Scoped(keys) => keys.is_empty(),
        }
    }
}

impl From<&str> for FilterKey {
    fn from(key: &str) -> Self {
        FilterKey::Single(key.to_string())
    }
}

impl From<Vec<&str>> for FilterKey {
    fn from(keys: Vec<&str>) -> Self {
        FilterKey::Scoped(keys.into_iter().map(str::to_string).collect())
    }
}

/// Join of another collection into each document before filtering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lookup {
    pub from: String,
    pub local_field: String,
    pub foreign_field: String,
    #[serde(rename = "as")]
    pub alias: String,
}

impl Lookup {
    pub fn new(from: &str, local_field: &str, foreign_field: &str, alias: &str) -> Self {
        Lookup {
            from: from.to_string(),
            local_field: local_field.to_string(),
            foreign_field: foreign_field.to_string(),
            alias: alias.to_string(),
        }
    }
}

/// `provide_value_options_for_key` accepts a flag or the key to collect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OptionsRequest {
    Flag(bool),
    Key(String),
}

/// One entry of a filter request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterCriterion {
    #[serde(rename = "type")]
    pub input_type: String,
    #[serde(default)]
    pub key: FilterKey,
    #[serde(default)]
    pub value: FilterValue,
    #[serde(default)]
    pub match_exact: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_types: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provide_value_options_for_key: Option<OptionsRequest>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lookup: Option<Lookup>,
}

impl FilterCriterion {
    pub fn new(input_type: InputType, key: impl Into<FilterKey>) -> Self {
        FilterCriterion {
            input_type: input_type.as_str().to_string(),
            key: key.into(),
            value: FilterValue::Missing,
            match_exact: false,
            item_types: None,
            provide_value_options_for_key: None,
            lookup: None,
        }
    }

    pub fn value(mut self, value: Value) -> Self {
        self.value = FilterValue::from(value);
        self
    }

    pub fn match_exact(mut self, match_exact: bool) -> Self {
        self.match_exact = match_exact;
        self
    }

    pub fn item_types(mut self, item_types: Vec<&str>) -> Self {
        self.item_types = Some(item_types.into_iter().map(str::to_string).collect());
        self
    }

    pub fn provide_options(mut self) -> Self {
        self.provide_value_options_for_key = Some(OptionsRequest::Flag(true));
        self
    }

    pub fn provide_options_for(mut self, key: &str) -> Self {
        self.provide_value_options_for_key = Some(OptionsRequest::Key(key.to_string()));
        self
    }

    pub fn lookup(mut self, lookup: Lookup) -> Self {
        self.lookup = Some(lookup);
        self
    }

    pub fn parsed_type(&self) -> DamResult<InputType> {
        self.input_type.parse()
    }

    /// Key whose distinct values are requested, if this is an options
    /// criterion.
    pub fn options_key(&self) -> Option<String> {
        match &self.provide_value_options_for_key {
            Some(OptionsRequest::Flag(true)) => match &self.key {
                FilterKey::Single(key) => Some(key.clone()),
                FilterKey::Scoped(keys) => keys.first().cloned(),
            },
            Some(OptionsRequest::Key(key)) if !key.trim().is_empty() => Some(key.clone()),
            _ => None,
        }
    }
}

/// Parses a JSON request body into criteria.
///
/// # Errors
///
/// Returns [ErrorKind::ValidationError] when the body is not an array of
/// criterion objects.
pub fn parse_criteria(body: &str) -> DamResult<Vec<FilterCriterion>> {
    serde_json::from_str(body).map_err(|err| {
        log::error!("Invalid filter request body: {}", err);
        DamError::new(
            &format!("Invalid filter request body: {}", err),
            ErrorKind::ValidationError,
        )
    })
}
