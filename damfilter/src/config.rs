//! Configuration of the filter engine.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::common::{
    ObjectListConfig, DEFAULT_LABEL_KEY, DEFAULT_LIMIT, DEFAULT_SCHEMA_TYPE_KEY,
    DEFAULT_SCHEMA_VERSION_KEY, DEFAULT_SORT_KEY, DEFAULT_TYPE_KEY, DOC_ID, MEMORY_ENGINE,
};
use crate::errors::{DamError, DamResult, ErrorKind};

/// Settings shared by every filter call.
///
/// `FilterConfig` is immutable once built and cheap to clone; clones share
/// the same settings.
///
/// # Examples
///
/// ```rust,ignore
/// use damfilter::config::FilterConfig;
///
/// let config = FilterConfig::builder()
///     .engine("mongo")
///     .default_limit(50)
///     .build()?;
/// assert_eq!(config.engine(), "mongo");
/// ```
#[derive(Clone, Debug)]
pub struct FilterConfig {
    inner: Arc<FilterConfigInner>,
}

impl Default for FilterConfig {
    fn default() -> Self {
        FilterConfig {
            inner: Arc::new(FilterConfigInner::default()),
        }
    }
}

impl FilterConfig {
    pub fn builder() -> FilterConfigBuilder {
        FilterConfigBuilder::new()
    }

    /// Reads a configuration document. Absent settings take their defaults.
    ///
    /// # Errors
    ///
    /// Returns [ErrorKind::ConfigurationError] when the document is not a
    /// valid configuration.
    pub fn from_json(json: &str) -> DamResult<FilterConfig> {
        let inner: FilterConfigInner = serde_json::from_str(json).map_err(|err| {
            log::error!("Invalid filter configuration: {}", err);
            DamError::new(
                &format!("Invalid filter configuration: {}", err),
                ErrorKind::ConfigurationError,
            )
        })?;
        inner.validate()?;
        Ok(FilterConfig {
            inner: Arc::new(inner),
        })
    }

    /// Name of the backend to run filters on.
    pub fn engine(&self) -> &str {
        &self.inner.engine
    }

    pub fn object_lists(&self) -> &ObjectListConfig {
        &self.inner.object_lists
    }

    pub fn default_limit(&self) -> u64 {
        self.inner.default_limit
    }

    pub fn default_sort_key(&self) -> &str {
        &self.inner.default_sort_key
    }

    /// Root field holding a document's type.
    pub fn type_key(&self) -> &str {
        &self.inner.type_key
    }

    pub fn schema_type_key(&self) -> &str {
        &self.inner.schema_type_key
    }

    pub fn schema_version_key(&self) -> &str {
        &self.inner.schema_version_key
    }

    /// Key read from a referenced document to label an option.
    pub fn label_key(&self) -> &str {
        &self.inner.label_key
    }

    pub fn id_key(&self) -> &str {
        &self.inner.id_key
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
struct FilterConfigInner {
    engine: String,
    object_lists: ObjectListConfig,
    default_limit: u64,
    default_sort_key: String,
    type_key: String,
    schema_type_key: String,
    schema_version_key: String,
    label_key: String,
    id_key: String,
}

impl Default for FilterConfigInner {
    fn default() -> Self {
        FilterConfigInner {
            engine: MEMORY_ENGINE.to_string(),
            object_lists: ObjectListConfig::default(),
            default_limit: DEFAULT_LIMIT,
            default_sort_key: DEFAULT_SORT_KEY.to_string(),
            type_key: DEFAULT_TYPE_KEY.to_string(),
            schema_type_key: DEFAULT_SCHEMA_TYPE_KEY.to_string(),
            schema_version_key: DEFAULT_SCHEMA_VERSION_KEY.to_string(),
            label_key: DEFAULT_LABEL_KEY.to_string(),
            id_key: DOC_ID.to_string(),
        }
    }
}

impl FilterConfigInner {
    fn validate(&self) -> DamResult<()> {
        let keys = [
            ("engine", &self.engine),
            ("default_sort_key", &self.default_sort_key),
            ("type_key", &self.type_key),
            ("schema_type_key", &self.schema_type_key),
            ("schema_version_key", &self.schema_version_key),
            ("label_key", &self.label_key),
            ("id_key", &self.id_key),
        ];
        if let Some((name, _)) = keys.iter().find(|(_, value)| value.trim().is_empty()) {
            log::error!("Configuration setting '{}' cannot be empty", name);
            return Err(DamError::new(
                &format!("Configuration setting '{}' cannot be empty", name),
                ErrorKind::ConfigurationError,
            ));
        }
        if self.default_limit == 0 {
            log::error!("Configuration setting 'default_limit' must be positive");
            return Err(DamError::new(
                "Configuration setting 'default_limit' must be positive",
                ErrorKind::ConfigurationError,
            ));
        }
        Ok(())
    }
}

/// Builder for [FilterConfig].
#[derive(Debug, Default)]
pub struct FilterConfigBuilder {
    inner: FilterConfigInner,
}

impl FilterConfigBuilder {
    pub fn new() -> Self {
        FilterConfigBuilder::default()
    }

    pub fn engine(mut self, engine: &str) -> Self {
        self.inner.engine = engine.to_string();
        self
    }

    pub fn object_lists(mut self, object_lists: ObjectListConfig) -> Self {
        self.inner.object_lists = object_lists;
        self
    }

    pub fn default_limit(mut self, limit: u64) -> Self {
        self.inner.default_limit = limit;
        self
    }

    pub fn default_sort_key(mut self, key: &str) -> Self {
        self.inner.default_sort_key = key.to_string();
        self
    }

    pub fn type_key(mut self, key: &str) -> Self {
        self.inner.type_key = key.to_string();
        self
    }

    pub fn schema_type_key(mut self, key: &str) -> Self {
        self.inner.schema_type_key = key.to_string();
        self
    }

    pub fn schema_version_key(mut self, key: &str) -> Self {
        self.inner.schema_version_key = key.to_string();
        self
    }

    pub fn label_key(mut self, key: &str) -> Self {
        self.inner.label_key = key.to_string();
        self
    }

    pub fn id_key(mut self, key: &str) -> Self {
        self.inner.id_key = key.to_string();
        self
    }

    pub fn build(self) -> DamResult<FilterConfig> {
        self.inner.validate()?;
        Ok(FilterConfig {
            inner: Arc::new(self.inner),
        })
    }
}
