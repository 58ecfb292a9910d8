use std::sync::Arc;

use crate::backend::{QueryBackend, QueryBackendProvider};
use crate::common::SortOrder;
use crate::config::FilterConfig;
use crate::criteria::{parse_criteria, FilterCriterion};
use crate::errors::{DamError, DamResult, ErrorKind};
use crate::query::{FilterRequest, ResultSet};

/// Entry point of the filter engine.
///
/// A `FilterManager` holds the configuration and the one backend selected
/// by [FilterConfig::engine]. It is cheap to clone; all clones share the
/// same backend.
///
/// # Examples
///
/// ```rust,ignore
/// use std::sync::Arc;
/// use damfilter::backend::memory::{InMemoryStore, MemoryBackend};
/// use damfilter::manager::FilterManager;
///
/// let store = Arc::new(InMemoryStore::new());
/// let manager = FilterManager::builder()
///     .load_backend(MemoryBackend::new(store))
///     .build()?;
/// let body = r#"[{"type": "text", "key": "title", "value": "night"}]"#;
/// let result = manager.filter_json(body, 0, None, "entities", None, true)?;
/// ```
#[derive(Clone)]
pub struct FilterManager {
    inner: Arc<FilterManagerInner>,
}

impl FilterManager {
    pub fn builder() -> FilterManagerBuilder {
        FilterManagerBuilder::new()
    }

    pub fn config(&self) -> &FilterConfig {
        &self.inner.config
    }

    pub fn backend(&self) -> &QueryBackend {
        &self.inner.backend
    }

    /// Runs `criteria` against `collection`.
    ///
    /// `limit` defaults to the configured limit and `order_by` to the
    /// configured sort key.
    pub fn filter(
        &self,
        criteria: Vec<FilterCriterion>,
        skip: u64,
        limit: Option<u64>,
        collection: &str,
        order_by: Option<&str>,
        asc: bool,
    ) -> DamResult<ResultSet> {
        let mut request = FilterRequest::new(collection, criteria).skip(skip);
        request.limit = limit;
        request.order_by = order_by.map(str::to_string);
        request.order = SortOrder::from_asc(asc);
        self.filter_request(&request)
    }

    pub fn filter_request(&self, request: &FilterRequest) -> DamResult<ResultSet> {
        self.inner.filter(request)
    }

    /// Like [FilterManager::filter] with criteria given as a JSON request
    /// body.
    pub fn filter_json(
        &self,
        body: &str,
        skip: u64,
        limit: Option<u64>,
        collection: &str,
        order_by: Option<&str>,
        asc: bool,
    ) -> DamResult<ResultSet> {
        let criteria = parse_criteria(body)?;
        self.filter(criteria, skip, limit, collection, order_by, asc)
    }
}

impl std::fmt::Debug for FilterManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilterManager")
            .field("engine", &self.inner.config.engine())
            .field("backend", &self.inner.backend)
            .finish()
    }
}

struct FilterManagerInner {
    config: FilterConfig,
    backend: QueryBackend,
}

impl FilterManagerInner {
    fn filter(&self, request: &FilterRequest) -> DamResult<ResultSet> {
        log::debug!(
            "Filtering '{}' with {} criteria on {}",
            request.collection,
            request.criteria.len(),
            self.backend.name()
        );
        self.backend.filter(request)
    }
}

/// Builder for [FilterManager].
///
/// Errors raised while configuring are kept and returned by
/// [FilterManagerBuilder::build].
#[derive(Default)]
pub struct FilterManagerBuilder {
    error: Option<DamError>,
    config: Option<FilterConfig>,
    backends: Vec<QueryBackend>,
}

impl FilterManagerBuilder {
    pub fn new() -> Self {
        FilterManagerBuilder::default()
    }

    pub fn config(mut self, config: FilterConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Reads the configuration from JSON.
    pub fn config_json(mut self, json: &str) -> Self {
        if self.error.is_none() {
            match FilterConfig::from_json(json) {
                Ok(config) => self.config = Some(config),
                Err(e) => self.error = Some(e),
            }
        }
        self
    }

    /// Registers a backend. Only the one named by the configured engine is
    /// initialized.
    pub fn load_backend<T: QueryBackendProvider + 'static>(mut self, backend: T) -> Self {
        if self.error.is_none() {
            if self.backends.iter().any(|known| known.name() == backend.name()) {
                log::error!("Backend '{}' is already loaded", backend.name());
                self.error = Some(DamError::new(
                    &format!("Backend '{}' is already loaded", backend.name()),
                    ErrorKind::ConfigurationError,
                ));
            } else {
                self.backends.push(QueryBackend::new(backend));
            }
        }
        self
    }

    pub fn build(self) -> DamResult<FilterManager> {
        if let Some(error) = self.error {
            return Err(error);
        }

        let config = self.config.unwrap_or_default();
        let engine = config.engine().to_string();
        let backend = self
            .backends
            .into_iter()
            .find(|backend| backend.name() == engine)
            .ok_or_else(|| {
                log::error!("No backend loaded for engine '{}'", engine);
                DamError::new(
                    &format!("No backend loaded for engine '{}'", engine),
                    ErrorKind::ConfigurationError,
                )
            })?;

        backend.initialize(config.clone())?;
        log::info!("Filter engine initialized with the '{}' backend", engine);

        Ok(FilterManager {
            inner: Arc::new(FilterManagerInner { config, backend }),
        })
    }
}
