//! Storage backends. Each backend compiles a [crate::query::QueryPlan] into
//! its native query form and executes it.

pub mod arango;
pub mod memory;
pub mod mongo;

use std::ops::Deref;
use std::sync::{Arc, OnceLock};

use crate::config::FilterConfig;
use crate::errors::{DamError, DamResult, ErrorKind};
use crate::query::{FilterRequest, ResultSet};

/// A storage engine able to run filter requests.
pub trait QueryBackendProvider: Send + Sync {
    /// Engine name matched against [FilterConfig::engine].
    fn name(&self) -> &str;

    /// Called once when the backend is selected.
    fn initialize(&self, config: FilterConfig) -> DamResult<()>;

    fn filter(&self, request: &FilterRequest) -> DamResult<ResultSet>;
}

/// Cloneable handle to a [QueryBackendProvider].
#[derive(Clone)]
pub struct QueryBackend {
    inner: Arc<dyn QueryBackendProvider>,
}

impl QueryBackend {
    pub fn new<T: QueryBackendProvider + 'static>(inner: T) -> Self {
        QueryBackend { inner: Arc::new(inner) }
    }
}

impl Deref for QueryBackend {
    type Target = Arc<dyn QueryBackendProvider>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl std::fmt::Debug for QueryBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "QueryBackend({})", self.inner.name())
    }
}

/// Configuration slot shared by the backend implementations.
#[derive(Debug, Default)]
pub(crate) struct BackendConfig {
    config: OnceLock<FilterConfig>,
}

impl BackendConfig {
    pub(crate) fn set(&self, name: &str, config: FilterConfig) {
        if self.config.set(config).is_err() {
            log::warn!(
                "Backend '{}' is already initialized, keeping the first configuration",
                name
            );
        }
    }

    pub(crate) fn get(&self, name: &str) -> DamResult<&FilterConfig> {
        self.config.get().ok_or_else(|| {
            log::error!("Backend '{}' is not initialized", name);
            DamError::new(
                &format!("Backend '{}' is not initialized", name),
                ErrorKind::ConfigurationError,
            )
        })
    }
}

/// Wraps a store failure as a backend error.
pub(crate) fn backend_error(engine: &str, operation: &str, cause: DamError) -> DamError {
    if cause.kind() == &ErrorKind::BackendError {
        return cause;
    }
    log::error!("{} backend failed to {}: {}", engine, operation, cause);
    DamError::new_with_cause(
        &format!("{} backend failed to {}", engine, operation),
        ErrorKind::BackendError,
        cause,
    )
}
