//! Graph-store backend: criteria compile to AQL with bind parameters.

mod aql;
mod matchers;
mod query;

pub use aql::*;
pub use matchers::*;
pub use query::*;

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::common::{DocumentNormalizer, StorageKeyNormalizer, ARANGO_ENGINE};
use crate::config::FilterConfig;
use crate::errors::{DamError, DamResult, ErrorKind};
use crate::query::{
    build_options, label_index, FilterRequest, OptionsPlan, OutputPlan, QueryEngine, QueryPlan,
    ResultSet,
};

use super::{backend_error, BackendConfig, QueryBackendProvider};

/// Connection to a graph store able to run AQL.
pub trait GraphStore: Send + Sync {
    fn execute_graph_query(
        &self,
        query: &str,
        bind_vars: &Map<String, Value>,
    ) -> DamResult<Vec<Value>>;
}

/// Runs filter requests as AQL queries on a [GraphStore].
pub struct ArangoBackend {
    store: Arc<dyn GraphStore>,
    engine: QueryEngine<ArangoMatchers>,
    normalizer: Arc<dyn DocumentNormalizer>,
    config: BackendConfig,
}

impl ArangoBackend {
    pub fn new<S: GraphStore + 'static>(store: S) -> Self {
        Self::from_arc(Arc::new(store))
    }

    pub fn from_arc(store: Arc<dyn GraphStore>) -> Self {
        ArangoBackend {
            store,
            engine: QueryEngine::new(ArangoMatchers),
            normalizer: Arc::new(StorageKeyNormalizer::for_graph_store()),
            config: BackendConfig::default(),
        }
    }

    pub fn with_normalizer<N: DocumentNormalizer + 'static>(mut self, normalizer: N) -> Self {
        self.normalizer = Arc::new(normalizer);
        self
    }

    /// Compiles `request` into its AQL query and bind variables without
    /// running it.
    pub fn explain(&self, request: &FilterRequest) -> DamResult<(String, Map<String, Value>)> {
        let config = self.config.get(ARANGO_ENGINE)?;
        let plan = self.engine.plan(config, request)?;
        let query = match &plan.output {
            OutputPlan::Documents => documents_query(&plan, config.id_key())?,
            OutputPlan::Options(options) => options_query(&plan, options)?,
        };
        Ok(query.render())
    }

    fn execute(&self, query: &Aql) -> DamResult<Vec<Value>> {
        let (text, bind_vars) = query.render();
        log::debug!("Running AQL {} with {}", text, Value::Object(bind_vars.clone()));
        self.store
            .execute_graph_query(&text, &bind_vars)
            .map_err(|err| backend_error(ARANGO_ENGINE, "run query", err))
    }

    fn count(&self, plan: &QueryPlan<Aql>) -> DamResult<u64> {
        let rows = self.execute(&count_query(plan)?)?;
        match rows.first() {
            None => Ok(0),
            Some(row) => row.as_u64().ok_or_else(|| {
                log::error!("Unexpected count result {}", row);
                DamError::new(&format!("Unexpected count result {}", row), ErrorKind::BackendError)
            }),
        }
    }

    fn documents(&self, config: &FilterConfig, plan: &QueryPlan<Aql>) -> DamResult<ResultSet> {
        let documents = self.execute(&documents_query(plan, config.id_key())?)?;
        let count = self.count(plan)?;
        let results = documents
            .into_iter()
            .map(|document| self.normalizer.prepare_document(document))
            .collect::<DamResult<Vec<_>>>()?;
        Ok(ResultSet::documents(count, results, plan.limit, plan.skip))
    }

    fn options(
        &self,
        config: &FilterConfig,
        plan: &QueryPlan<Aql>,
        options: &OptionsPlan,
    ) -> DamResult<ResultSet> {
        let values = self.execute(&options_query(plan, options)?)?;

        let labels = if options.resolve_labels && !values.is_empty() {
            let query = label_query(&options.label_collection, config.id_key(), &values);
            let documents = self.execute(&query)?;
            label_index(&documents, config.id_key(), &options.label_target)
        } else {
            HashMap::new()
        };
        Ok(ResultSet::options(build_options(values, &labels), plan.limit))
    }
}

impl QueryBackendProvider for ArangoBackend {
    fn name(&self) -> &str {
        ARANGO_ENGINE
    }

    fn initialize(&self, config: FilterConfig) -> DamResult<()> {
        self.config.set(ARANGO_ENGINE, config);
        Ok(())
    }

    fn filter(&self, request: &FilterRequest) -> DamResult<ResultSet> {
        let config = self.config.get(ARANGO_ENGINE)?;
        let plan = self.engine.plan(config, request)?;
        match &plan.output {
            OutputPlan::Documents => self.documents(config, &plan),
            OutputPlan::Options(options) => self.options(config, &plan, options),
        }
    }
}
