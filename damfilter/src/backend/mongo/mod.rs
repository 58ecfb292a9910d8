//! Document-store backend: criteria compile to an aggregation pipeline.

mod matchers;
mod pipeline;

pub use matchers::*;
pub use pipeline::*;

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{json, Value};

use crate::common::{DocumentNormalizer, StorageKeyNormalizer, MONGO_ENGINE};
use crate::config::FilterConfig;
use crate::errors::{DamError, DamResult, ErrorKind};
use crate::query::{
    build_options, label_index, FilterRequest, OptionsPlan, OutputPlan, QueryEngine, QueryPlan,
    ResultSet,
};

use super::{backend_error, BackendConfig, QueryBackendProvider};

/// Connection to a document store, consumed only through aggregation and
/// counting.
pub trait DocumentStore: Send + Sync {
    fn execute_aggregation(&self, collection: &str, pipeline: &[Value]) -> DamResult<Vec<Value>>;

    fn count_matching(&self, collection: &str, predicate: &Value) -> DamResult<u64>;
}

/// Runs filter requests as aggregation pipelines on a [DocumentStore].
pub struct MongoBackend {
    store: Arc<dyn DocumentStore>,
    engine: QueryEngine<MongoMatchers>,
    normalizer: Arc<dyn DocumentNormalizer>,
    config: BackendConfig,
}

impl MongoBackend {
    pub fn new<S: DocumentStore + 'static>(store: S) -> Self {
        Self::from_arc(Arc::new(store))
    }

    pub fn from_arc(store: Arc<dyn DocumentStore>) -> Self {
        MongoBackend {
            store,
            engine: QueryEngine::new(MongoMatchers),
            normalizer: Arc::new(StorageKeyNormalizer::new()),
            config: BackendConfig::default(),
        }
    }

    pub fn with_normalizer<N: DocumentNormalizer + 'static>(mut self, normalizer: N) -> Self {
        self.normalizer = Arc::new(normalizer);
        self
    }

    /// Compiles `request` into its document pipeline without running it.
    pub fn explain(&self, request: &FilterRequest) -> DamResult<Vec<Value>> {
        let config = self.config.get(MONGO_ENGINE)?;
        let plan = self.engine.plan(config, request)?;
        Ok(match &plan.output {
            OutputPlan::Documents => documents_pipeline(&plan, config.id_key()),
            OutputPlan::Options(options) => options_pipeline(&plan, options),
        })
    }

    fn aggregate(&self, collection: &str, pipeline: &[Value]) -> DamResult<Vec<Value>> {
        log::debug!(
            "Aggregating '{}' with {}",
            collection,
            Value::Array(pipeline.to_vec())
        );
        self.store
            .execute_aggregation(collection, pipeline)
            .map_err(|err| backend_error(MONGO_ENGINE, "run aggregation", err))
    }

    fn count(&self, plan: &QueryPlan<Value>) -> DamResult<u64> {
        if plan.lookups.is_empty() {
            let predicate = plan.predicate.clone().unwrap_or_else(|| json!({}));
            return self
                .store
                .count_matching(&plan.collection, &predicate)
                .map_err(|err| backend_error(MONGO_ENGINE, "count documents", err));
        }

        let rows = self.aggregate(&plan.collection, &count_pipeline(plan))?;
        match rows.first() {
            None => Ok(0),
            Some(row) => row.get("count").and_then(Value::as_u64).ok_or_else(|| {
                log::error!("Unexpected count result {}", row);
                DamError::new(&format!("Unexpected count result {}", row), ErrorKind::BackendError)
            }),
        }
    }

    fn documents(&self, config: &FilterConfig, plan: &QueryPlan<Value>) -> DamResult<ResultSet> {
        if plan.limit == 0 {
            let count = self.count(plan)?;
            return Ok(ResultSet::documents(count, vec![], plan.limit, plan.skip));
        }

        let pipeline = documents_pipeline(plan, config.id_key());
        let documents = self.aggregate(&plan.collection, &pipeline)?;
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
        plan: &QueryPlan<Value>,
        options: &OptionsPlan,
    ) -> DamResult<ResultSet> {
        let rows = self.aggregate(&plan.collection, &options_pipeline(plan, options))?;
        let values: Vec<Value> = rows
            .into_iter()
            .filter_map(|mut row| row.get_mut("value").map(Value::take))
            .collect();

        let labels = if options.resolve_labels && !values.is_empty() {
            let pipeline = label_pipeline(config.id_key(), &values);
            let documents = self.aggregate(&options.label_collection, &pipeline)?;
            label_index(&documents, config.id_key(), &options.label_target)
        } else {
            HashMap::new()
        };
        Ok(ResultSet::options(build_options(values, &labels), plan.limit))
    }
}

impl QueryBackendProvider for MongoBackend {
    fn name(&self) -> &str {
        MONGO_ENGINE
    }

    fn initialize(&self, config: FilterConfig) -> DamResult<()> {
        self.config.set(MONGO_ENGINE, config);
        Ok(())
    }

    fn filter(&self, request: &FilterRequest) -> DamResult<ResultSet> {
        let config = self.config.get(MONGO_ENGINE)?;
        let plan = self.engine.plan(config, request)?;
        match &plan.output {
            OutputPlan::Documents => self.documents(config, &plan),
            OutputPlan::Options(options) => self.options(config, &plan, options),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::criteria::{FilterCriterion, InputType};
    use parking_lot::Mutex;

    #[derive(Default)]
    struct ScriptedStore {
        responses: Mutex<Vec<Vec<Value>>>,
        pipelines: Mutex<Vec<(String, Vec<Value>)>>,
        counts: Mutex<Vec<Value>>,
    }

    impl DocumentStore for ScriptedStore {
        fn execute_aggregation(&self, collection: &str, pipeline: &[Value]) -> DamResult<Vec<Value>> {
            self.pipelines.lock().push((collection.to_string(), pipeline.to_vec()));
            let mut responses = self.responses.lock();
            Ok(if responses.is_empty() { vec![] } else { responses.remove(0) })
        }

        fn count_matching(&self, _collection: &str, predicate: &Value) -> DamResult<u64> {
            self.counts.lock().push(predicate.clone());
            Ok(42)
        }
    }

    struct FailingStore;

    impl DocumentStore for FailingStore {
        fn execute_aggregation(&self, _: &str, _: &[Value]) -> DamResult<Vec<Value>> {
            Err(DamError::new("connection refused", ErrorKind::BackendError))
        }

        fn count_matching(&self, _: &str, _: &Value) -> DamResult<u64> {
            Ok(0)
        }
    }

    fn backend(store: Arc<ScriptedStore>) -> MongoBackend {
        let backend = MongoBackend::from_arc(store);
        backend.initialize(FilterConfig::default()).unwrap();
        backend
    }

    #[test]
    fn documents_are_counted_with_the_same_predicate() {
        let store = Arc::new(ScriptedStore::default());
        store.responses.lock().push(vec![json!({"_id": "1", "a\u{FF0E}b": 1})]);
        let backend = backend(store.clone());

        let criterion = FilterCriterion::new(InputType::Text, "type").value(json!("paint"));
        let result = backend.filter(&FilterRequest::new("entities", vec![criterion])).unwrap();

        assert_eq!(result.count, 42);
        assert_eq!(result.results, vec![json!({"_id": "1", "a.b": 1})]);
        let pipelines = store.pipelines.lock();
        let match_stage = &pipelines[0].1[0]["$match"];
        assert_eq!(&store.counts.lock()[0], match_stage);
    }

    #[test]
    fn backend_errors_propagate_unchanged() {
        let backend = MongoBackend::new(FailingStore);
        backend.initialize(FilterConfig::default()).unwrap();
        let err = backend.filter(&FilterRequest::new("entities", vec![])).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::BackendError);
        assert_eq!(err.message(), "connection refused");
    }

    #[test]
    fn relation_options_are_labelled() {
        let store = Arc::new(ScriptedStore::default());
        store.responses.lock().push(vec![json!({"value": "entities/2"}), json!({"value": "entities/1"})]);
        store.responses.lock().push(vec![
            json!({"_id": "entities/1", "metadata": [{"key": "title", "value": "Ghent"}]}),
            json!({"_id": "entities/2", "metadata": [{"key": "title", "value": "Antwerp"}]}),
        ]);
        let backend = backend(store.clone());

        let criterion = FilterCriterion::new(InputType::Relation, "isIn").provide_options();
        let result = backend.filter(&FilterRequest::new("entities", vec![criterion])).unwrap();
        assert_eq!(
            result.results,
            vec![
                json!({"label": "Antwerp", "value": "entities/2"}),
                json!({"label": "Ghent", "value": "entities/1"}),
            ]
        );
        let pipelines = store.pipelines.lock();
        assert_eq!(
            pipelines[1].1,
            vec![json!({"$match": {"_id": {"$in": ["entities/2", "entities/1"]}}})]
        );
    }

    #[test]
    fn explain_renders_without_running() {
        let store = Arc::new(ScriptedStore::default());
        let backend = backend(store.clone());
        let pipeline = backend.explain(&FilterRequest::new("entities", vec![]).limit(3)).unwrap();
        assert_eq!(pipeline.last(), Some(&json!({"$limit": 3})));
        assert!(store.pipelines.lock().is_empty());
    }

    #[test]
    fn zero_limit_only_counts() {
        let store = Arc::new(ScriptedStore::default());
        let backend = backend(store.clone());

        let request = FilterRequest::new("entities", vec![]).limit(0);
        let result = backend.filter(&request).unwrap();
        assert_eq!(result.count, 42);
        assert!(result.results.is_empty());
        assert_eq!(result.limit, 0);
        assert!(store.pipelines.lock().is_empty());
        assert_eq!(store.counts.lock().len(), 1);

        let pipeline = backend.explain(&request).unwrap();
        assert!(pipeline.iter().all(|stage| stage.get("$limit").is_none()), "{:?}", pipeline);
    }
}
