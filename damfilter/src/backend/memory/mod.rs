//! In-memory backend: criteria compile to an evaluable [Predicate] tree run
//! against an [InMemoryStore].

mod field_predicates;
mod matchers;
mod predicate;
mod store;

pub use matchers::*;
pub use predicate::{Predicate, PredicateProvider};
pub use store::*;

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use crate::common::{
    compare_values, loose_eq, DocumentNormalizer, FieldPath, StorageKeyNormalizer, MEMORY_ENGINE,
};
use crate::config::FilterConfig;
use crate::criteria::Lookup;
use crate::errors::DamResult;
use crate::query::{
    build_options, label_index, option_values, FilterRequest, OutputPlan, QueryEngine, QueryPlan,
    ResultSet, SortPlan,
};

use super::{BackendConfig, QueryBackendProvider};

/// Runs filter requests against an [InMemoryStore].
pub struct MemoryBackend {
    store: Arc<InMemoryStore>,
    engine: QueryEngine<MemoryMatchers>,
    normalizer: Arc<dyn DocumentNormalizer>,
    config: BackendConfig,
}

fn first_or_null(values: Vec<&Value>) -> Value {
    values.into_iter().next().cloned().unwrap_or(Value::Null)
}

impl MemoryBackend {
    pub fn new(store: Arc<InMemoryStore>) -> Self {
        MemoryBackend {
            store,
            engine: QueryEngine::new(MemoryMatchers),
            normalizer: Arc::new(StorageKeyNormalizer::new()),
            config: BackendConfig::default(),
        }
    }

    pub fn with_normalizer<N: DocumentNormalizer + 'static>(mut self, normalizer: N) -> Self {
        self.normalizer = Arc::new(normalizer);
        self
    }

    pub fn store(&self) -> &Arc<InMemoryStore> {
        &self.store
    }

    fn join(&self, documents: &mut [Value], lookup: &Lookup) -> DamResult<()> {
        let local = FieldPath::parse(&lookup.local_field)?;
        let foreign = FieldPath::parse(&lookup.foreign_field)?;
        let candidates = self.store.documents(&lookup.from);

        for document in documents.iter_mut() {
            let keys = option_values(local.resolve(document));
            let joined: Vec<Value> = candidates
                .iter()
                .filter(|candidate| {
                    option_values(foreign.resolve(candidate))
                        .iter()
                        .any(|value| keys.iter().any(|key| loose_eq(key, value)))
                })
                .cloned()
                .collect();
            if let Value::Object(map) = document {
                map.insert(lookup.alias.clone(), Value::Array(joined));
            }
        }
        Ok(())
    }

    fn sort(&self, config: &FilterConfig, documents: Vec<Value>, sort: &SortPlan) -> Vec<Value> {
        let id_path = FieldPath::field(config.id_key());
        let mut keyed: Vec<(Value, Value, Value)> = documents
            .into_iter()
            .map(|document| {
                let key = first_or_null(sort.target.values(&document));
                let id = first_or_null(id_path.resolve(&document));
                (key, id, document)
            })
            .collect();

        keyed.sort_by(|(a_key, a_id, _), (b_key, b_id, _)| {
            let ordering = compare_values(a_key, b_key);
            let ordering = if sort.order.is_ascending() { ordering } else { ordering.reverse() };
            match ordering {
                Ordering::Equal => compare_values(a_id, b_id),
                other => other,
            }
        });
        keyed.into_iter().map(|(_, _, document)| document).collect()
    }

    fn matching_documents(&self, plan: &QueryPlan<Predicate>) -> DamResult<Vec<Value>> {
        let mut documents = self.store.documents(&plan.collection);
        for lookup in &plan.lookups {
            self.join(&mut documents, lookup)?;
        }

        let Some(predicate) = &plan.predicate else {
            return Ok(documents);
        };
        let mut matched = Vec::new();
        for document in documents {
            if predicate.apply(&document)? {
                matched.push(document);
            }
        }
        Ok(matched)
    }
}

impl QueryBackendProvider for MemoryBackend {
    fn name(&self) -> &str {
        MEMORY_ENGINE
    }

    fn initialize(&self, config: FilterConfig) -> DamResult<()> {
        self.config.set(MEMORY_ENGINE, config);
        Ok(())
    }

    fn filter(&self, request: &FilterRequest) -> DamResult<ResultSet> {
        let config = self.config.get(MEMORY_ENGINE)?;
        let plan = self.engine.plan(config, request)?;
        match &plan.predicate {
            Some(predicate) => {
                log::debug!("Filtering '{}' in memory with {}", plan.collection, predicate)
            }
            None => log::debug!("Filtering '{}' in memory without predicate", plan.collection),
        }

        let matched = self.matching_documents(&plan)?;
        match &plan.output {
            OutputPlan::Documents => {
                let count = matched.len() as u64;
                let results = self
                    .sort(config, matched, &plan.sort)
                    .into_iter()
                    .skip(plan.skip as usize)
                    .take(plan.limit as usize)
                    .map(|document| self.normalizer.prepare_document(document))
                    .collect::<DamResult<Vec<_>>>()?;
                Ok(ResultSet::documents(count, results, plan.limit, plan.skip))
            }
            OutputPlan::Options(options) => {
                let values = matched.iter().flat_map(|document| options.target.values(document));
                let values = option_values(values);
                let labels = if options.resolve_labels {
                    label_index(
                        &self.store.documents(&options.label_collection),
                        config.id_key(),
                        &options.label_target,
                    )
                } else {
                    HashMap::new()
                };
                Ok(ResultSet::options(build_options(values, &labels), plan.limit))
            }
        }
    }
}
