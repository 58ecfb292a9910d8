use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Instant;

use damfilter::backend::arango::GraphStore;
use damfilter::backend::memory::{InMemoryStore, MemoryBackend};
use damfilter::backend::mongo::DocumentStore;
use damfilter::common::{CollectionObjectLists, ObjectListConfig};
use damfilter::config::FilterConfig;
use damfilter::errors::{DamError, DamResult, ErrorKind};
use damfilter::manager::FilterManager;
use parking_lot::Mutex;
use serde_json::{json, Map, Value};

pub const ENTITIES: &str = "entities";
pub const MEDIAFILES: &str = "mediafiles";

/// Runs a test between its setup and teardown.
///
/// The teardown also runs when the test fails. Failures are reported with
/// the elapsed time before the test panics.
pub fn run_test<T, B, A>(before: B, test: T, after: A)
where
    T: Fn(TestContext) -> DamResult<()> + std::panic::UnwindSafe + std::panic::RefUnwindSafe,
    B: Fn() -> DamResult<TestContext> + std::panic::UnwindSafe + std::panic::RefUnwindSafe,
    A: Fn(TestContext) -> DamResult<()> + std::panic::UnwindSafe + std::panic::RefUnwindSafe,
{
    let start_time = Instant::now();

    let result = std::panic::catch_unwind(|| match before() {
        Ok(ctx) => match test(ctx.clone()) {
            Ok(_) => after(ctx).map_err(|e| format!("After run failed: {:?}", e)),
            Err(e) => {
                let _ = after(ctx);
                Err(format!("Test failed: {:?}", e))
            }
        },
        Err(e) => Err(format!("Before run failed: {:?}", e)),
    });

    let elapsed = start_time.elapsed();
    let error = match result {
        Ok(Ok(_)) => return,
        Ok(Err(e)) => e,
        Err(panic_err) => {
            if let Some(s) = panic_err.downcast_ref::<&str>() {
                format!("Panic: {}", s)
            } else if let Some(s) = panic_err.downcast_ref::<String>() {
                format!("Panic: {}", s)
            } else {
                "Panic: unknown payload".to_string()
            }
        }
    };

    eprintln!("\n==================== TEST FAILED ====================");
    eprintln!("Failed after {:?}", elapsed);
    eprintln!("Error: {}", error);
    eprintln!("=====================================================\n");
    panic!("Test failed. Error: {}", error);
}

#[derive(Clone)]
pub struct TestContext {
    store: Arc<InMemoryStore>,
    manager: FilterManager,
}

impl TestContext {
    pub fn new(store: Arc<InMemoryStore>, manager: FilterManager) -> Self {
        Self { store, manager }
    }

    pub fn store(&self) -> Arc<InMemoryStore> {
        self.store.clone()
    }

    pub fn manager(&self) -> FilterManager {
        self.manager.clone()
    }

    /// Ids of `documents`, in order.
    pub fn ids(documents: &[Value]) -> Vec<String> {
        documents
            .iter()
            .filter_map(|document| document.get("_id").and_then(Value::as_str))
            .map(str::to_string)
            .collect()
    }
}

/// The entities every seeded context holds.
///
/// `entities/1` is a painting, `entities/2` a sculpture and `entities/3`
/// an asset without metadata. The museums they are kept in carry the
/// `museum` type.
pub fn seed_entities() -> Vec<Value> {
    vec![
        json!({
            "_id": "entities/1",
            "type": "asset",
            "schema": {"type": "entity", "version": 1},
            "date_created": "2021-03-01T10:00:00",
            "metadata": [
                {"key": "type", "value": "painting"},
                {"key": "title", "value": "The Starry Night"},
                {"key": "height", "value": 73},
                {"key": "public", "value": true},
                {"key": "rights", "value": "CC-BY"}
            ],
            "relations": [{"type": "isIn", "key": "entities/10"}]
        }),
        json!({
            "_id": "entities/2",
            "type": "asset",
            "schema": {"type": "entity", "version": 2},
            "date_created": "2021-03-02T10:00:00",
            "metadata": [
                {"key": "type", "value": "sculpture"},
                {"key": "title", "value": "The Thinker"},
                {"key": "height", "value": 186},
                {"key": "public", "value": false},
                {"key": "rights", "value": "CC0"}
            ],
            "relations": [{"type": "isIn", "key": "entities/11"}]
        }),
        json!({
            "_id": "entities/3",
            "type": "asset",
            "date_created": "2021-03-03T10:00:00"
        }),
        json!({
            "_id": "entities/10",
            "type": "museum",
            "date_created": "2020-01-01T00:00:00",
            "metadata": [
                {"key": "type", "value": "museum"},
                {"key": "title", "value": "MoMA"}
            ]
        }),
        json!({
            "_id": "entities/11",
            "type": "museum",
            "date_created": "2020-01-02T00:00:00",
            "metadata": [
                {"key": "type", "value": "museum"},
                {"key": "title", "value": "Musée Rodin"}
            ]
        }),
    ]
}

pub fn seed_mediafiles() -> Vec<Value> {
    vec![
        json!({"_id": "mediafiles/1", "entity_id": "entities/1", "filename": "starry_night.jpg", "mimetype": "image/jpeg"}),
        json!({"_id": "mediafiles/2", "entity_id": "entities/2", "filename": "thinker.png", "mimetype": "image/png"}),
        json!({"_id": "mediafiles/3", "entity_id": "entities/2", "filename": "thinker_back.jpg", "mimetype": "image/jpeg"}),
    ]
}

/// Default layout, except that media files keep every field at the root.
pub fn dam_config() -> DamResult<FilterConfig> {
    FilterConfig::builder()
        .object_lists(ObjectListConfig::default().with_collection(MEDIAFILES, CollectionObjectLists::default()))
        .build()
}

pub fn create_test_context() -> DamResult<TestContext> {
    create_test_context_with(dam_config()?)
}

pub fn create_test_context_with(config: FilterConfig) -> DamResult<TestContext> {
    let store = Arc::new(InMemoryStore::new());
    store.insert_many(ENTITIES, seed_entities())?;
    store.insert_many(MEDIAFILES, seed_mediafiles())?;

    let manager = FilterManager::builder()
        .config(config)
        .load_backend(MemoryBackend::new(store.clone()))
        .build()?;
    Ok(TestContext::new(store, manager))
}

pub fn cleanup(ctx: TestContext) -> DamResult<()> {
    ctx.store().clear();
    Ok(())
}

/// A [DocumentStore] that records every call and answers with queued rows.
#[derive(Default)]
pub struct RecordingDocumentStore {
    responses: Mutex<VecDeque<DamResult<Vec<Value>>>>,
    pipelines: Mutex<Vec<(String, Vec<Value>)>>,
    counted: Mutex<Vec<(String, Value)>>,
    count: Mutex<u64>,
}

impl RecordingDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues the rows answered to the next aggregation.
    pub fn respond(&self, rows: Vec<Value>) {
        self.responses.lock().push_back(Ok(rows));
    }

    /// Makes the next aggregation fail.
    pub fn fail(&self, message: &str) {
        self.responses
            .lock()
            .push_back(Err(DamError::new(message, ErrorKind::BackendError)));
    }

    pub fn set_count(&self, count: u64) {
        *self.count.lock() = count;
    }

    pub fn pipelines(&self) -> Vec<(String, Vec<Value>)> {
        self.pipelines.lock().clone()
    }

    pub fn counted(&self) -> Vec<(String, Value)> {
        self.counted.lock().clone()
    }
}

impl DocumentStore for RecordingDocumentStore {
    fn execute_aggregation(&self, collection: &str, pipeline: &[Value]) -> DamResult<Vec<Value>> {
        self.pipelines
            .lock()
            .push((collection.to_string(), pipeline.to_vec()));
        self.responses.lock().pop_front().unwrap_or_else(|| Ok(vec![]))
    }

    fn count_matching(&self, collection: &str, predicate: &Value) -> DamResult<u64> {
        self.counted
            .lock()
            .push((collection.to_string(), predicate.clone()));
        Ok(*self.count.lock())
    }
}

/// A [GraphStore] that records every query and answers with queued rows.
#[derive(Default)]
pub struct RecordingGraphStore {
    responses: Mutex<VecDeque<DamResult<Vec<Value>>>>,
    queries: Mutex<Vec<(String, Map<String, Value>)>>,
}

impl RecordingGraphStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(&self, rows: Vec<Value>) {
        self.responses.lock().push_back(Ok(rows));
    }

    pub fn fail(&self, message: &str) {
        self.responses
            .lock()
            .push_back(Err(DamError::new(message, ErrorKind::BackendError)));
    }

    pub fn queries(&self) -> Vec<(String, Map<String, Value>)> {
        self.queries.lock().clone()
    }
}

impl GraphStore for RecordingGraphStore {
    fn execute_graph_query(&self, query: &str, bind_vars: &Map<String, Value>) -> DamResult<Vec<Value>> {
        self.queries
            .lock()
            .push((query.to_string(), bind_vars.clone()));
        self.responses.lock().pop_front().unwrap_or_else(|| Ok(vec![]))
    }
}
