use std::sync::Arc;

use damfilter::backend::arango::{ArangoBackend, GraphStore};
use damfilter::config::FilterConfig;
use damfilter::criteria::{FilterCriterion, InputType, Lookup};
use damfilter::errors::ErrorKind;
use damfilter::manager::FilterManager;
use damfilter_int_test::test_util::{dam_config, RecordingGraphStore, ENTITIES, MEDIAFILES};
use serde_json::{json, Value};

#[ctor::ctor]
fn init() {
    colog::init();
}

fn manager(store: Arc<RecordingGraphStore>) -> FilterManager {
    let config = FilterConfig::builder()
        .engine("arango")
        .id_key("_key")
        .object_lists(dam_config().unwrap().object_lists().clone())
        .build()
        .unwrap();
    let store: Arc<dyn GraphStore> = store;
    FilterManager::builder()
        .config(config)
        .load_backend(ArangoBackend::from_arc(store))
        .build()
        .unwrap()
}

#[test]
fn test_documents_and_count_share_filter() {
    let store = Arc::new(RecordingGraphStore::new());
    store.respond(vec![json!({"_key": "1", "_id": "entities/1", "_rev": "_hX1"})]);
    store.respond(vec![json!(1)]);
    let manager = manager(store.clone());

    let criterion = FilterCriterion::new(InputType::Text, "type").value(json!("paint"));
    let result = manager.filter(vec![criterion], 0, Some(20), ENTITIES, None, true).unwrap();
    assert_eq!(result.count, 1);
    assert_eq!(result.results, vec![json!({"_key": "1", "_id": "entities/1"})]);

    let queries = store.queries();
    assert_eq!(queries.len(), 2);
    let (documents, document_vars) = &queries[0];
    let (count, count_vars) = &queries[1];

    let filter_line = |query: &str| query.lines().find(|line| line.starts_with("FILTER")).map(str::to_string);
    assert!(filter_line(documents).is_some());
    assert_eq!(filter_line(documents), filter_line(count));
    assert!(documents.contains("SORT doc.`date_created` ASC, doc.`_key` ASC"), "{}", documents);
    assert!(count.ends_with("COLLECT WITH COUNT INTO total\nRETURN total"), "{}", count);

    assert_eq!(document_vars["@collection0"], json!(ENTITIES));
    assert_eq!(count_vars["value0"], json!("type"));
    assert_eq!(count_vars["value1"], json!("paint"));
    assert!(!documents.contains("paint"));
}

#[test]
fn test_pagination_is_bound() {
    let store = Arc::new(RecordingGraphStore::new());
    let manager = manager(store.clone());

    let result = manager.filter(vec![], 40, Some(20), ENTITIES, None, true).unwrap();
    assert_eq!(result.count, 0);
    assert_eq!(result.skip, Some(40));

    let (query, vars) = &store.queries()[0];
    assert!(query.contains("LIMIT @value0, @value1"), "{}", query);
    assert_eq!(vars["value0"], json!(40));
    assert_eq!(vars["value1"], json!(20));
}

#[test]
fn test_joins_merge_subquery() {
    let store = Arc::new(RecordingGraphStore::new());
    let manager = manager(store.clone());

    let criterion = FilterCriterion::new(InputType::Selection, "files.mimetype")
        .value(json!("image/png"))
        .lookup(Lookup::new(MEDIAFILES, "_id", "entity_id", "files"));
    manager.filter(vec![criterion], 0, None, ENTITIES, None, true).unwrap();

    let (query, vars) = &store.queries()[0];
    assert!(query.starts_with("FOR doc_raw IN @@collection0\nLET doc = MERGE(doc_raw, {`files`: (FOR other IN @@collection1"), "{}", query);
    assert!(query.contains("FILTER LENGTH(FOR joined IN (IS_ARRAY(doc.`files`) ? doc.`files` : [])"), "{}", query);
    assert_eq!(vars["@collection1"], json!(MEDIAFILES));
    assert!(vars.values().any(|value| value == &json!("image/png")));
}

#[test]
fn test_relation_options_resolve_labels() {
    let store = Arc::new(RecordingGraphStore::new());
    store.respond(vec![json!("entities/11"), json!("entities/10")]);
    store.respond(vec![
        json!({"_key": "entities/10", "metadata": [{"key": "title", "value": "MoMA"}]}),
        json!({"_key": "entities/11", "metadata": [{"key": "title", "value": "Musée Rodin"}]}),
    ]);
    let manager = manager(store.clone());

    let criterion = FilterCriterion::new(InputType::Relation, "isIn").provide_options();
    let result = manager.filter(vec![criterion], 0, None, ENTITIES, None, true).unwrap();
    assert_eq!(
        result.results,
        vec![
            json!({"label": "MoMA", "value": "entities/10"}),
            json!({"label": "Musée Rodin", "value": "entities/11"}),
        ]
    );

    let queries = store.queries();
    assert_eq!(queries.len(), 2);
    assert!(queries[0].0.ends_with("COLLECT value = option\nRETURN value"), "{}", queries[0].0);
    assert_eq!(
        queries[1].0,
        "FOR label_doc IN @@collection0 FILTER label_doc.`_key` IN @value0 RETURN label_doc"
    );
    assert_eq!(queries[1].1["value0"], json!(["entities/11", "entities/10"]));
}

#[test]
fn test_separate_scoped_criteria_share_one_or_group() {
    let store = Arc::new(RecordingGraphStore::new());
    let manager = manager(store.clone());

    let height = |key: &str| FilterCriterion::new(InputType::Number, vec![key]).value(json!({"min": 50}));
    let criteria = vec![height("entity:1|height"), height("entity:2|height")];
    manager.filter(criteria, 0, None, ENTITIES, None, true).unwrap();

    let (query, vars) = &store.queries()[0];
    let filter = query
        .lines()
        .find(|line| line.starts_with("FILTER"))
        .unwrap_or_default();
    assert_eq!(filter.matches(" OR ").count(), 1, "{}", filter);
    assert!(vars.values().any(|value| value == &json!([1, "1"])));
    assert!(vars.values().any(|value| value == &json!([2, "2"])));
}

#[test]
fn test_datetimes_are_compared_as_timestamps() {
    let store = Arc::new(RecordingGraphStore::new());
    let manager = manager(store.clone());

    let criterion = FilterCriterion::new(InputType::Date, "date_created")
        .value(json!({"max": "2021-06-01T11:00", "included": true}));
    manager.filter(vec![criterion], 0, None, ENTITIES, None, true).unwrap();

    let (query, vars) = &store.queries()[0];
    assert!(query.contains("DATE_TIMESTAMP(doc_value) <= DATE_TIMESTAMP(@value"), "{}", query);
    assert!(vars.values().any(|value| value == &json!("2021-06-01T11:00:00")));
}

#[test]
fn test_validation_happens_before_any_query() {
    let store = Arc::new(RecordingGraphStore::new());
    let manager = manager(store.clone());

    let criterion = FilterCriterion::new(InputType::Number, "height").value(json!({"min": 10, "max": 2}));
    let err = manager.filter(vec![criterion], 0, None, ENTITIES, None, true).unwrap_err();
    assert_eq!(err.kind(), &ErrorKind::ValidationError);
    assert!(store.queries().is_empty());
}

#[test]
fn test_store_failures_propagate_unchanged() {
    let store = Arc::new(RecordingGraphStore::new());
    store.fail("cluster unavailable");
    let manager = manager(store.clone());

    let err = manager.filter(vec![], 0, None, ENTITIES, None, true).unwrap_err();
    assert_eq!(err.kind(), &ErrorKind::BackendError);
    assert_eq!(err.message(), "cluster unavailable");
}

#[test]
fn test_no_value_is_inlined() {
    let store = Arc::new(RecordingGraphStore::new());
    let manager = manager(store.clone());

    let body = r#"[
        {"type": "text", "key": "title", "value": "\" OR true OR \""},
        {"type": "selection", "key": "rights", "value": ["CC0"]},
        {"type": "date", "key": "date_created", "value": {"min": "2021-01-01T00:00", "max": "2021-12-31T23:59"}}
    ]"#;
    manager.filter_json(body, 0, None, ENTITIES, None, true).unwrap();

    let (query, vars) = &store.queries()[0];
    assert!(!query.contains("OR true"), "{}", query);
    assert!(!query.contains("CC0"), "{}", query);
    assert!(!query.contains("2021"), "{}", query);
    assert!(vars.values().any(|value| value == &Value::String("\" or true or \"".to_string())));
}
