use serde_json::{json, Map, Value};

use crate::common::FieldTarget;
use crate::criteria::Lookup;
use crate::query::{OptionsPlan, QueryPlan, SortPlan};

/// Temporary field holding the sort value of an object-list sort.
pub const SORT_KEY_FIELD: &str = "__sort_key";

fn field_ref(path: &str) -> String {
    format!("${}", path)
}

pub fn lookup_stage(lookup: &Lookup) -> Value {
    json!({
        "$lookup": {
            "from": lookup.from,
            "localField": lookup.local_field,
            "foreignField": lookup.foreign_field,
            "as": lookup.alias,
        }
    })
}

/// Join and `$match` stages shared by every pipeline of a plan.
pub fn filter_stages(plan: &QueryPlan<Value>) -> Vec<Value> {
    let mut stages: Vec<Value> = plan.lookups.iter().map(lookup_stage).collect();
    if let Some(predicate) = &plan.predicate {
        stages.push(json!({ "$match": predicate }));
    }
    stages
}

fn sort_stages(sort: &SortPlan, id_key: &str) -> (Vec<Value>, bool) {
    let mut stages = Vec::new();
    let (sort_field, computed) = match &sort.target {
        FieldTarget::Root(path) => (path.dotted(), false),
        FieldTarget::ObjectList {
            list,
            discriminator,
            name,
            leaf,
        } => {
            let records = json!({
                "$filter": {
                    "input": { "$ifNull": [field_ref(list), []] },
                    "as": "item",
                    "cond": { "$eq": [format!("$$item.{}", discriminator), name] },
                }
            });
            stages.push(json!({
                "$addFields": {
                    SORT_KEY_FIELD: {
                        "$arrayElemAt": [
                            {
                                "$map": {
                                    "input": records,
                                    "as": "item",
                                    "in": format!("$$item.{}", leaf.dotted()),
                                }
                            },
                            0
                        ]
                    }
                }
            }));
            (SORT_KEY_FIELD.to_string(), true)
        }
    };

    let mut order = Map::new();
    order.insert(sort_field.clone(), json!(sort.order.direction()));
    if sort_field != id_key {
        order.insert(id_key.to_string(), json!(1));
    }
    stages.push(json!({ "$sort": order }));
    (stages, computed)
}

/// Pipeline returning one page of matching documents.
///
/// `$limit` rejects zero, so a zero limit leaves the stage out.
pub fn documents_pipeline(plan: &QueryPlan<Value>, id_key: &str) -> Vec<Value> {
    let mut stages = filter_stages(plan);
    let (sort, computed) = sort_stages(&plan.sort, id_key);
    stages.extend(sort);
    stages.push(json!({ "$skip": plan.skip }));
    if plan.limit > 0 {
        stages.push(json!({ "$limit": plan.limit }));
    }
    if computed {
        stages.push(json!({ "$unset": SORT_KEY_FIELD }));
    }
    stages
}

/// Pipeline counting matching documents, used when joins prevent a plain
/// count.
pub fn count_pipeline(plan: &QueryPlan<Value>) -> Vec<Value> {
    let mut stages = filter_stages(plan);
    stages.push(json!({ "$count": "count" }));
    stages
}

/// Pipeline producing `{value}` documents, one per distinct non-blank value.
pub fn options_pipeline(plan: &QueryPlan<Value>, options: &OptionsPlan) -> Vec<Value> {
    let mut stages = filter_stages(plan);
    let value_path = match &options.target {
        FieldTarget::Root(path) => {
            let path = path.dotted();
            stages.push(json!({ "$unwind": field_ref(&path) }));
            path
        }
        FieldTarget::ObjectList {
            list,
            discriminator,
            name,
            leaf,
        } => {
            let leaf_path = format!("{}.{}", list, leaf.dotted());
            stages.push(json!({ "$unwind": field_ref(list) }));
            let mut record = Map::new();
            record.insert(format!("{}.{}", list, discriminator), Value::String(name.clone()));
            stages.push(json!({ "$match": record }));
            stages.push(json!({ "$unwind": field_ref(&leaf_path) }));
            leaf_path
        }
    };
    stages.push(json!({ "$group": { "_id": field_ref(&value_path) } }));
    stages.push(json!({ "$match": { "_id": { "$nin": [null, ""] } } }));
    stages.push(json!({ "$project": { "_id": 0, "value": "$_id" } }));
    stages
}

/// Pipeline fetching the documents an option value refers to.
pub fn label_pipeline(id_key: &str, values: &[Value]) -> Vec<Value> {
    let mut condition = Map::new();
    condition.insert(id_key.to_string(), json!({ "$in": values }));
    vec![json!({ "$match": condition })]
}
