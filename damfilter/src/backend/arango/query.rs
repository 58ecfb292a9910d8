use serde_json::Value;

use crate::common::{FieldPath, FieldTarget};
use crate::criteria::Lookup;
use crate::errors::DamResult;
use crate::matcher::ROOT_SCOPE;
use crate::query::{OptionsPlan, QueryPlan, SortPlan};

use super::aql::{as_list, attribute, expanded_attribute, quote, Aql};

const RAW_SCOPE: &str = "doc_raw";

/// Subquery collecting the documents of `lookup.from` joined to `doc_raw`.
fn lookup_subquery(lookup: &Lookup) -> DamResult<Aql> {
    let local = expanded_attribute(RAW_SCOPE, &FieldPath::parse(&lookup.local_field)?);
    let foreign = attribute("other", &FieldPath::parse(&lookup.foreign_field)?);
    Ok(Aql::text(&format!("{}: (FOR other IN ", quote(&lookup.alias)))
        .push_collection(&lookup.from)
        .push(&format!(" FILTER {} IN FLATTEN({}) RETURN other)", foreign, as_list(&local))))
}

/// Loop over the plan's collection binding `doc`, joins merged in, and the
/// `FILTER` of its predicate.
pub fn source(plan: &QueryPlan<Aql>) -> DamResult<Aql> {
    let mut query = if plan.lookups.is_empty() {
        Aql::text(&format!("FOR {} IN ", ROOT_SCOPE))
            .push_collection(&plan.collection)
            .push("\n")
    } else {
        let joins = plan.lookups.iter().map(lookup_subquery).collect::<DamResult<Vec<_>>>()?;
        Aql::text(&format!("FOR {} IN ", RAW_SCOPE))
            .push_collection(&plan.collection)
            .push(&format!("\nLET {} = MERGE({}, {{", ROOT_SCOPE, RAW_SCOPE))
            .append(Aql::join(joins, ", "))
            .push("})\n")
    };
    if let Some(predicate) = &plan.predicate {
        query = query.push("FILTER ").append(predicate.clone()).push("\n");
    }
    Ok(query)
}

/// Loop header over the records of an object list matching its
/// discriminator, binding `var`.
fn records(var: &str, list: &str, discriminator: &str, name: &str) -> Aql {
    let list = attribute(ROOT_SCOPE, &FieldPath::field(list));
    Aql::text(&format!(
        "FOR {1} IN (IS_ARRAY({0}) ? {0} : []) FILTER {1}.{2} == ",
        list,
        var,
        quote(discriminator)
    ))
    .push_bind(Value::String(name.to_string()))
}

fn sort_expression(sort: &SortPlan) -> Aql {
    match &sort.target {
        FieldTarget::Root(path) => Aql::text(&attribute(ROOT_SCOPE, path)),
        FieldTarget::ObjectList {
            list,
            discriminator,
            name,
            leaf,
        } => Aql::text("FIRST(")
            .append(records("sort_item", list, discriminator, name))
            .push(&format!(" RETURN {})", attribute("sort_item", leaf))),
    }
}

/// Query returning one page of matching documents.
pub fn documents_query(plan: &QueryPlan<Aql>, id_key: &str) -> DamResult<Aql> {
    let id = attribute(ROOT_SCOPE, &FieldPath::field(id_key));
    let mut query = source(plan)?.push("SORT ").append(sort_expression(&plan.sort));
    query = query.push(&format!(" {}", plan.sort.order.keyword()));
    if !matches!(&plan.sort.target, FieldTarget::Root(path) if path.dotted() == id_key) {
        query = query.push(&format!(", {} ASC", id));
    }
    Ok(query
        .push("\nLIMIT ")
        .push_bind(Value::from(plan.skip))
        .push(", ")
        .push_bind(Value::from(plan.limit))
        .push(&format!("\nRETURN {}", ROOT_SCOPE)))
}

/// Query returning the number of matching documents.
pub fn count_query(plan: &QueryPlan<Aql>) -> DamResult<Aql> {
    Ok(source(plan)?.push("COLLECT WITH COUNT INTO total\nRETURN total"))
}

/// Query returning each distinct non-blank value of the options field.
pub fn options_query(plan: &QueryPlan<Aql>, options: &OptionsPlan) -> DamResult<Aql> {
    let query = source(plan)?;
    let query = match &options.target {
        FieldTarget::Root(path) => {
            query.push(&format!("FOR option IN {}\n", as_list(&attribute(ROOT_SCOPE, path))))
        }
        FieldTarget::ObjectList {
            list,
            discriminator,
            name,
            leaf,
        } => query
            .append(records("option_item", list, discriminator, name))
            .push(&format!(
                "\nFOR option IN {}\n",
                as_list(&attribute("option_item", leaf))
            )),
    };
    Ok(query.push("FILTER option != null AND option != \"\"\nCOLLECT value = option\nRETURN value"))
}

/// Query fetching the documents option values refer to.
pub fn label_query(collection: &str, id_key: &str, values: &[Value]) -> Aql {
    Aql::text("FOR label_doc IN ")
        .push_collection(collection)
        .push(&format!(
            " FILTER {} IN ",
            attribute("label_doc", &FieldPath::field(id_key))
        ))
        .push_bind(Value::Array(values.to_vec()))
        .push(" RETURN label_doc")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::SortOrder;
    use crate::query::OutputPlan;
    use serde_json::json;

    fn title() -> FieldTarget {
        FieldTarget::ObjectList {
            list: "metadata".into(),
            discriminator: "key".into(),
            name: "title".into(),
            leaf: FieldPath::field("value"),
        }
    }

    fn plan(predicate: Option<Aql>, sort: FieldTarget) -> QueryPlan<Aql> {
        QueryPlan {
            collection: "entities".into(),
            lookups: vec![],
            predicate,
            output: OutputPlan::Documents,
            sort: SortPlan {
                target: sort,
                order: SortOrder::Descending,
            },
            skip: 5,
            limit: 10,
        }
    }

    #[test]
    fn documents_query_sorts_and_pages() {
        let query = documents_query(
            &plan(Some(Aql::text("doc.`type` == ").push_bind(json!("asset"))), FieldTarget::Root(FieldPath::field("date_created"))),
            "_key",
        )
        .unwrap();
        let (text, vars) = query.render();
        assert_eq!(
            text,
            "FOR doc IN @@collection0\n\
             FILTER doc.`type` == @value0\n\
             SORT doc.`date_created` DESC, doc.`_key` ASC\n\
             LIMIT @value1, @value2\n\
             RETURN doc"
        );
        assert_eq!(
            Value::Object(vars),
            json!({"@collection0": "entities", "value0": "asset", "value1": 5, "value2": 10})
        );
    }

    #[test]
    fn object_list_sort_reads_first_record() {
        let (text, vars) = documents_query(&plan(None, title()), "_key").unwrap().render();
        assert!(
            text.contains("SORT FIRST(FOR sort_item IN (IS_ARRAY(doc.`metadata`) ? doc.`metadata` : []) FILTER sort_item.`key` == @value0 RETURN sort_item.`value`) DESC"),
            "{}",
            text
        );
        assert_eq!(vars["value0"], json!("title"));
    }

    #[test]
    fn lookups_merge_joined_documents() {
        let mut joined = plan(None, title());
        joined.lookups.push(Lookup::new("mediafiles", "_id", "entity_id", "files"));
        let (text, vars) = count_query(&joined).unwrap().render();
        assert_eq!(
            text,
            "FOR doc_raw IN @@collection0\n\
             LET doc = MERGE(doc_raw, {`files`: (FOR other IN @@collection1 FILTER other.`entity_id` IN FLATTEN((IS_ARRAY(doc_raw.`_id`) ? doc_raw.`_id` : [doc_raw.`_id`])) RETURN other)})\n\
             COLLECT WITH COUNT INTO total\n\
             RETURN total"
        );
        assert_eq!(vars["@collection1"], json!("mediafiles"));
    }

    #[test]
    fn options_query_collects_distinct_values() {
        let options = OptionsPlan {
            target: title(),
            resolve_labels: false,
            label_collection: "entities".into(),
            label_target: title(),
        };
        let (text, _) = options_query(&plan(None, title()), &options).unwrap().render();
        assert_eq!(
            text,
            "FOR doc IN @@collection0\n\
             FOR option_item IN (IS_ARRAY(doc.`metadata`) ? doc.`metadata` : []) FILTER option_item.`key` == @value0\n\
             FOR option IN (IS_ARRAY(option_item.`value`) ? option_item.`value` : [option_item.`value`])\n\
             FILTER option != null AND option != \"\"\n\
             COLLECT value = option\n\
             RETURN value"
        );
    }

    #[test]
    fn label_query_binds_values() {
        let (text, vars) = label_query("entities", "_id", &[json!("entities/1")]).render();
        assert_eq!(
            text,
            "FOR label_doc IN @@collection0 FILTER label_doc.`_id` IN @value0 RETURN label_doc"
        );
        assert_eq!(vars["value0"], json!(["entities/1"]));
    }
}
