use serde_json::{json, Map, Value};

use crate::common::{FieldPath, FieldTarget};
use crate::errors::DamResult;
use crate::matcher::{Comparison, Matchers, OperandKind, JOIN_SCOPE};

/// Builds document-store filter documents (the body of a `$match` stage).
#[derive(Debug, Clone, Copy, Default)]
pub struct MongoMatchers;

pub(crate) fn operator(comparison: Comparison) -> &'static str {
    match comparison {
        Comparison::Greater => "$gt",
        Comparison::GreaterEqual => "$gte",
        Comparison::Lesser => "$lt",
        Comparison::LesserEqual => "$lte",
    }
}

fn single(key: String, value: Value) -> Value {
    let mut map = Map::new();
    map.insert(key, value);
    Value::Object(map)
}

/// Applies `condition` to the value `target` addresses.
///
/// Object-list targets become an `$elemMatch` on the list, so the
/// discriminator and the condition hold for the same record.
fn condition(target: &FieldTarget, condition: Value) -> Value {
    match target {
        FieldTarget::Root(path) => single(path.dotted(), condition),
        FieldTarget::ObjectList {
            list,
            discriminator,
            name,
            leaf,
        } => {
            let mut element = Map::new();
            element.insert(discriminator.clone(), Value::String(name.clone()));
            element.insert(leaf.dotted(), condition);
            single(list.clone(), json!({ "$elemMatch": element }))
        }
    }
}

/// Converts `value` to a date, or to null when it does not parse.
fn to_date(value: Value) -> Value {
    json!({ "$convert": { "input": value, "to": "date", "onError": null, "onNull": null } })
}

/// Expression holding when `field` parses as a date satisfying every bound.
fn date_bounds(field: String, bounds: &[(Comparison, &Value)]) -> Value {
    let parsed = to_date(Value::String(field));
    let mut clauses = vec![json!({ "$ne": [parsed, null] })];
    for (comparison, operand) in bounds {
        clauses.push(single(
            operator(*comparison).to_string(),
            json!([parsed, to_date((*operand).clone())]),
        ));
    }
    json!({ "$and": clauses })
}

/// Compares the value `target` addresses as a point in time.
///
/// Stored strings may carry offsets or fractions of seconds, so both sides
/// are converted to dates in an `$expr`. `$elemMatch` rejects `$expr`, so
/// inside joined documents the normalized operands compare as strings.
fn date_condition(target: &FieldTarget, bounds: &[(Comparison, &Value)], scope: &str) -> Value {
    if scope == JOIN_SCOPE {
        let mut range = Map::new();
        for (comparison, operand) in bounds {
            range.insert(operator(*comparison).to_string(), (*operand).clone());
        }
        return condition(target, Value::Object(range));
    }

    let expression = match target {
        FieldTarget::Root(path) => date_bounds(format!("${}", path.dotted()), bounds),
        FieldTarget::ObjectList {
            list,
            discriminator,
            name,
            leaf,
        } => json!({
            "$anyElementTrue": [{
                "$map": {
                    "input": {
                        "$filter": {
                            "input": { "$ifNull": [format!("${}", list), []] },
                            "as": "item",
                            "cond": { "$eq": [format!("$$item.{}", discriminator), name] },
                        }
                    },
                    "as": "item",
                    "in": date_bounds(format!("$$item.{}", leaf.dotted()), bounds),
                }
            }]
        }),
    };
    json!({ "$expr": expression })
}

fn present() -> Value {
    json!({ "$nin": [null, ""] })
}

/// Merges nested `$and`/`$or` clauses of the same operator into one list.
fn flatten(operator: &str, fragments: Vec<Value>) -> Vec<Value> {
    fragments
        .into_iter()
        .flat_map(|fragment| match fragment {
            Value::Object(map) if map.len() == 1 && map.contains_key(operator) => {
                match map.into_iter().next() {
                    Some((_, Value::Array(items))) => items,
                    Some((key, value)) => vec![single(key, value)],
                    None => vec![],
                }
            }
            other => vec![other],
        })
        .collect()
}

impl Matchers for MongoMatchers {
    type Fragment = Value;

    fn exact(&self, target: &FieldTarget, values: &[Value], _scope: &str) -> DamResult<Value> {
        let cond = match values {
            [value] => value.clone(),
            many => json!({ "$in": many }),
        };
        Ok(condition(target, cond))
    }

    fn contains(&self, target: &FieldTarget, needle: &str, _scope: &str) -> DamResult<Value> {
        Ok(condition(
            target,
            json!({ "$regex": regex::escape(needle), "$options": "i" }),
        ))
    }

    fn compare(
        &self,
        target: &FieldTarget,
        comparison: Comparison,
        operand: &Value,
        kind: OperandKind,
        scope: &str,
    ) -> DamResult<Value> {
        if kind == OperandKind::Datetime {
            return Ok(date_condition(target, &[(comparison, operand)], scope));
        }
        Ok(condition(target, single(operator(comparison).to_string(), operand.clone())))
    }

    fn in_between(
        &self,
        target: &FieldTarget,
        min: &Value,
        max: &Value,
        kind: OperandKind,
        scope: &str,
    ) -> DamResult<Value> {
        if kind == OperandKind::Datetime {
            let bounds = [(Comparison::GreaterEqual, min), (Comparison::LesserEqual, max)];
            return Ok(date_condition(target, &bounds, scope));
        }
        Ok(condition(target, json!({ "$gte": min, "$lte": max })))
    }

    fn any(&self, target: &FieldTarget, _scope: &str) -> DamResult<Value> {
        Ok(condition(target, present()))
    }

    fn none(&self, target: &FieldTarget, scope: &str) -> DamResult<Value> {
        match target {
            FieldTarget::Root(path) => Ok(single(path.dotted(), json!({ "$in": [null, ""] }))),
            FieldTarget::ObjectList { list, .. } => {
                let any = self.any(target, scope)?;
                let element = any.get(list).cloned().unwrap_or(Value::Null);
                Ok(single(list.clone(), json!({ "$not": element })))
            }
        }
    }

    fn and(&self, fragments: Vec<Value>) -> Value {
        let mut clauses = flatten("$and", fragments);
        clauses.retain(|clause| !matches!(clause, Value::Object(map) if map.is_empty()));
        match clauses.len() {
            0 => json!({}),
            1 => clauses.remove(0),
            _ => json!({ "$and": clauses }),
        }
    }

    fn or(&self, fragments: Vec<Value>) -> Value {
        let mut clauses = flatten("$or", fragments);
        match clauses.len() {
            0 => json!({ "$nor": [{}] }),
            1 => clauses.remove(0),
            _ => json!({ "$or": clauses }),
        }
    }

    fn within(
        &self,
        alias: &FieldPath,
        _scope: &str,
        _inner_scope: &str,
        inner: Value,
    ) -> DamResult<Value> {
        Ok(single(alias.dotted(), json!({ "$elemMatch": inner })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata(name: &str) -> FieldTarget {
        FieldTarget::ObjectList {
            list: "metadata".into(),
            discriminator: "key".into(),
            name: name.into(),
            leaf: FieldPath::field("value"),
        }
    }

    fn root(path: &str) -> FieldTarget {
        FieldTarget::Root(FieldPath::parse(path).unwrap())
    }

    #[test]
    fn exact_on_object_list_uses_elem_match() {
        let fragment = MongoMatchers.exact(&metadata("rights"), &[json!("CC-BY")], "doc").unwrap();
        assert_eq!(
            fragment,
            json!({"metadata": {"$elemMatch": {"key": "rights", "value": "CC-BY"}}})
        );
        let many = MongoMatchers.exact(&root("type"), &[json!("a"), json!("b")], "doc").unwrap();
        assert_eq!(many, json!({"type": {"$in": ["a", "b"]}}));
    }

    #[test]
    fn contains_is_escaped_case_insensitive_regex() {
        let fragment = MongoMatchers.contains(&root("title"), "a.b", "doc").unwrap();
        assert_eq!(fragment, json!({"title": {"$regex": "a\\.b", "$options": "i"}}));
    }

    #[test]
    fn ranges_use_comparison_operators() {
        let fragment = MongoMatchers
            .compare(&root("height"), Comparison::GreaterEqual, &json!(3), OperandKind::Numeric, "doc")
            .unwrap();
        assert_eq!(fragment, json!({"height": {"$gte": 3}}));
        let between = MongoMatchers
            .in_between(&metadata("year"), &json!(1900), &json!(2000), OperandKind::Numeric, "doc")
            .unwrap();
        assert_eq!(
            between,
            json!({"metadata": {"$elemMatch": {"key": "year", "value": {"$gte": 1900, "$lte": 2000}}}})
        );
    }

    #[test]
    fn datetimes_compare_as_dates() {
        let fragment = MongoMatchers
            .compare(
                &root("date_created"),
                Comparison::LesserEqual,
                &json!("2021-06-01T11:00:00"),
                OperandKind::Datetime,
                "doc",
            )
            .unwrap();
        let parsed = json!({"$convert": {"input": "$date_created", "to": "date", "onError": null, "onNull": null}});
        let operand = json!({"$convert": {"input": "2021-06-01T11:00:00", "to": "date", "onError": null, "onNull": null}});
        assert_eq!(
            fragment,
            json!({"$expr": {"$and": [{"$ne": [parsed, null]}, {"$lte": [parsed, operand]}]}})
        );

        let listed = MongoMatchers
            .in_between(
                &metadata("date"),
                &json!("2021-01-01T00:00:00"),
                &json!("2021-12-31T23:59:00"),
                OperandKind::Datetime,
                "doc",
            )
            .unwrap();
        let expression = &listed["$expr"]["$anyElementTrue"][0]["$map"];
        assert_eq!(expression["input"]["$filter"]["cond"], json!({"$eq": ["$$item.key", "date"]}));
        assert_eq!(expression["in"]["$and"].as_array().map(Vec::len), Some(3));
    }

    #[test]
    fn joined_datetimes_stay_inside_elem_match() {
        let fragment = MongoMatchers
            .compare(
                &root("uploaded"),
                Comparison::Greater,
                &json!("2021-06-01T11:00:00"),
                OperandKind::Datetime,
                JOIN_SCOPE,
            )
            .unwrap();
        assert_eq!(fragment, json!({"uploaded": {"$gt": "2021-06-01T11:00:00"}}));
    }

    #[test]
    fn none_negates_any() {
        assert_eq!(
            MongoMatchers.any(&root("title"), "doc").unwrap(),
            json!({"title": {"$nin": [null, ""]}})
        );
        assert_eq!(
            MongoMatchers.none(&root("title"), "doc").unwrap(),
            json!({"title": {"$in": [null, ""]}})
        );
        assert_eq!(
            MongoMatchers.none(&metadata("title"), "doc").unwrap(),
            json!({"metadata": {"$not": {"$elemMatch": {"key": "title", "value": {"$nin": [null, ""]}}}}})
        );
    }

    #[test]
    fn combinators_flatten_and_handle_empty_lists() {
        let a = json!({"a": 1});
        let b = json!({"b": 2});
        let c = json!({"c": 3});
        let nested = MongoMatchers.and(vec![a.clone(), MongoMatchers.and(vec![b.clone(), c.clone()])]);
        assert_eq!(nested, json!({"$and": [a, b, c]}));
        assert_eq!(MongoMatchers.and(vec![]), json!({}));
        assert_eq!(MongoMatchers.and(vec![json!({}), json!({"a": 1})]), json!({"a": 1}));
        assert_eq!(MongoMatchers.or(vec![]), json!({"$nor": [{}]}));
        assert_eq!(MongoMatchers.or(vec![json!({"a": 1})]), json!({"a": 1}));
    }

    #[test]
    fn within_matches_joined_documents() {
        let inner = MongoMatchers.exact(&root("mimetype"), &[json!("image/jpeg")], "joined").unwrap();
        let fragment = MongoMatchers
            .within(&FieldPath::field("files"), "doc", "joined", inner)
            .unwrap();
        assert_eq!(fragment, json!({"files": {"$elemMatch": {"mimetype": "image/jpeg"}}}));
    }
}
