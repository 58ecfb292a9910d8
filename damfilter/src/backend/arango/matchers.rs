use serde_json::Value;

use crate::common::{FieldPath, FieldTarget};
use crate::errors::DamResult;
use crate::matcher::{Comparison, Matchers, OperandKind};

use super::aql::{as_list, attribute, quote, Aql};

/// Builds AQL filter expressions.
#[derive(Debug, Clone, Copy, Default)]
pub struct ArangoMatchers;

/// `LENGTH(FOR var IN list FILTER condition LIMIT 1 RETURN 1) > 0`
fn exists(var: &str, list: &str, condition: Aql) -> Aql {
    Aql::text(&format!("LENGTH(FOR {} IN {} FILTER ", var, list))
        .append(condition)
        .push(" LIMIT 1 RETURN 1) > 0")
}

/// Records of an object list whose discriminator matches, as
/// `(item variable, FOR header)`.
fn records(scope: &str, target: &FieldTarget) -> Option<(String, Aql)> {
    match target {
        FieldTarget::Root(_) => None,
        FieldTarget::ObjectList {
            list,
            discriminator,
            name,
            ..
        } => {
            let item = format!("{}_item", scope);
            let list = attribute(scope, &FieldPath::field(list));
            let header = Aql::text(&format!(
                "(IS_ARRAY({0}) ? {0} : []) FILTER {1}.{2} == ",
                list,
                item,
                quote(discriminator)
            ))
            .push_bind(Value::String(name.clone()));
            Some((item, header))
        }
    }
}

/// Tests `condition` against each element of the value `target` reads.
///
/// `condition` receives the name of the element variable.
fn element_match(target: &FieldTarget, scope: &str, condition: impl Fn(&str) -> Aql) -> Aql {
    let value = format!("{}_value", scope);
    match target {
        FieldTarget::Root(path) => {
            exists(&value, &as_list(&attribute(scope, path)), condition(&value))
        }
        FieldTarget::ObjectList { leaf, .. } => {
            let Some((item, header)) = records(scope, target) else {
                return Aql::text("false");
            };
            let leaf = attribute(&item, leaf);
            Aql::text(&format!("LENGTH(FOR {} IN ", item))
                .append(header)
                .push(" AND ")
                .append(exists(&value, &as_list(&leaf), condition(&value)))
                .push(" LIMIT 1 RETURN 1) > 0")
        }
    }
}

/// Absent, null or empty string, also as an element of an array.
fn blank(expression: &str) -> Aql {
    Aql::text(&format!(
        "({0} == null || {0} == \"\" || (IS_ARRAY({0}) && (null IN {0} || \"\" IN {0})))",
        expression
    ))
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Guard making the comparison only hold between values of one kind.
fn comparable(var: &str, operand: &Value, kind: OperandKind) -> String {
    match kind {
        OperandKind::Datetime => format!("IS_STRING({0}) AND IS_DATESTRING({0})", var),
        OperandKind::Numeric => format!("IS_NUMBER({})", var),
        OperandKind::Plain => format!("TYPENAME({}) == \"{}\"", var, type_name(operand)),
    }
}

/// The compared form of `var`: a timestamp for datetimes, else itself.
fn compared(var: &str, kind: OperandKind) -> String {
    match kind {
        OperandKind::Datetime => format!("DATE_TIMESTAMP({})", var),
        _ => var.to_string(),
    }
}

fn comparison(var: &str, comparison: Comparison, operand: &Value, kind: OperandKind) -> Aql {
    let bound = match kind {
        OperandKind::Datetime => Aql::text("DATE_TIMESTAMP(").push_bind(operand.clone()).push(")"),
        _ => Aql::bind(operand.clone()),
    };
    Aql::text(&format!(" {} {} ", compared(var, kind), comparison.symbol())).append(bound)
}

impl Matchers for ArangoMatchers {
    type Fragment = Aql;

    fn exact(&self, target: &FieldTarget, values: &[Value], scope: &str) -> DamResult<Aql> {
        Ok(element_match(target, scope, |var| match values {
            [value] => Aql::text(&format!("{} == ", var)).push_bind(value.clone()),
            many => Aql::text(&format!("{} IN ", var)).push_bind(Value::Array(many.to_vec())),
        }))
    }

    fn contains(&self, target: &FieldTarget, needle: &str, scope: &str) -> DamResult<Aql> {
        Ok(element_match(target, scope, |var| {
            Aql::text(&format!("(IS_STRING({0}) AND CONTAINS(LOWER({0}), ", var))
                .push_bind(Value::String(needle.to_lowercase()))
                .push("))")
        }))
    }

    fn compare(
        &self,
        target: &FieldTarget,
        op: Comparison,
        operand: &Value,
        kind: OperandKind,
        scope: &str,
    ) -> DamResult<Aql> {
        Ok(element_match(target, scope, |var| {
            Aql::text(&format!("({} AND", comparable(var, operand, kind)))
                .append(comparison(var, op, operand, kind))
                .push(")")
        }))
    }

    fn in_between(
        &self,
        target: &FieldTarget,
        min: &Value,
        max: &Value,
        kind: OperandKind,
        scope: &str,
    ) -> DamResult<Aql> {
        Ok(element_match(target, scope, |var| {
            Aql::text(&format!("({} AND", comparable(var, min, kind)))
                .append(comparison(var, Comparison::GreaterEqual, min, kind))
                .push(" AND")
                .append(comparison(var, Comparison::LesserEqual, max, kind))
                .push(")")
        }))
    }

    fn any(&self, target: &FieldTarget, scope: &str) -> DamResult<Aql> {
        match target {
            FieldTarget::Root(path) => Ok(Aql::text("NOT ").append(blank(&attribute(scope, path)))),
            FieldTarget::ObjectList { leaf, .. } => match records(scope, target) {
                Some((item, header)) => Ok(Aql::text(&format!("LENGTH(FOR {} IN ", item))
                    .append(header)
                    .push(" AND NOT ")
                    .append(blank(&attribute(&item, leaf)))
                    .push(" LIMIT 1 RETURN 1) > 0")),
                None => Ok(Aql::text("false")),
            },
        }
    }

    fn none(&self, target: &FieldTarget, scope: &str) -> DamResult<Aql> {
        match target {
            FieldTarget::Root(path) => Ok(blank(&attribute(scope, path))),
            FieldTarget::ObjectList { .. } => {
                Ok(Aql::text("NOT (").append(self.any(target, scope)?).push(")"))
            }
        }
    }

    fn and(&self, mut fragments: Vec<Aql>) -> Aql {
        match fragments.len() {
            0 => Aql::text("true"),
            1 => fragments.remove(0),
            _ => Aql::text("(").append(Aql::join(fragments, " AND ")).push(")"),
        }
    }

    fn or(&self, mut fragments: Vec<Aql>) -> Aql {
        match fragments.len() {
            0 => Aql::text("false"),
            1 => fragments.remove(0),
            _ => Aql::text("(").append(Aql::join(fragments, " OR ")).push(")"),
        }
    }

    fn within(
        &self,
        alias: &FieldPath,
        scope: &str,
        inner_scope: &str,
        inner: Aql,
    ) -> DamResult<Aql> {
        let joined = attribute(scope, alias);
        Ok(exists(
            inner_scope,
            &format!("(IS_ARRAY({0}) ? {0} : [])", joined),
            inner,
        ))
    }
}
