use std::cmp::Ordering;
use std::fmt::{Display, Formatter};

use regex::Regex;
use serde_json::Value;

use crate::common::{
    compare_values, is_blank, loose_eq, parse_stored_datetime, type_rank, FieldTarget,
};
use crate::errors::DamResult;
use crate::matcher::{Comparison, OperandKind};

use super::PredicateProvider;

/// A value and, for arrays, each of its elements.
fn expand(value: &Value) -> Vec<&Value> {
    match value {
        Value::Array(items) => {
            let mut candidates = Vec::with_capacity(items.len() + 1);
            candidates.push(value);
            candidates.extend(items.iter());
            candidates
        }
        other => vec![other],
    }
}

/// True when some candidate value read through `target` satisfies `test`.
///
/// For object lists every record is tested on its own, so conditions on
/// one record never combine values of another.
fn any_candidate(target: &FieldTarget, document: &Value, test: impl Fn(&Value) -> bool) -> bool {
    match target {
        FieldTarget::Root(_) => target
            .values(document)
            .into_iter()
            .flat_map(expand)
            .any(&test),
        FieldTarget::ObjectList { .. } => target.records(document).into_iter().any(|record| {
            target
                .leaf_values(record)
                .into_iter()
                .flat_map(expand)
                .any(&test)
        }),
    }
}

/// Present, not null and not the empty string.
fn present(values: &[&Value]) -> bool {
    !values.is_empty()
        && values.iter().all(|value| match value {
            Value::Array(items) => !items.iter().any(is_blank),
            other => !is_blank(other),
        })
}

pub(crate) struct EqualsPredicate {
    target: FieldTarget,
    values: Vec<Value>,
}

impl EqualsPredicate {
    pub(crate) fn new(target: FieldTarget, values: Vec<Value>) -> Self {
        EqualsPredicate { target, values }
    }
}

impl Display for EqualsPredicate {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} in {}", self.target.flat_key(), Value::Array(self.values.clone()))
    }
}

impl PredicateProvider for EqualsPredicate {
    fn apply(&self, document: &Value) -> DamResult<bool> {
        Ok(any_candidate(&self.target, document, |candidate| {
            self.values.iter().any(|value| loose_eq(candidate, value))
        }))
    }
}

pub(crate) struct RegexPredicate {
    target: FieldTarget,
    pattern: Regex,
}

impl RegexPredicate {
    pub(crate) fn new(target: FieldTarget, pattern: Regex) -> Self {
        RegexPredicate { target, pattern }
    }
}

impl Display for RegexPredicate {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} regex {}", self.target.flat_key(), self.pattern)
    }
}

impl PredicateProvider for RegexPredicate {
    fn apply(&self, document: &Value) -> DamResult<bool> {
        Ok(any_candidate(&self.target, document, |candidate| {
            candidate.as_str().is_some_and(|text| self.pattern.is_match(text))
        }))
    }
}

/// Orders `candidate` against `operand`, `None` when they are not
/// comparable.
fn ordering(candidate: &Value, operand: &Value, kind: OperandKind) -> Option<Ordering> {
    match kind {
        OperandKind::Datetime => {
            let candidate = parse_stored_datetime(candidate)?;
            let operand = parse_stored_datetime(operand)?;
            Some(candidate.cmp(&operand))
        }
        OperandKind::Numeric if !candidate.is_number() => None,
        _ if type_rank(candidate) != type_rank(operand) => None,
        _ if candidate.is_array() || candidate.is_object() => None,
        _ => Some(compare_values(candidate, operand)),
    }
}

pub(crate) struct ComparePredicate {
    target: FieldTarget,
    comparison: Comparison,
    operand: Value,
    kind: OperandKind,
}

impl ComparePredicate {
    pub(crate) fn new(
        target: FieldTarget,
        comparison: Comparison,
        operand: Value,
        kind: OperandKind,
    ) -> Self {
        ComparePredicate {
            target,
            comparison,
            operand,
            kind,
        }
    }
}

impl Display for ComparePredicate {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} {}", self.target.flat_key(), self.comparison.symbol(), self.operand)
    }
}

impl PredicateProvider for ComparePredicate {
    fn apply(&self, document: &Value) -> DamResult<bool> {
        Ok(any_candidate(&self.target, document, |candidate| {
            ordering(candidate, &self.operand, self.kind)
                .is_some_and(|o| self.comparison.accepts(o))
        }))
    }
}

/// Inclusive range; both bounds must hold for the same value.
pub(crate) struct BetweenPredicate {
    target: FieldTarget,
    min: Value,
    max: Value,
    kind: OperandKind,
}

impl BetweenPredicate {
    pub(crate) fn new(target: FieldTarget, min: Value, max: Value, kind: OperandKind) -> Self {
        BetweenPredicate { target, min, max, kind }
    }
}

impl Display for BetweenPredicate {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} in [{}, {}]", self.target.flat_key(), self.min, self.max)
    }
}

impl PredicateProvider for BetweenPredicate {
    fn apply(&self, document: &Value) -> DamResult<bool> {
        Ok(any_candidate(&self.target, document, |candidate| {
            let lower = ordering(candidate, &self.min, self.kind);
            let upper = ordering(candidate, &self.max, self.kind);
            lower.is_some_and(|o| Comparison::GreaterEqual.accepts(o))
                && upper.is_some_and(|o| Comparison::LesserEqual.accepts(o))
        }))
    }
}

/// Field present with a non-blank value.
pub(crate) struct PresentPredicate {
    target: FieldTarget,
}

impl PresentPredicate {
    pub(crate) fn new(target: FieldTarget) -> Self {
        PresentPredicate { target }
    }
}

impl Display for PresentPredicate {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} present", self.target.flat_key())
    }
}

impl PredicateProvider for PresentPredicate {
    fn apply(&self, document: &Value) -> DamResult<bool> {
        Ok(match &self.target {
            FieldTarget::Root(_) => present(&self.target.values(document)),
            FieldTarget::ObjectList { .. } => self
                .target
                .records(document)
                .into_iter()
                .any(|record| present(&self.target.leaf_values(record))),
        })
    }
}
