use serde_json::{Number, Value};

use crate::common::{normalize_datetime, FieldTarget, ANY_VALUE};
use crate::criteria::{FilterValue, RangeValue};
use crate::errors::{DamError, DamResult, ErrorKind};

use super::{Comparison, Matchers, OperandKind};

/// One criterion as seen by the matcher rules.
#[derive(Debug, Clone, Copy)]
pub struct MatchInput<'a> {
    pub target: &'a FieldTarget,
    pub value: &'a FilterValue,
    pub match_exact: bool,
    pub kind: OperandKind,
    pub scope: &'a str,
}

type Applies = fn(&MatchInput) -> bool;

/// An `(applies, build)` pair. The rule produces a fragment only for
/// values of the shape it recognizes.
pub struct MatcherRule<M: Matchers> {
    name: &'static str,
    applies: Applies,
    build: fn(&M, &MatchInput) -> DamResult<M::Fragment>,
}

impl<M: Matchers> Clone for MatcherRule<M> {
    fn clone(&self) -> Self {
        MatcherRule {
            name: self.name,
            applies: self.applies,
            build: self.build,
        }
    }
}

impl<M: Matchers> std::fmt::Debug for MatcherRule<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "MatcherRule({})", self.name)
    }
}

impl<M: Matchers> MatcherRule<M> {
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn applies(&self, input: &MatchInput) -> bool {
        (self.applies)(input)
    }

    /// Builds the fragment when the rule applies, `None` otherwise.
    pub fn try_match(&self, matchers: &M, input: &MatchInput) -> DamResult<Option<M::Fragment>> {
        if (self.applies)(input) {
            (self.build)(matchers, input).map(Some)
        } else {
            Ok(None)
        }
    }

    pub fn any() -> Self {
        MatcherRule {
            name: "any",
            applies: is_any,
            build: build_any::<M>,
        }
    }

    pub fn none() -> Self {
        MatcherRule {
            name: "none",
            applies: is_none,
            build: build_none::<M>,
        }
    }

    pub fn exact() -> Self {
        MatcherRule {
            name: "exact",
            applies: is_exact,
            build: build_exact::<M>,
        }
    }

    pub fn contains() -> Self {
        MatcherRule {
            name: "contains",
            applies: is_contains,
            build: build_contains::<M>,
        }
    }

    /// `false` also matches absent and null values.
    pub fn falsy() -> Self {
        MatcherRule {
            name: "falsy",
            applies: is_falsy,
            build: build_falsy::<M>,
        }
    }

    pub fn min() -> Self {
        MatcherRule {
            name: "min",
            applies: is_min,
            build: build_min::<M>,
        }
    }

    pub fn max() -> Self {
        MatcherRule {
            name: "max",
            applies: is_max,
            build: build_max::<M>,
        }
    }

    pub fn min_included() -> Self {
        MatcherRule {
            name: "min_included",
            applies: is_min_included,
            build: build_min_included::<M>,
        }
    }

    pub fn max_included() -> Self {
        MatcherRule {
            name: "max_included",
            applies: is_max_included,
            build: build_max_included::<M>,
        }
    }

    pub fn in_between() -> Self {
        MatcherRule {
            name: "in_between",
            applies: is_in_between,
            build: build_in_between::<M>,
        }
    }
}

fn non_wildcard_text(value: &Value) -> Option<&str> {
    value.as_str().filter(|text| !text.is_empty() && *text != ANY_VALUE)
}

fn range<'a>(input: &MatchInput<'a>) -> Option<&'a RangeValue> {
    input.value.as_range()
}

pub fn is_any(input: &MatchInput) -> bool {
    input.value.as_scalar().and_then(Value::as_str) == Some(ANY_VALUE)
}

pub fn is_none(input: &MatchInput) -> bool {
    match input.value.as_scalar() {
        Some(Value::Null) => true,
        Some(Value::String(text)) => text.is_empty() && input.match_exact,
        _ => false,
    }
}

pub fn is_exact(input: &MatchInput) -> bool {
    match input.value {
        FilterValue::List(items) => !items.is_empty(),
        FilterValue::Scalar(Value::Null) => false,
        FilterValue::Scalar(value @ Value::String(_)) => {
            input.match_exact && non_wildcard_text(value).is_some()
        }
        FilterValue::Scalar(_) => true,
        _ => false,
    }
}

pub fn is_contains(input: &MatchInput) -> bool {
    !input.match_exact
        && input
            .value
            .as_scalar()
            .and_then(non_wildcard_text)
            .is_some()
}

pub fn is_falsy(input: &MatchInput) -> bool {
    input.value.as_scalar() == Some(&Value::Bool(false))
}

pub fn is_min(input: &MatchInput) -> bool {
    range(input).is_some_and(|r| r.has_min() && !r.has_max() && !r.is_included())
}

pub fn is_max(input: &MatchInput) -> bool {
    range(input).is_some_and(|r| !r.has_min() && r.has_max() && !r.is_included())
}

pub fn is_min_included(input: &MatchInput) -> bool {
    range(input).is_some_and(|r| r.has_min() && !r.has_max() && r.is_included())
}

pub fn is_max_included(input: &MatchInput) -> bool {
    range(input).is_some_and(|r| !r.has_min() && r.has_max() && r.is_included())
}

pub fn is_in_between(input: &MatchInput) -> bool {
    range(input).is_some_and(|r| r.has_min() && r.has_max())
}

/// Validates and converts an operand for its kind.
///
/// # Errors
///
/// Returns [ErrorKind::ValidationError] for malformed datetimes and
/// non-numeric operands of numeric filters.
pub fn prepare_operand(value: &Value, kind: OperandKind) -> DamResult<Value> {
    match kind {
        OperandKind::Plain => Ok(value.clone()),
        OperandKind::Datetime => normalize_datetime(value),
        OperandKind::Numeric => match value {
            Value::Number(_) => Ok(value.clone()),
            Value::String(text) => {
                let trimmed = text.trim();
                trimmed
                    .parse::<i64>()
                    .map(Value::from)
                    .ok()
                    .or_else(|| {
                        trimmed
                            .parse::<f64>()
                            .ok()
                            .and_then(Number::from_f64)
                            .map(Value::Number)
                    })
                    .ok_or_else(|| not_a_number(value))
            }
            other => Err(not_a_number(other)),
        },
    }
}

fn not_a_number(value: &Value) -> DamError {
    log::error!("Value {} is not a number", value);
    DamError::new(&format!("Value {} is not a number", value), ErrorKind::ValidationError)
}

fn bound(value: Option<&Value>, kind: OperandKind) -> DamResult<Value> {
    match value {
        Some(value) => prepare_operand(value, kind),
        None => Err(DamError::new("Range bound is missing", ErrorKind::InternalError)),
    }
}

fn build_any<M: Matchers>(m: &M, input: &MatchInput) -> DamResult<M::Fragment> {
    m.any(input.target, input.scope)
}

fn build_none<M: Matchers>(m: &M, input: &MatchInput) -> DamResult<M::Fragment> {
    m.none(input.target, input.scope)
}

fn build_exact<M: Matchers>(m: &M, input: &MatchInput) -> DamResult<M::Fragment> {
    let values = match input.value {
        FilterValue::List(items) => items
            .iter()
            .map(|item| prepare_operand(item, input.kind))
            .collect::<DamResult<Vec<_>>>()?,
        FilterValue::Scalar(value) => vec![prepare_operand(value, input.kind)?],
        _ => vec![],
    };
    m.exact(input.target, &values, input.scope)
}

fn build_contains<M: Matchers>(m: &M, input: &MatchInput) -> DamResult<M::Fragment> {
    let needle = input
        .value
        .as_scalar()
        .and_then(Value::as_str)
        .unwrap_or_default();
    m.contains(input.target, needle, input.scope)
}

fn build_falsy<M: Matchers>(m: &M, input: &MatchInput) -> DamResult<M::Fragment> {
    let is_false = m.exact(input.target, &[Value::Bool(false)], input.scope)?;
    let absent = m.none(input.target, input.scope)?;
    Ok(m.or(vec![is_false, absent]))
}

fn build_compare<M: Matchers>(
    m: &M,
    input: &MatchInput,
    comparison: Comparison,
    use_min: bool,
) -> DamResult<M::Fragment> {
    let range = input.value.as_range();
    let operand = if use_min {
        bound(range.and_then(|r| r.min.as_ref()), input.kind)?
    } else {
        bound(range.and_then(|r| r.max.as_ref()), input.kind)?
    };
    m.compare(input.target, comparison, &operand, input.kind, input.scope)
}

fn build_min<M: Matchers>(m: &M, input: &MatchInput) -> DamResult<M::Fragment> {
    build_compare(m, input, Comparison::Greater, true)
}

fn build_max<M: Matchers>(m: &M, input: &MatchInput) -> DamResult<M::Fragment> {
    build_compare(m, input, Comparison::Lesser, false)
}

fn build_min_included<M: Matchers>(m: &M, input: &MatchInput) -> DamResult<M::Fragment> {
    build_compare(m, input, Comparison::GreaterEqual, true)
}

fn build_max_included<M: Matchers>(m: &M, input: &MatchInput) -> DamResult<M::Fragment> {
    build_compare(m, input, Comparison::LesserEqual, false)
}

fn build_in_between<M: Matchers>(m: &M, input: &MatchInput) -> DamResult<M::Fragment> {
    let range = input.value.as_range();
    let min = bound(range.and_then(|r| r.min.as_ref()), input.kind)?;
    let max = bound(range.and_then(|r| r.max.as_ref()), input.kind)?;
    m.in_between(input.target, &min, &max, input.kind, input.scope)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::FieldPath;
    use serde_json::json;

    struct TextMatchers;

    impl Matchers for TextMatchers {
        type Fragment = String;

        fn exact(&self, target: &FieldTarget, values: &[Value], _: &str) -> DamResult<String> {
            Ok(format!("{} in {}", target.flat_key(), Value::Array(values.to_vec())))
        }

        fn contains(&self, target: &FieldTarget, needle: &str, _: &str) -> DamResult<String> {
            Ok(format!("{} ~ {}", target.flat_key(), needle))
        }

        fn compare(
            &self,
            target: &FieldTarget,
            comparison: Comparison,
            operand: &Value,
            _: OperandKind,
            _: &str,
        ) -> DamResult<String> {
            Ok(format!("{} {} {}", target.flat_key(), comparison.symbol(), operand))
        }

        fn in_between(&self, target: &FieldTarget, min: &Value, max: &Value, _: OperandKind, _: &str) -> DamResult<String> {
            Ok(format!("{} in [{}, {}]", target.flat_key(), min, max))
        }

        fn any(&self, target: &FieldTarget, _: &str) -> DamResult<String> {
            Ok(format!("any {}", target.flat_key()))
        }

        fn none(&self, target: &FieldTarget, _: &str) -> DamResult<String> {
            Ok(format!("none {}", target.flat_key()))
        }

        fn and(&self, fragments: Vec<String>) -> String {
            fragments.join(" and ")
        }

        fn or(&self, fragments: Vec<String>) -> String {
            fragments.join(" or ")
        }

        fn within(&self, alias: &FieldPath, _: &str, _: &str, inner: String) -> DamResult<String> {
            Ok(format!("{} has ({})", alias, inner))
        }
    }

    fn all_rules() -> Vec<MatcherRule<TextMatchers>> {
        vec![
            MatcherRule::any(),
            MatcherRule::none(),
            MatcherRule::exact(),
            MatcherRule::contains(),
            MatcherRule::min(),
            MatcherRule::max(),
            MatcherRule::min_included(),
            MatcherRule::max_included(),
            MatcherRule::in_between(),
        ]
    }

    fn applicable(value: Value, match_exact: bool) -> Vec<&'static str> {
        let target = FieldTarget::Root(FieldPath::field("f"));
        let value = FilterValue::from(value);
        let input = MatchInput {
            target: &target,
            value: &value,
            match_exact,
            kind: OperandKind::Plain,
            scope: "doc",
        };
        all_rules()
            .into_iter()
            .filter(|rule| rule.applies(&input))
            .map(|rule| rule.name())
            .collect()
    }

    #[test]
    fn value_shapes_select_one_matcher() {
        assert_eq!(applicable(json!("*"), false), vec!["any"]);
        assert_eq!(applicable(json!("*"), true), vec!["any"]);
        assert_eq!(applicable(Value::Null, false), vec!["none"]);
        assert_eq!(applicable(json!(""), true), vec!["none"]);
        assert_eq!(applicable(json!("paint"), true), vec!["exact"]);
        assert_eq!(applicable(json!("paint"), false), vec!["contains"]);
        assert_eq!(applicable(json!(12), false), vec!["exact"]);
        assert_eq!(applicable(json!(true), false), vec!["exact"]);
        assert_eq!(applicable(json!(["a", "b"]), false), vec!["exact"]);
    }

    #[test]
    fn unmatched_shapes_select_nothing() {
        assert!(applicable(json!(""), false).is_empty());
        assert!(applicable(json!([]), false).is_empty());
        assert!(applicable(json!({}), false).is_empty());
    }

    #[test]
    fn range_presence_combinations_are_exclusive() {
        let cases = [
            (json!({"min": 1}), "min"),
            (json!({"min": 1, "included": false}), "min"),
            (json!({"min": 1, "included": true}), "min_included"),
            (json!({"max": 1}), "max"),
            (json!({"max": 1, "included": false}), "max"),
            (json!({"max": 1, "included": true}), "max_included"),
            (json!({"min": 1, "max": 2}), "in_between"),
            (json!({"min": 1, "max": 2, "included": true}), "in_between"),
            (json!({"min": 1, "max": 2, "included": false}), "in_between"),
        ];
        for (value, expected) in cases {
            assert_eq!(applicable(value.clone(), false), vec![expected], "value {}", value);
        }
        assert!(applicable(json!({"included": true}), false).is_empty());
    }

    #[test]
    fn build_normalizes_operands() {
        let target = FieldTarget::Root(FieldPath::field("date_created"));
        let value = FilterValue::from(json!({"min": "2020-01-01T10:00", "included": true}));
        let input = MatchInput {
            target: &target,
            value: &value,
            match_exact: false,
            kind: OperandKind::Datetime,
            scope: "doc",
        };
        let fragment = MatcherRule::<TextMatchers>::min_included()
            .try_match(&TextMatchers, &input)
            .unwrap();
        assert_eq!(fragment.as_deref(), Some("date_created >= \"2020-01-01T10:00:00\""));
    }

    #[test]
    fn malformed_datetime_fails_build() {
        let target = FieldTarget::Root(FieldPath::field("date_created"));
        let value = FilterValue::from(json!({"max": "yesterday"}));
        let input = MatchInput {
            target: &target,
            value: &value,
            match_exact: false,
            kind: OperandKind::Datetime,
            scope: "doc",
        };
        let err = MatcherRule::<TextMatchers>::max().try_match(&TextMatchers, &input).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::ValidationError);
    }

    #[test]
    fn falsy_also_accepts_absent_values() {
        let target = FieldTarget::Root(FieldPath::field("published"));
        let value = FilterValue::from(json!(false));
        let input = MatchInput {
            target: &target,
            value: &value,
            match_exact: false,
            kind: OperandKind::Plain,
            scope: "doc",
        };
        let fragment = MatcherRule::<TextMatchers>::falsy()
            .try_match(&TextMatchers, &input)
            .unwrap();
        assert_eq!(fragment.as_deref(), Some("published in [false] or none published"));
    }

    #[test]
    fn numeric_operands_accept_numeric_strings() {
        assert_eq!(prepare_operand(&json!("12"), OperandKind::Numeric).unwrap(), json!(12));
        assert_eq!(prepare_operand(&json!("1.5"), OperandKind::Numeric).unwrap(), json!(1.5));
        let err = prepare_operand(&json!("tall"), OperandKind::Numeric).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::ValidationError);
    }
}
