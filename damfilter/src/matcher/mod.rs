//! Per-operator predicate builders.
//!
//! A [Matchers] implementation turns one operator applied to one resolved
//! field into a backend-native fragment. [MatcherRule]s decide from the
//! shape of a criterion's value which operator applies.

mod rules;

pub use rules::*;

use std::fmt::Debug;

use serde_json::Value;

use crate::common::{FieldPath, FieldTarget};
use crate::errors::DamResult;

/// Variable naming the filtered document.
pub const ROOT_SCOPE: &str = "doc";
/// Variable naming a joined document inside a lookup check.
pub const JOIN_SCOPE: &str = "joined";

/// Ordering operator of `min`/`max` style matchers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Comparison {
    Greater,
    GreaterEqual,
    Lesser,
    LesserEqual,
}

impl Comparison {
    pub fn symbol(&self) -> &'static str {
        match self {
            Comparison::Greater => ">",
            Comparison::GreaterEqual => ">=",
            Comparison::Lesser => "<",
            Comparison::LesserEqual => "<=",
        }
    }

    /// Whether `ordering` of stored value against operand satisfies the
    /// comparison.
    pub fn accepts(&self, ordering: std::cmp::Ordering) -> bool {
        use std::cmp::Ordering::*;
        match self {
            Comparison::Greater => ordering == Greater,
            Comparison::GreaterEqual => ordering != Less,
            Comparison::Lesser => ordering == Less,
            Comparison::LesserEqual => ordering != Greater,
        }
    }
}

/// How operands are interpreted before comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperandKind {
    Plain,
    /// Operands are `YYYY-MM-DDTHH:MM[:SS]` datetimes.
    Datetime,
    /// Operands are numbers; numeric strings are accepted.
    Numeric,
}

/// Builds backend fragments for each operator.
///
/// `scope` names the document variable the fragment reads from. Backends
/// that address fields relative to the current document may ignore it.
pub trait Matchers: Send + Sync {
    type Fragment: Clone + Debug + Send + Sync;

    /// Equality with one of `values`.
    fn exact(
        &self,
        target: &FieldTarget,
        values: &[Value],
        scope: &str,
    ) -> DamResult<Self::Fragment>;

    /// Case-insensitive substring match.
    fn contains(
        &self,
        target: &FieldTarget,
        needle: &str,
        scope: &str,
    ) -> DamResult<Self::Fragment>;

    fn compare(
        &self,
        target: &FieldTarget,
        comparison: Comparison,
        operand: &Value,
        kind: OperandKind,
        scope: &str,
    ) -> DamResult<Self::Fragment>;

    /// Inclusive range, both bounds checked against the same value.
    fn in_between(
        &self,
        target: &FieldTarget,
        min: &Value,
        max: &Value,
        kind: OperandKind,
        scope: &str,
    ) -> DamResult<Self::Fragment>;

    /// Field present, not null and not the empty string.
    fn any(&self, target: &FieldTarget, scope: &str) -> DamResult<Self::Fragment>;

    /// Complement of [Matchers::any].
    fn none(&self, target: &FieldTarget, scope: &str) -> DamResult<Self::Fragment>;

    /// Conjunction; an empty list matches everything.
    fn and(&self, fragments: Vec<Self::Fragment>) -> Self::Fragment;

    /// Disjunction; an empty list matches nothing.
    fn or(&self, fragments: Vec<Self::Fragment>) -> Self::Fragment;

    /// Matches when some document joined under `alias` satisfies `inner`,
    /// which reads from `inner_scope`.
    fn within(
        &self,
        alias: &FieldPath,
        scope: &str,
        inner_scope: &str,
        inner: Self::Fragment,
    ) -> DamResult<Self::Fragment>;
}
