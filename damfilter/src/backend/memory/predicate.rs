use std::fmt::{Debug, Display, Formatter};
use std::ops::Deref;
use std::sync::Arc;

use serde_json::Value;

use crate::common::FieldPath;
use crate::errors::DamResult;

/// An evaluable condition on a JSON document.
pub trait PredicateProvider: Send + Sync + Display {
    fn apply(&self, document: &Value) -> DamResult<bool>;
}

/// Cheaply cloneable handle to a [PredicateProvider].
#[derive(Clone)]
pub struct Predicate {
    inner: Arc<dyn PredicateProvider>,
}

impl Predicate {
    pub fn new<T: PredicateProvider + 'static>(inner: T) -> Self {
        Predicate { inner: Arc::new(inner) }
    }
}

impl Deref for Predicate {
    type Target = Arc<dyn PredicateProvider>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl Display for Predicate {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.inner)
    }
}

impl Debug for Predicate {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Predicate({})", self.inner)
    }
}

/// Matches every document.
pub(crate) struct AllPredicate;

impl Display for AllPredicate {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "ALL")
    }
}

impl PredicateProvider for AllPredicate {
    fn apply(&self, _document: &Value) -> DamResult<bool> {
        Ok(true)
    }
}

fn join(predicates: &[Predicate], separator: &str) -> String {
    predicates
        .iter()
        .map(|predicate| predicate.to_string())
        .collect::<Vec<_>>()
        .join(separator)
}

pub(crate) struct AndPredicate {
    predicates: Vec<Predicate>,
}

impl AndPredicate {
    pub(crate) fn new(predicates: Vec<Predicate>) -> Self {
        AndPredicate { predicates }
    }
}

impl Display for AndPredicate {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "({})", join(&self.predicates, " AND "))
    }
}

impl PredicateProvider for AndPredicate {
    fn apply(&self, document: &Value) -> DamResult<bool> {
        for predicate in &self.predicates {
            if !predicate.apply(document)? {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

/// An empty `OrPredicate` matches nothing.
pub(crate) struct OrPredicate {
    predicates: Vec<Predicate>,
}

impl OrPredicate {
    pub(crate) fn new(predicates: Vec<Predicate>) -> Self {
        OrPredicate { predicates }
    }
}

impl Display for OrPredicate {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "({})", join(&self.predicates, " OR "))
    }
}

impl PredicateProvider for OrPredicate {
    fn apply(&self, document: &Value) -> DamResult<bool> {
        for predicate in &self.predicates {
            if predicate.apply(document)? {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

pub(crate) struct NotPredicate {
    predicate: Predicate,
}

impl NotPredicate {
    pub(crate) fn new(predicate: Predicate) -> Self {
        NotPredicate { predicate }
    }
}

impl Display for NotPredicate {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "!({})", self.predicate)
    }
}

impl PredicateProvider for NotPredicate {
    fn apply(&self, document: &Value) -> DamResult<bool> {
        Ok(!self.predicate.apply(document)?)
    }
}

/// Matches when some document in the array at `field` matches `inner`.
pub(crate) struct ElementMatchPredicate {
    field: FieldPath,
    inner: Predicate,
}

impl ElementMatchPredicate {
    pub(crate) fn new(field: FieldPath, inner: Predicate) -> Self {
        ElementMatchPredicate { field, inner }
    }
}

impl Display for ElementMatchPredicate {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} has ({})", self.field, self.inner)
    }
}

impl PredicateProvider for ElementMatchPredicate {
    fn apply(&self, document: &Value) -> DamResult<bool> {
        for value in self.field.resolve(document) {
            let elements = match value {
                Value::Array(items) => items.iter().collect::<Vec<_>>(),
                other => vec![other],
            };
            for element in elements {
                if self.inner.apply(element)? {
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }
}
