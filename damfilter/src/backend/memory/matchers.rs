use regex::RegexBuilder;
use serde_json::Value;

use crate::common::{FieldPath, FieldTarget};
use crate::errors::DamResult;
use crate::matcher::{Comparison, Matchers, OperandKind};

use super::field_predicates::{
    BetweenPredicate, ComparePredicate, EqualsPredicate, PresentPredicate, RegexPredicate,
};
use super::predicate::{
    AllPredicate, AndPredicate, ElementMatchPredicate, NotPredicate, OrPredicate,
};
use super::Predicate;

/// Builds evaluable [Predicate] trees.
#[derive(Debug, Clone, Copy, Default)]
pub struct MemoryMatchers;

impl Matchers for MemoryMatchers {
    type Fragment = Predicate;

    fn exact(&self, target: &FieldTarget, values: &[Value], _scope: &str) -> DamResult<Predicate> {
        Ok(Predicate::new(EqualsPredicate::new(target.clone(), values.to_vec())))
    }

    fn contains(&self, target: &FieldTarget, needle: &str, _scope: &str) -> DamResult<Predicate> {
        let pattern = RegexBuilder::new(&regex::escape(needle))
            .case_insensitive(true)
            .build()?;
        Ok(Predicate::new(RegexPredicate::new(target.clone(), pattern)))
    }

    fn compare(
        &self,
        target: &FieldTarget,
        comparison: Comparison,
        operand: &Value,
        kind: OperandKind,
        _scope: &str,
    ) -> DamResult<Predicate> {
        Ok(Predicate::new(ComparePredicate::new(
            target.clone(),
            comparison,
            operand.clone(),
            kind,
        )))
    }

    fn in_between(
        &self,
        target: &FieldTarget,
        min: &Value,
        max: &Value,
        kind: OperandKind,
        _scope: &str,
    ) -> DamResult<Predicate> {
        Ok(Predicate::new(BetweenPredicate::new(
            target.clone(),
            min.clone(),
            max.clone(),
            kind,
        )))
    }

    fn any(&self, target: &FieldTarget, _scope: &str) -> DamResult<Predicate> {
        Ok(Predicate::new(PresentPredicate::new(target.clone())))
    }

    fn none(&self, target: &FieldTarget, scope: &str) -> DamResult<Predicate> {
        Ok(Predicate::new(NotPredicate::new(self.any(target, scope)?)))
    }

    fn and(&self, mut fragments: Vec<Predicate>) -> Predicate {
        match fragments.len() {
            0 => Predicate::new(AllPredicate),
            1 => fragments.remove(0),
            _ => Predicate::new(AndPredicate::new(fragments)),
        }
    }

    fn or(&self, mut fragments: Vec<Predicate>) -> Predicate {
        match fragments.len() {
            1 => fragments.remove(0),
            _ => Predicate::new(OrPredicate::new(fragments)),
        }
    }

    fn within(
        &self,
        alias: &FieldPath,
        _scope: &str,
        _inner_scope: &str,
        inner: Predicate,
    ) -> DamResult<Predicate> {
        Ok(Predicate::new(ElementMatchPredicate::new(alias.clone(), inner)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn title() -> FieldTarget {
        FieldTarget::ObjectList {
            list: "metadata".into(),
            discriminator: "key".into(),
            name: "title".into(),
            leaf: FieldPath::field("value"),
        }
    }

    #[test]
    fn contains_escapes_and_ignores_case() {
        let predicate = MemoryMatchers.contains(&title(), "a.b (1)", "doc").unwrap();
        let doc = json!({"metadata": [{"key": "title", "value": "Study A.B (1) in red"}]});
        assert!(predicate.apply(&doc).unwrap());
        let other = json!({"metadata": [{"key": "title", "value": "Study axb (1)"}]});
        assert!(!predicate.apply(&other).unwrap());
    }

    #[test]
    fn any_and_none_are_complements() {
        let documents = [
            json!({}),
            json!({"metadata": []}),
            json!({"metadata": [{"key": "title"}]}),
            json!({"metadata": [{"key": "title", "value": null}]}),
            json!({"metadata": [{"key": "title", "value": ""}]}),
            json!({"metadata": [{"key": "title", "value": "x"}]}),
            json!({"metadata": [{"key": "title", "value": ""}, {"key": "title", "value": "x"}]}),
        ];
        let any = MemoryMatchers.any(&title(), "doc").unwrap();
        let none = MemoryMatchers.none(&title(), "doc").unwrap();
        for document in &documents {
            assert_ne!(any.apply(document).unwrap(), none.apply(document).unwrap(), "{}", document);
        }
        assert!(any.apply(&documents[5]).unwrap());
        assert!(none.apply(&documents[0]).unwrap());
    }

    #[test]
    fn empty_combinators() {
        let doc = json!({});
        assert!(MemoryMatchers.and(vec![]).apply(&doc).unwrap());
        assert!(!MemoryMatchers.or(vec![]).apply(&doc).unwrap());
    }
}
