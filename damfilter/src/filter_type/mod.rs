//! Filter types: which matchers an input type may try, in which order, and
//! how its key and value are interpreted.

use std::cmp::Ordering;
use std::collections::HashMap;

use crate::common::{compare_values, type_rank, FieldPath, FieldTarget};
use crate::config::FilterConfig;
use crate::criteria::{FilterCriterion, FilterValue, InputType};
use crate::errors::{DamError, DamResult, ErrorKind};
use crate::matcher::{prepare_operand, MatchInput, MatcherRule, Matchers, OperandKind};

/// Where a filter type reads its field from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetStrategy {
    /// The criterion key, resolved through the object-list configuration.
    Resolve,
    /// The configured root type field; the key is ignored.
    TypeField,
    /// The relations object list, discriminated by the key.
    Relation,
}

/// Collection and document variable a criterion is compiled against.
#[derive(Debug, Clone, Copy)]
pub struct FilterContext<'a> {
    pub config: &'a FilterConfig,
    pub collection: &'a str,
    pub scope: &'a str,
}

/// An input type with its ordered matcher rules.
pub struct FilterType<M: Matchers> {
    input_type: InputType,
    operand: OperandKind,
    target: TargetStrategy,
    exact_strings: bool,
    rules: Vec<MatcherRule<M>>,
}

impl<M: Matchers> Clone for FilterType<M> {
    fn clone(&self) -> Self {
        FilterType {
            input_type: self.input_type,
            operand: self.operand,
            target: self.target,
            exact_strings: self.exact_strings,
            rules: self.rules.clone(),
        }
    }
}

impl<M: Matchers> FilterType<M> {
    pub fn new(input_type: InputType, operand: OperandKind, target: TargetStrategy) -> Self {
        FilterType {
            input_type,
            operand,
            target,
            exact_strings: false,
            rules: Vec::new(),
        }
    }

    /// Appends a rule; rules are tried in insertion order.
    pub fn rule(mut self, rule: MatcherRule<M>) -> Self {
        self.rules.push(rule);
        self
    }

    /// Treats every string value as if `match_exact` were set.
    pub fn exact_strings(mut self) -> Self {
        self.exact_strings = true;
        self
    }

    pub fn text() -> Self {
        Self::new(InputType::Text, OperandKind::Plain, TargetStrategy::Resolve)
            .rule(MatcherRule::any())
            .rule(MatcherRule::none())
            .rule(MatcherRule::exact())
            .rule(MatcherRule::contains())
    }

    pub fn date() -> Self {
        Self::ranged(InputType::Date, OperandKind::Datetime)
    }

    pub fn number() -> Self {
        Self::ranged(InputType::Number, OperandKind::Numeric)
    }

    fn ranged(input_type: InputType, operand: OperandKind) -> Self {
        Self::new(input_type, operand, TargetStrategy::Resolve)
            .exact_strings()
            .rule(MatcherRule::any())
            .rule(MatcherRule::none())
            .rule(MatcherRule::exact())
            .rule(MatcherRule::min())
            .rule(MatcherRule::max())
            .rule(MatcherRule::min_included())
            .rule(MatcherRule::max_included())
            .rule(MatcherRule::in_between())
    }

    pub fn selection() -> Self {
        Self::new(InputType::Selection, OperandKind::Plain, TargetStrategy::Resolve)
            .exact_strings()
            .rule(MatcherRule::any())
            .rule(MatcherRule::none())
            .rule(MatcherRule::exact())
    }

    pub fn boolean() -> Self {
        Self::new(InputType::Boolean, OperandKind::Plain, TargetStrategy::Resolve)
            .exact_strings()
            .rule(MatcherRule::any())
            .rule(MatcherRule::none())
            .rule(MatcherRule::falsy())
            .rule(MatcherRule::exact())
    }

    pub fn type_field() -> Self {
        Self::new(InputType::Type, OperandKind::Plain, TargetStrategy::TypeField)
            .exact_strings()
            .rule(MatcherRule::any())
            .rule(MatcherRule::none())
            .rule(MatcherRule::exact())
    }

    pub fn relation() -> Self {
        Self::new(InputType::Relation, OperandKind::Plain, TargetStrategy::Relation)
            .exact_strings()
            .rule(MatcherRule::any())
            .rule(MatcherRule::none())
            .rule(MatcherRule::exact())
    }

    pub fn input_type(&self) -> InputType {
        self.input_type
    }

    pub fn operand(&self) -> OperandKind {
        self.operand
    }

    pub fn rules(&self) -> &[MatcherRule<M>] {
        &self.rules
    }

    /// Storage location read for `key`.
    pub fn target(&self, context: &FilterContext, key: &str) -> DamResult<FieldTarget> {
        let object_lists = context.config.object_lists();
        match self.target {
            TargetStrategy::Resolve => object_lists.resolve(context.collection, key),
            TargetStrategy::TypeField => {
                Ok(FieldTarget::Root(FieldPath::parse(context.config.type_key())?))
            }
            TargetStrategy::Relation => object_lists.relation_target(context.collection, key),
        }
    }

    /// Compiles `criterion` applied to `key` into one fragment.
    ///
    /// Returns `Ok(None)` when the value fits none of the rules.
    ///
    /// # Errors
    ///
    /// Returns [ErrorKind::ValidationError] for ranges without bounds, ranges
    /// whose minimum exceeds their maximum and malformed operands.
    pub fn generate_query(
        &self,
        matchers: &M,
        context: &FilterContext,
        key: &str,
        criterion: &FilterCriterion,
    ) -> DamResult<Option<M::Fragment>> {
        if let FilterValue::Range(range) = &criterion.value {
            if !range.has_min() && !range.has_max() {
                log::error!("Range filter on '{}' has neither min nor max", key);
                return Err(DamError::new(
                    &format!("Range filter on '{}' has neither min nor max", key),
                    ErrorKind::ValidationError,
                ));
            }
            if let (Some(min), Some(max)) = (range.min.as_ref(), range.max.as_ref()) {
                if range.has_min() && range.has_max() {
                    let min = prepare_operand(min, self.operand)?;
                    let max = prepare_operand(max, self.operand)?;
                    if type_rank(&min) == type_rank(&max)
                        && compare_values(&min, &max) == Ordering::Greater
                    {
                        log::error!("Range filter on '{}' has min {} above max {}", key, min, max);
                        return Err(DamError::new(
                            &format!("Range filter on '{}' has min {} above max {}", key, min, max),
                            ErrorKind::ValidationError,
                        ));
                    }
                }
            }
        }

        let target = self.target(context, key)?;
        let input = MatchInput {
            target: &target,
            value: &criterion.value,
            match_exact: criterion.match_exact || self.exact_strings,
            kind: self.operand,
            scope: context.scope,
        };
        for rule in &self.rules {
            if let Some(fragment) = rule.try_match(matchers, &input)? {
                log::debug!(
                    "Filter '{}' on '{}' compiled with matcher '{}'",
                    self.input_type,
                    key,
                    rule.name()
                );
                return Ok(Some(fragment));
            }
        }

        log::debug!(
            "Filter '{}' on '{}' skipped, no matcher accepts value {:?}",
            self.input_type,
            key,
            criterion.value
        );
        Ok(None)
    }
}

/// Registry of filter types by input type.
pub struct FilterTypes<M: Matchers> {
    types: HashMap<InputType, FilterType<M>>,
}

impl<M: Matchers> Default for FilterTypes<M> {
    fn default() -> Self {
        Self::standard()
    }
}

impl<M: Matchers> FilterTypes<M> {
    pub fn empty() -> Self {
        FilterTypes { types: HashMap::new() }
    }

    /// All seven built-in filter types.
    pub fn standard() -> Self {
        Self::empty()
            .register(FilterType::text())
            .register(FilterType::date())
            .register(FilterType::number())
            .register(FilterType::selection())
            .register(FilterType::boolean())
            .register(FilterType::type_field())
            .register(FilterType::relation())
    }

    pub fn register(mut self, filter_type: FilterType<M>) -> Self {
        self.types.insert(filter_type.input_type(), filter_type);
        self
    }

    /// Looks up the filter type named by a criterion's `type`.
    ///
    /// # Errors
    ///
    /// Returns [ErrorKind::ConfigurationError] for unknown or unregistered
    /// types.
    pub fn resolve(&self, raw_type: &str) -> DamResult<&FilterType<M>> {
        let input_type: InputType = raw_type.parse()?;
        self.types.get(&input_type).ok_or_else(|| {
            log::error!("Filter type '{}' is not registered", raw_type);
            DamError::new(
                &format!("Filter type '{}' is not registered", raw_type),
                ErrorKind::ConfigurationError,
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::memory::MemoryMatchers;
    use crate::matcher::ROOT_SCOPE;
    use serde_json::json;

    fn context(config: &FilterConfig) -> FilterContext<'_> {
        FilterContext {
            config,
            collection: "entities",
            scope: ROOT_SCOPE,
        }
    }

    fn compile(
        filter_type: &FilterType<MemoryMatchers>,
        key: &str,
        criterion: &FilterCriterion,
    ) -> DamResult<Option<String>> {
        let config = FilterConfig::default();
        filter_type
            .generate_query(&MemoryMatchers, &context(&config), key, criterion)
            .map(|fragment| fragment.map(|predicate| predicate.to_string()))
    }

    #[test]
    fn text_prefers_contains_for_loose_strings() {
        let criterion = FilterCriterion::new(InputType::Text, "title").value(json!("Night"));
        let compiled = compile(&FilterType::text(), "title", &criterion).unwrap().unwrap();
        assert!(compiled.contains("regex"), "{}", compiled);
    }

    #[test]
    fn selection_matches_strings_exactly() {
        let criterion = FilterCriterion::new(InputType::Selection, "rights").value(json!("CC-BY"));
        let compiled = compile(&FilterType::selection(), "rights", &criterion).unwrap().unwrap();
        assert!(compiled.contains("in [\"CC-BY\"]"), "{}", compiled);
    }

    #[test]
    fn unmatched_value_is_skipped() {
        let criterion = FilterCriterion::new(InputType::Text, "title").value(json!(""));
        assert_eq!(compile(&FilterType::text(), "title", &criterion).unwrap(), None);

        let missing = FilterCriterion::new(InputType::Text, "title");
        assert_eq!(compile(&FilterType::text(), "title", &missing).unwrap(), None);
    }

    #[test]
    fn ranges_are_validated_before_matching() {
        let empty = FilterCriterion::new(InputType::Number, "height").value(json!({"included": true}));
        let err = compile(&FilterType::number(), "height", &empty).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::ValidationError);

        let inverted = FilterCriterion::new(InputType::Number, "height").value(json!({"min": 10, "max": 2}));
        let err = compile(&FilterType::number(), "height", &inverted).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::ValidationError);

        let dates = FilterCriterion::new(InputType::Date, "date_created")
            .value(json!({"min": "2021-01-01T00:00", "max": "2020-01-01T00:00"}));
        let err = compile(&FilterType::date(), "date_created", &dates).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::ValidationError);
    }

    #[test]
    fn empty_object_is_a_range_without_bounds() {
        let criterion = FilterCriterion::new(InputType::Text, "title").value(json!({}));
        let err = compile(&FilterType::text(), "title", &criterion).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::ValidationError);
        assert!(err.message().contains("neither min nor max"), "{}", err.message());
    }

    #[test]
    fn type_filter_ignores_key() {
        let criterion = FilterCriterion::new(InputType::Type, "whatever").value(json!("asset"));
        let compiled = compile(&FilterType::type_field(), "whatever", &criterion).unwrap().unwrap();
        assert!(compiled.starts_with("type in"), "{}", compiled);
    }

    #[test]
    fn relation_filter_reads_relations_list() {
        let criterion = FilterCriterion::new(InputType::Relation, "isIn").value(json!("entities/1"));
        let compiled = compile(&FilterType::relation(), "isIn", &criterion).unwrap().unwrap();
        assert!(compiled.starts_with("relations.isIn.key"), "{}", compiled);
    }

    #[test]
    fn registry_rejects_unknown_types() {
        let types = FilterTypes::<MemoryMatchers>::standard();
        assert_eq!(types.resolve("date").unwrap().input_type(), InputType::Date);
        let err = types.resolve("geo").err().unwrap();
        assert_eq!(err.kind(), &ErrorKind::ConfigurationError);

        let partial = FilterTypes::<MemoryMatchers>::empty().register(FilterType::text());
        let err = partial.resolve("number").err().unwrap();
        assert_eq!(err.kind(), &ErrorKind::ConfigurationError);
    }
}
