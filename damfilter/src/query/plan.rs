use serde_json::Value;

use crate::common::{FieldPath, FieldTarget, SchemaRef, SortOrder};
use crate::config::FilterConfig;
use crate::criteria::{FilterCriterion, FilterKey, InputType, Lookup};
use crate::errors::DamResult;
use crate::filter_type::{FilterContext, FilterType, FilterTypes};
use crate::matcher::{Matchers, JOIN_SCOPE, ROOT_SCOPE};

use super::FilterRequest;

/// Sort applied to document results.
#[derive(Debug, Clone, PartialEq)]
pub struct SortPlan {
    pub target: FieldTarget,
    pub order: SortOrder,
}

/// Distinct-values output of an options request.
#[derive(Debug, Clone, PartialEq)]
pub struct OptionsPlan {
    /// Field whose values become options.
    pub target: FieldTarget,
    /// Whether values are document ids to be labelled.
    pub resolve_labels: bool,
    pub label_collection: String,
    pub label_target: FieldTarget,
}

#[derive(Debug, Clone, PartialEq)]
pub enum OutputPlan {
    Documents,
    Options(OptionsPlan),
}

/// Backend-independent result of compiling a filter request.
///
/// `predicate` is `None` when no criterion contributed a fragment, in which
/// case every document matches.
#[derive(Debug, Clone)]
pub struct QueryPlan<F> {
    pub collection: String,
    pub lookups: Vec<Lookup>,
    pub predicate: Option<F>,
    pub output: OutputPlan,
    pub sort: SortPlan,
    pub skip: u64,
    pub limit: u64,
}

impl<F> QueryPlan<F> {
    pub fn is_options(&self) -> bool {
        matches!(self.output, OutputPlan::Options(_))
    }
}

/// Fragments of schema-scoped keys addressing one schema.
struct SchemaGroup<F> {
    schema: Option<SchemaRef>,
    fragments: Vec<F>,
}

/// Folds criteria into a [QueryPlan] with the fragments of one backend.
pub struct QueryEngine<M: Matchers> {
    matchers: M,
    filter_types: FilterTypes<M>,
}

impl<M: Matchers> QueryEngine<M> {
    pub fn new(matchers: M) -> Self {
        QueryEngine {
            matchers,
            filter_types: FilterTypes::standard(),
        }
    }

    pub fn with_filter_types(matchers: M, filter_types: FilterTypes<M>) -> Self {
        QueryEngine { matchers, filter_types }
    }

    pub fn matchers(&self) -> &M {
        &self.matchers
    }

    /// Compiles `request`.
    ///
    /// Every criterion is validated here, so a plan is only returned when
    /// the whole request is well formed.
    pub fn plan(
        &self,
        config: &FilterConfig,
        request: &FilterRequest,
    ) -> DamResult<QueryPlan<M::Fragment>> {
        let collection = request.collection.as_str();
        let mut lookups: Vec<Lookup> = Vec::new();
        for lookup in request.criteria.iter().filter_map(|c| c.lookup.as_ref()) {
            if !lookups.iter().any(|known| known.alias == lookup.alias) {
                lookups.push(lookup.clone());
            }
        }

        let mut general = Vec::new();
        let mut schema_groups: Vec<SchemaGroup<M::Fragment>> = Vec::new();
        let mut options = None;

        for criterion in &request.criteria {
            let filter_type = self.filter_types.resolve(&criterion.input_type)?;

            let item_types = criterion.item_types.as_ref().filter(|types| !types.is_empty());
            if let Some(item_types) = item_types {
                let type_target = FieldTarget::Root(FieldPath::parse(config.type_key())?);
                let values: Vec<Value> = item_types
                    .iter()
                    .map(|item_type| Value::String(item_type.clone()))
                    .collect();
                general.push(self.matchers.exact(&type_target, &values, ROOT_SCOPE)?);
            }

            if let Some(options_key) = criterion.options_key() {
                if options.is_none() {
                    options = Some(self.options_plan(
                        config,
                        collection,
                        filter_type,
                        criterion,
                        &options_key,
                    )?);
                }
                continue;
            }

            if criterion.value.is_missing() {
                log::debug!(
                    "Filter '{}' on {:?} skipped, no value given",
                    criterion.input_type,
                    criterion.key
                );
                continue;
            }

            let single = matches!(criterion.key, FilterKey::Single(_));
            for scoped in criterion.key.scoped_keys()? {
                let fragment = self.criterion_fragment(
                    config,
                    collection,
                    &lookups,
                    filter_type,
                    &scoped.field,
                    criterion,
                )?;
                let Some(fragment) = fragment else {
                    continue;
                };
                match scoped.schema {
                    None if single => general.push(fragment),
                    schema => match schema_groups.iter_mut().find(|group| group.schema == schema) {
                        Some(group) => group.fragments.push(fragment),
                        None => schema_groups.push(SchemaGroup {
                            schema,
                            fragments: vec![fragment],
                        }),
                    },
                }
            }
        }

        if !schema_groups.is_empty() {
            let branches = schema_groups
                .into_iter()
                .map(|group| self.schema_branch(config, group))
                .collect::<DamResult<Vec<_>>>()?;
            general.push(self.matchers.or(branches));
        }
        let predicate = if general.is_empty() {
            None
        } else {
            Some(self.matchers.and(general))
        };

        let sort_key = request.order_by.as_deref().unwrap_or(config.default_sort_key());
        let sort = SortPlan {
            target: config.object_lists().resolve(collection, sort_key)?,
            order: request.order,
        };

        Ok(QueryPlan {
            collection: collection.to_string(),
            lookups,
            predicate,
            output: options.map(OutputPlan::Options).unwrap_or(OutputPlan::Documents),
            sort,
            skip: request.skip,
            limit: request.limit.unwrap_or(config.default_limit()),
        })
    }

    fn criterion_fragment(
        &self,
        config: &FilterConfig,
        collection: &str,
        lookups: &[Lookup],
        filter_type: &FilterType<M>,
        key: &str,
        criterion: &FilterCriterion,
    ) -> DamResult<Option<M::Fragment>> {
        let joined = lookups.iter().find_map(|lookup| {
            key.strip_prefix(lookup.alias.as_str())
                .and_then(|rest| rest.strip_prefix('.'))
                .map(|rest| (lookup, rest))
        });

        match joined {
            Some((lookup, inner_key)) => {
                let context = FilterContext {
                    config,
                    collection: &lookup.from,
                    scope: JOIN_SCOPE,
                };
                match filter_type.generate_query(&self.matchers, &context, inner_key, criterion)? {
                    Some(inner) => {
                        let alias = FieldPath::parse(&lookup.alias)?;
                        self.matchers.within(&alias, ROOT_SCOPE, JOIN_SCOPE, inner).map(Some)
                    }
                    None => Ok(None),
                }
            }
            None => {
                let context = FilterContext {
                    config,
                    collection,
                    scope: ROOT_SCOPE,
                };
                filter_type.generate_query(&self.matchers, &context, key, criterion)
            }
        }
    }

    /// Every fragment collected for one schema, ANDed with the schema's own
    /// predicate.
    fn schema_branch(
        &self,
        config: &FilterConfig,
        group: SchemaGroup<M::Fragment>,
    ) -> DamResult<M::Fragment> {
        let mut fragments = group.fragments;
        if let Some(schema) = &group.schema {
            fragments.insert(0, self.schema_predicate(config, schema)?);
        }
        Ok(self.matchers.and(fragments))
    }

    fn schema_predicate(
        &self,
        config: &FilterConfig,
        schema: &SchemaRef,
    ) -> DamResult<M::Fragment> {
        let type_target = FieldTarget::Root(FieldPath::parse(config.schema_type_key())?);
        let type_predicate = self.matchers.exact(
            &type_target,
            &[Value::String(schema.schema_type().to_string())],
            ROOT_SCOPE,
        )?;
        if schema.version().is_none() {
            return Ok(type_predicate);
        }
        let version_target = FieldTarget::Root(FieldPath::parse(config.schema_version_key())?);
        let version_predicate =
            self.matchers.exact(&version_target, &schema.version_values(), ROOT_SCOPE)?;
        Ok(self.matchers.and(vec![type_predicate, version_predicate]))
    }

    fn options_plan(
        &self,
        config: &FilterConfig,
        collection: &str,
        filter_type: &FilterType<M>,
        criterion: &FilterCriterion,
        options_key: &str,
    ) -> DamResult<OptionsPlan> {
        let context = FilterContext {
            config,
            collection,
            scope: ROOT_SCOPE,
        };
        let field = match crate::common::ScopedKey::parse(options_key) {
            Ok(scoped) => scoped.field,
            Err(_) => options_key.to_string(),
        };
        let target = filter_type.target(&context, &field)?;
        let resolve_labels = filter_type.input_type() == InputType::Relation;
        let label_collection = criterion
            .lookup
            .as_ref()
            .map(|lookup| lookup.from.clone())
            .unwrap_or_else(|| collection.to_string());
        let label_target = config.object_lists().resolve(&label_collection, config.label_key())?;
        Ok(OptionsPlan {
            target,
            resolve_labels,
            label_collection,
            label_target,
        })
    }
}
