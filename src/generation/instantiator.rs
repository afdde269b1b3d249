//! Template instantiation
//!
//! Expands each base policy over the cross product of its `expand_on`
//! dimensions and, when a range is configured, over the range values.

use crate::catalog::DimensionCatalog;
use crate::engine::error::GenerationResult;
use crate::generation::context::GenerationContext;
use crate::policy::{Bindings, ConditionTemplate, Resource, RuleCandidate, RuleOrigin, Subject, TopicTemplate};
use crate::types::{BasePolicy, DimensionKind, EffectWeights};
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Expands base policy templates into rule candidates
#[derive(Debug)]
pub struct TemplateInstantiator<'a> {
    catalog: &'a DimensionCatalog,
    global_weights: Option<&'a EffectWeights>,
}

impl<'a> TemplateInstantiator<'a> {
    /// Create an instantiator over a catalog and the global effect table
    pub fn new(catalog: &'a DimensionCatalog, global_weights: Option<&'a EffectWeights>) -> Self {
        Self { catalog, global_weights }
    }

    /// Instantiate every base policy in configured order
    #[instrument(skip_all, fields(templates = policies.len()))]
    pub fn instantiate_all(
        &self,
        policies: &[BasePolicy],
        ctx: &mut GenerationContext,
    ) -> GenerationResult<Vec<RuleCandidate>> {
        let mut candidates = Vec::new();
        for (index, policy) in policies.iter().enumerate() {
            let expanded = self.instantiate(index, policy, ctx)?;
            debug!(
                template = %policy.topic_template,
                candidates = expanded.len(),
                "Instantiated base policy"
            );
            candidates.extend(expanded);
        }
        Ok(candidates)
    }

    /// Instantiate a single base policy
    ///
    /// A referenced dimension with no values yields no candidates. An empty
    /// `expand_on` emits the template once (per range value).
    pub fn instantiate(
        &self,
        index: usize,
        policy: &BasePolicy,
        ctx: &mut GenerationContext,
    ) -> GenerationResult<Vec<RuleCandidate>> {
        let template = Arc::new(TopicTemplate::parse(&policy.topic_template)?);
        let static_expr = ConditionTemplate::parse(&policy.static_expr);
        let dynamic = ConditionTemplate::parse(&policy.dynamic);
        let filter = ConditionTemplate::parse(&policy.filter);
        let weights = policy.action_probabilities.as_ref().or(self.global_weights);

        let dimensions = self.value_lists(policy);
        if let Some((kind, _)) = dimensions.iter().find(|(_, values)| values.is_empty()) {
            debug!(template = %policy.topic_template, dimension = %kind, "Dimension has no values, skipping");
            return Ok(Vec::new());
        }

        let range_values: Vec<Option<i64>> = match &policy.range {
            Some(range) => range.values().map(Some).collect(),
            None => vec![None],
        };
        let uses_value = [&static_expr, &dynamic, &filter].iter().any(|c| c.has_placeholders());
        if policy.range.is_some() && !uses_value {
            warn!(
                template = %policy.topic_template,
                "Range configured but no condition uses {{v}} or {{v_plus}}, rules will repeat"
            );
        }

        let mut candidates = Vec::new();
        for bindings in cartesian_bindings(&dimensions) {
            let topic = template.render(&bindings)?;
            for value in &range_values {
                let subject = Subject::from_expression(static_expr.render(*value)?);
                let resource = Resource {
                    topic: topic.clone(),
                    dynamic: dynamic.render(*value)?,
                    filter: filter.render(*value)?,
                };
                let effect = ctx.choose_effect(weights, policy.effect);
                candidates.push(RuleCandidate {
                    id: ctx.next_rule_id(),
                    subject,
                    action: policy.access,
                    resource,
                    effect,
                    hints: policy.hints.clone(),
                    priority: policy.priority,
                    restricted: false,
                    role_importance: 0,
                    subsumed: 1,
                    origin: RuleOrigin::Template { index },
                    template: Arc::clone(&template),
                    bindings: bindings.clone(),
                });
            }
        }

        Ok(candidates)
    }

    /// Values of each expanded dimension, in `expand_on` order without repeats
    fn value_lists(&self, policy: &BasePolicy) -> Vec<(DimensionKind, Vec<String>)> {
        let mut lists: Vec<(DimensionKind, Vec<String>)> = Vec::new();
        for kind in &policy.expand_on {
            if lists.iter().any(|(seen, _)| seen == kind) {
                continue;
            }
            let values = if *kind == DimensionKind::Device && !policy.devices.is_empty() {
                policy.devices.clone()
            } else {
                self.catalog.dimension(*kind).labels().map(str::to_string).collect()
            };
            lists.push((*kind, values));
        }
        lists
    }
}

/// Cross product of dimension values; the first dimension varies slowest
pub(crate) fn cartesian_bindings(dimensions: &[(DimensionKind, Vec<String>)]) -> Vec<Bindings> {
    let mut combinations = vec![Bindings::new()];
    for (kind, values) in dimensions {
        let mut next = Vec::with_capacity(combinations.len() * values.len());
        for partial in &combinations {
            for value in values {
                next.push(partial.clone().with(*kind, value.as_str()));
            }
        }
        combinations = next;
    }
    combinations
}
