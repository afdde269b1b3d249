//! Role restriction rules
//!
//! Every restriction of every role is instantiated once per building whose
//! name matches the restriction's `building_suffix`. Restriction effects are
//! taken verbatim; they never go through the effect probability table.

use crate::catalog::DimensionCatalog;
use crate::engine::error::GenerationResult;
use crate::generation::context::GenerationContext;
use crate::policy::{Bindings, Resource, RuleCandidate, RuleOrigin, Subject, TopicTemplate};
use crate::types::{DimensionKind, Hint, HintSet, PolicyConfig, RestrictionDefinition, RoleDefinition};
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Builds role-scoped restriction rules
#[derive(Debug)]
pub struct RestrictionRuleBuilder<'a> {
    catalog: &'a DimensionCatalog,
    config: &'a PolicyConfig,
}

impl<'a> RestrictionRuleBuilder<'a> {
    /// Create a builder over the catalog and configuration
    pub fn new(catalog: &'a DimensionCatalog, config: &'a PolicyConfig) -> Self {
        Self { catalog, config }
    }

    /// Build restriction rules for all roles, in role name order
    #[instrument(skip_all, fields(roles = self.config.roles.len()))]
    pub fn build(&self, ctx: &mut GenerationContext) -> GenerationResult<Vec<RuleCandidate>> {
        let mut candidates = Vec::new();
        for (role_name, role) in &self.config.roles {
            for (index, restriction) in role.restrictions.iter().enumerate() {
                let rules = self.build_restriction(role_name, role, index, restriction, ctx)?;
                debug!(
                    role = %role_name,
                    template = %restriction.topic_template,
                    rules = rules.len(),
                    "Built role restriction"
                );
                candidates.extend(rules);
            }
        }
        Ok(candidates)
    }

    fn build_restriction(
        &self,
        role_name: &str,
        role: &RoleDefinition,
        index: usize,
        restriction: &RestrictionDefinition,
        ctx: &mut GenerationContext,
    ) -> GenerationResult<Vec<RuleCandidate>> {
        let template = Arc::new(TopicTemplate::parse(&restriction.topic_template)?);
        let priority = restriction.priority.saturating_add(self.priority_bonus(role_name, restriction));
        let hints = restriction.hints.clone().unwrap_or_else(|| HintSet::single(Hint::Subj));
        let floor = restriction.floor.as_ref().map(|floor| self.catalog.floor_label(floor));

        let mut candidates = Vec::new();
        for building in &self.catalog.dimension(DimensionKind::Building).values {
            if let Some(suffix) = &restriction.building_suffix {
                if !building.has_suffix(suffix) {
                    continue;
                }
            }

            let mut bindings = Bindings::new().with(DimensionKind::Building, building.label.as_str());
            match &floor {
                Some(label) => bindings.bind(DimensionKind::Floor, label.as_str()),
                None => bindings.bind_wildcard(DimensionKind::Floor),
            }

            let topic = template.render(&bindings)?;
            candidates.push(RuleCandidate {
                id: ctx.next_rule_id(),
                subject: Subject::Role(role_name.to_string()),
                action: restriction.access,
                resource: Resource::topic(topic),
                effect: restriction.effect,
                hints: hints.clone(),
                priority,
                restricted: true,
                role_importance: role.priority,
                subsumed: 1,
                origin: RuleOrigin::Restriction { role: role_name.to_string(), index },
                template: Arc::clone(&template),
                bindings,
            });
        }
        Ok(candidates)
    }

    fn priority_bonus(&self, role_name: &str, restriction: &RestrictionDefinition) -> u32 {
        let Some(key) = &restriction.priority_offset_config else {
            return 0;
        };
        match self.config.priority_bonus(key) {
            Some(bonus) => bonus,
            None => {
                warn!(
                    role = %role_name,
                    key = %key,
                    "Priority offset is missing or not numeric, using 0"
                );
                0
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Action, Effect, Expansions, FloorRef};
    use std::collections::BTreeMap;

    fn restriction(template: &str) -> RestrictionDefinition {
        RestrictionDefinition {
            topic_template: template.to_string(),
            building_suffix: None,
            floor: None,
            effect: Effect::Deny,
            access: Action::All,
            priority: 1,
            priority_offset_config: None,
            hints: None,
        }
    }

    fn config(restrictions: Vec<RestrictionDefinition>) -> PolicyConfig {
        let mut roles = BTreeMap::new();
        roles.insert("intern".to_string(), RoleDefinition { priority: 3, restrictions });
        let mut config = PolicyConfig {
            expansions: Expansions {
                buildings: Some(vec!["bldg1".to_string(), "bldg2".to_string(), "bldg12".to_string()]),
                floors: vec!["f1".to_string(), "f2".to_string(), "f3".to_string()],
                rooms: Vec::new(),
                devices: Vec::new(),
            },
            roles,
            ..PolicyConfig::default()
        };
        config.named_values.insert("security_bonus".to_string(), serde_json::json!(50));
        config
    }

    fn build(config: &PolicyConfig) -> Vec<RuleCandidate> {
        let catalog = DimensionCatalog::from_expansions(&config.expansions);
        let mut ctx = GenerationContext::with_seed(1);
        RestrictionRuleBuilder::new(&catalog, config).build(&mut ctx).unwrap()
    }

    #[test]
    fn test_building_suffix_filter() {
        let mut def = restriction("{b}/#");
        def.building_suffix = Some("2".to_string());
        let rules = build(&config(vec![def]));

        let topics: Vec<&str> = rules.iter().map(|r| r.resource.topic.as_str()).collect();
        assert_eq!(topics, vec!["bldg2/#", "bldg12/#"]);
        assert!(rules.iter().all(|r| r.restricted && r.effect == Effect::Deny));
        assert!(rules.iter().all(|r| r.subject == Subject::Role("intern".to_string())));
        assert!(rules.iter().all(|r| r.role_importance == 3));
        assert_eq!(rules[0].hints.to_string(), "subj");
    }

    #[test]
    fn test_explicit_floor_and_priority_bonus() {
        let mut def = restriction("{b}/{fl}/#");
        def.floor = Some(FloorRef::Number(3));
        def.priority_offset_config = Some("security_bonus".to_string());
        let rules = build(&config(vec![def]));

        assert_eq!(rules.len(), 3);
        assert_eq!(rules[0].resource.topic, "bldg1/f3/#");
        assert!(rules.iter().all(|r| r.priority == 51));
    }

    #[test]
    fn test_missing_bonus_counts_as_zero() {
        let mut def = restriction("{b}/#");
        def.priority_offset_config = Some("no_such_key".to_string());
        let rules = build(&config(vec![def]));
        assert!(rules.iter().all(|r| r.priority == 1));
    }

    #[test]
    fn test_unscoped_floor_renders_wildcard() {
        let rules = build(&config(vec![restriction("{b}/{fl}/#")]));
        assert_eq!(rules[0].resource.topic, "bldg1/+/#");
    }
}
