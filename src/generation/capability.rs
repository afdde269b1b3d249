//! Capability grants
//!
//! A user attribute whose value looks like `?true` grants access to the
//! device types mapped to that attribute name. Each grant is emitted twice:
//! once for the user by name, and once for any holder of the attribute.

use crate::catalog::{DimensionCatalog, UserDirectory};
use crate::engine::error::GenerationResult;
use crate::generation::context::GenerationContext;
use crate::generation::instantiator::cartesian_bindings;
use crate::policy::{Resource, RuleCandidate, RuleOrigin, Subject, TopicTemplate};
use crate::types::{Action, DimensionKind, Effect, Hint, HintSet, PolicyConfig, UserId};
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Topic covered by capability grants
pub const CAPABILITY_TOPIC: &str = "{b}/{fl}/{r}/{dev}/#";

/// Priority of capability grants
pub const CAPABILITY_PRIORITY: u32 = 5;

/// Builds per-user and per-attribute capability grants
#[derive(Debug)]
pub struct CapabilityRuleBuilder<'a> {
    catalog: &'a DimensionCatalog,
    directory: &'a UserDirectory,
    config: &'a PolicyConfig,
}

impl<'a> CapabilityRuleBuilder<'a> {
    /// Create a builder
    pub fn new(
        catalog: &'a DimensionCatalog,
        directory: &'a UserDirectory,
        config: &'a PolicyConfig,
    ) -> Self {
        Self { catalog, directory, config }
    }

    /// Build capability grants for every attribute owner, in order of first appearance
    #[instrument(skip_all)]
    pub fn build(&self, ctx: &mut GenerationContext) -> GenerationResult<Vec<RuleCandidate>> {
        let template = Arc::new(TopicTemplate::parse(CAPABILITY_TOPIC)?);
        let mut candidates = Vec::new();

        for userid in self.directory.attribute_owners() {
            let Some(user) = self.directory.get(userid) else {
                warn!(userid = %userid, "Attributes reference an unknown user, skipping");
                continue;
            };

            let capabilities: Vec<&str> = self.directory.capabilities_of(userid).collect();
            if capabilities.is_empty() {
                continue;
            }
            let importance = self.role_importance(userid);

            for attribute in &capabilities {
                let subject = Subject::User(user.username.clone());
                candidates.extend(self.grants(&template, attribute, subject, importance, ctx)?);
            }
            for attribute in &capabilities {
                let subject = Subject::Attribute(attribute.to_string());
                candidates.extend(self.grants(&template, attribute, subject, 0, ctx)?);
            }
            debug!(user = %user.username, capabilities = capabilities.len(), "Built capability grants");
        }

        Ok(candidates)
    }

    /// Highest importance among the roles a user holds
    fn role_importance(&self, userid: UserId) -> u32 {
        self.directory
            .roles_of(userid)
            .filter_map(|role| self.config.roles.get(role))
            .map(|role| role.priority)
            .max()
            .unwrap_or(0)
    }

    fn grants(
        &self,
        template: &Arc<TopicTemplate>,
        attribute: &str,
        subject: Subject,
        role_importance: u32,
        ctx: &mut GenerationContext,
    ) -> GenerationResult<Vec<RuleCandidate>> {
        let Some(devices) = self.config.capability_devices.get(attribute) else {
            return Ok(Vec::new());
        };

        let mut candidates = Vec::new();
        for device in devices {
            let dimensions = [
                (DimensionKind::Building, self.labels_or_blank(DimensionKind::Building)),
                (DimensionKind::Floor, self.labels_or_blank(DimensionKind::Floor)),
                (DimensionKind::Room, self.labels_or_blank(DimensionKind::Room)),
                (DimensionKind::Device, vec![device.clone()]),
            ];
            for bindings in cartesian_bindings(&dimensions) {
                let topic = template.render(&bindings)?;
                let effect = ctx.choose_effect(self.config.action_probabilities.as_ref(), Effect::Grant);
                candidates.push(RuleCandidate {
                    id: ctx.next_rule_id(),
                    subject: subject.clone(),
                    action: Action::All,
                    resource: Resource::topic(topic),
                    effect,
                    hints: HintSet::single(Hint::Subj),
                    priority: CAPABILITY_PRIORITY,
                    restricted: false,
                    role_importance,
                    subsumed: 1,
                    origin: RuleOrigin::Capability { attribute: attribute.to_string() },
                    template: Arc::clone(template),
                    bindings,
                });
            }
        }
        Ok(candidates)
    }

    /// Labels of a dimension; an empty dimension collapses out of the topic
    fn labels_or_blank(&self, kind: DimensionKind) -> Vec<String> {
        let dimension = self.catalog.dimension(kind);
        if dimension.is_empty() {
            vec![String::new()]
        } else {
            dimension.labels().map(str::to_string).collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{User, UserAttribute};
    use crate::types::{Expansions, RoleDefinition};
    use std::collections::BTreeMap;

    fn config() -> PolicyConfig {
        let mut roles = BTreeMap::new();
        roles.insert("staff".to_string(), RoleDefinition { priority: 4, restrictions: Vec::new() });
        PolicyConfig {
            users: vec![User {
                userid: UserId(1),
                clientid: "c1".to_string(),
                username: "alice".to_string(),
                password: String::new(),
            }],
            user_attributes: vec![
                UserAttribute { userid: UserId(1), name: "video".to_string(), val: "?true".to_string() },
                UserAttribute { userid: UserId(1), name: "role".to_string(), val: "staff".to_string() },
                UserAttribute { userid: UserId(1), name: "alarm".to_string(), val: "?false".to_string() },
                UserAttribute { userid: UserId(9), name: "video".to_string(), val: "?true".to_string() },
            ],
            expansions: Expansions {
                buildings: Some(vec!["B1".to_string(), "B2".to_string()]),
                floors: vec!["f1".to_string()],
                rooms: Vec::new(),
                devices: Vec::new(),
            },
            roles,
            ..PolicyConfig::default()
        }
    }

    fn build(config: &PolicyConfig) -> Vec<RuleCandidate> {
        let catalog = DimensionCatalog::from_expansions(&config.expansions);
        let directory = UserDirectory::new(config.users.clone(), config.user_attributes.clone());
        let mut ctx = GenerationContext::with_seed(1);
        CapabilityRuleBuilder::new(&catalog, &directory, config).build(&mut ctx).unwrap()
    }

    #[test]
    fn test_user_and_attribute_grants() {
        let rules = build(&config());

        // Two buildings, one floor, no rooms, one device, for the user and the attribute
        assert_eq!(rules.len(), 4);
        assert_eq!(rules[0].subject, Subject::User("alice".to_string()));
        assert_eq!(rules[0].resource.topic, "B1/f1/cam/#");
        assert_eq!(rules[0].role_importance, 4);
        assert_eq!(rules[2].subject, Subject::Attribute("video".to_string()));
        assert_eq!(rules[2].role_importance, 0);
        assert!(rules.iter().all(|r| r.effect == Effect::Grant && r.priority == CAPABILITY_PRIORITY));
    }

    #[test]
    fn test_unmapped_capability_yields_nothing() {
        let mut config = config();
        config.capability_devices.clear();
        assert!(build(&config).is_empty());
    }
}
