//! Generation pipeline orchestrator
//!
//! Runs the stages in order: template instantiation, role restrictions,
//! capability grants, deduplication, generalization under the cap, a second
//! deduplication, and ranking. The final set carries the ranked rules plus the
//! users those rules can apply to.

use crate::catalog::{DimensionCatalog, User, UserAttribute, UserDirectory};
use crate::engine::error::GenerationResult;
use crate::engine::statistics::GenerationStatistics;
use crate::generation::{
    CapabilityRuleBuilder, GenerationContext, RestrictionRuleBuilder, TemplateInstantiator,
};
use crate::optimization::{deduplicate, rank, Generalizer};
use crate::policy::{PolicyRecord, Subject};
use crate::types::PolicyConfig;
use crate::{perf_span, policy_event};
use serde::Serialize;
use std::time::Instant;
use tracing::{info, instrument};

/// Final output of a generation run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PolicySet {
    /// Ranked rules
    pub rules: Vec<PolicyRecord>,
    /// Users any rule can apply to, in configured order
    pub users: Vec<User>,
    /// All attribute rows of the retained users
    pub attributes: Vec<UserAttribute>,
}

/// Policy set together with the statistics of the run that produced it
#[derive(Debug, Clone)]
pub struct GenerationOutcome {
    /// Generated policy set
    pub policy_set: PolicySet,
    /// Run statistics
    pub statistics: GenerationStatistics,
}

/// Coordinates the generation pipeline
#[derive(Debug)]
pub struct PolicyOrchestrator {
    config: PolicyConfig,
    catalog: DimensionCatalog,
    directory: UserDirectory,
}

impl PolicyOrchestrator {
    /// Validate the configuration and prepare the catalog and user directory
    #[instrument(skip(config), fields(max_policies = config.max_policies, templates = config.base_policies.len()))]
    pub fn new(config: PolicyConfig) -> GenerationResult<Self> {
        config.validate()?;

        let catalog = DimensionCatalog::from_expansions(&config.expansions);
        let directory = UserDirectory::new(config.users.clone(), config.user_attributes.clone());

        info!(
            dimension_values = catalog.total_values(),
            users = directory.users().len(),
            roles = config.roles.len(),
            "Policy orchestrator initialized"
        );

        Ok(Self { config, catalog, directory })
    }

    /// Configuration in use
    pub fn config(&self) -> &PolicyConfig {
        &self.config
    }

    /// Dimension catalog in use
    pub fn catalog(&self) -> &DimensionCatalog {
        &self.catalog
    }

    /// Run the full pipeline
    ///
    /// Each call starts from a fresh [`GenerationContext`], so repeated calls
    /// with a configured seed return identical results.
    pub fn generate(&self) -> GenerationResult<GenerationOutcome> {
        let started = Instant::now();
        let mut ctx = GenerationContext::new(self.config.seed);
        let mut statistics = GenerationStatistics::new(ctx.seed(), self.config.max_policies);
        statistics.grouping_key = self.config.generalization.grouping_key;
        statistics.distribution_strategy = self.config.generalization.distribution_strategy;

        let candidates = {
            let _span = perf_span!("expand_candidates", seed = ctx.seed()).entered();

            let instantiator =
                TemplateInstantiator::new(&self.catalog, self.config.action_probabilities.as_ref());
            let mut candidates = instantiator.instantiate_all(&self.config.base_policies, &mut ctx)?;
            statistics.template_candidates = candidates.len();

            let restrictions = RestrictionRuleBuilder::new(&self.catalog, &self.config).build(&mut ctx)?;
            statistics.restriction_candidates = restrictions.len();
            candidates.extend(restrictions);

            let capabilities =
                CapabilityRuleBuilder::new(&self.catalog, &self.directory, &self.config).build(&mut ctx)?;
            statistics.capability_candidates = capabilities.len();
            candidates.extend(capabilities);

            policy_event!(
                info,
                "expand",
                "Expanded rule candidates",
                templates = statistics.template_candidates,
                restrictions = statistics.restriction_candidates,
                capabilities = statistics.capability_candidates,
                rule_ids = ctx.issued_rule_ids(),
            );
            candidates
        };

        let unique = {
            let _span = perf_span!("deduplicate", candidates = candidates.len()).entered();
            deduplicate(candidates)
        };
        statistics.unique_rules = unique.len();

        let generalized = {
            let _span = perf_span!("generalize", rules = unique.len()).entered();
            let generalizer = Generalizer::new(self.config.max_policies, self.config.generalization);
            let (generalized, report) = generalizer.generalize(unique);
            statistics.record_generalization(&report);
            // Merged rules can coincide with rules that were already wide
            deduplicate(generalized)
        };

        let rules = {
            let _span = perf_span!("rank", rules = generalized.len()).entered();
            rank(generalized)
        };
        statistics.record_final_rules(&rules);

        let (users, attributes) = self.retain_users(&rules);
        statistics.retained_users = users.len();
        statistics.retained_attributes = attributes.len();
        statistics.generation_duration = started.elapsed();

        policy_event!(
            info,
            "finalize",
            "Policy set ready",
            rules = rules.len(),
            users = users.len(),
            seed = statistics.seed,
        );

        Ok(GenerationOutcome { policy_set: PolicySet { rules, users, attributes }, statistics })
    }

    /// Users some final rule can apply to, and all of their attribute rows
    fn retain_users(&self, rules: &[PolicyRecord]) -> (Vec<User>, Vec<UserAttribute>) {
        let users: Vec<User> = self
            .directory
            .users()
            .iter()
            .filter(|user| rules.iter().any(|rule| self.applies_to(&rule.subject, user)))
            .cloned()
            .collect();

        let attributes = self
            .directory
            .attributes()
            .iter()
            .filter(|attr| users.iter().any(|user| user.userid == attr.userid))
            .cloned()
            .collect();

        (users, attributes)
    }

    fn applies_to(&self, subject: &Subject, user: &User) -> bool {
        match subject {
            Subject::Any | Subject::Expression(_) => true,
            Subject::User(name) => *name == user.username,
            Subject::Role(role) => self.directory.has_role(user.userid, role),
            Subject::Attribute(attribute) => self.directory.has_capability(user.userid, attribute),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ConfigValidationError, Effect};
    use crate::engine::error::GenerationError;

    #[test]
    fn test_default_configuration_generates() {
        let config = PolicyConfig { seed: Some(42), ..PolicyConfig::default() };
        let orchestrator = PolicyOrchestrator::new(config).unwrap();
        let outcome = orchestrator.generate().unwrap();

        assert!(!outcome.policy_set.rules.is_empty());
        assert!(outcome.policy_set.rules.len() <= 1000);
        assert_eq!(outcome.statistics.seed, 42);
        assert_eq!(outcome.statistics.final_rules, outcome.policy_set.rules.len());
        // The base policies have empty subjects, so every user is retained
        assert_eq!(outcome.policy_set.users.len(), 3);
    }

    #[test]
    fn test_invalid_configuration_is_rejected() {
        let config = PolicyConfig { max_policies: 0, ..PolicyConfig::default() };
        assert!(matches!(
            PolicyOrchestrator::new(config),
            Err(GenerationError::ConfigurationInvalid(ConfigValidationError::InvalidMaxPolicies(0)))
        ));
    }

    #[test]
    fn test_repeated_runs_are_identical() {
        let config = PolicyConfig { seed: Some(5), max_policies: 20, ..PolicyConfig::default() };
        let orchestrator = PolicyOrchestrator::new(config).unwrap();
        let first = orchestrator.generate().unwrap();
        let second = orchestrator.generate().unwrap();
        assert_eq!(first.policy_set, second.policy_set);
        assert!(first.policy_set.rules.len() <= 20);
    }

    #[test]
    fn test_restricted_users_only() {
        let mut config = PolicyConfig { seed: Some(1), ..PolicyConfig::default() };
        config.base_policies.clear();
        config.capability_devices.clear();
        let outcome = PolicyOrchestrator::new(config).unwrap().generate().unwrap();

        // Only the intern restrictions remain, and only alice is an intern
        assert!(outcome.policy_set.rules.iter().all(|r| r.effect == Effect::Deny));
        let names: Vec<&str> = outcome.policy_set.users.iter().map(|u| u.username.as_str()).collect();
        assert_eq!(names, vec!["alice"]);
        assert!(outcome.policy_set.attributes.iter().all(|a| a.userid == crate::types::UserId(1)));
        assert_eq!(outcome.policy_set.attributes.len(), 2);
    }
}
