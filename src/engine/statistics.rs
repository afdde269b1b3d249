//! Statistics collection and reporting
//!
//! Counts gathered while the pipeline runs, reported once at the end of a
//! generation run.

use crate::optimization::GeneralizationReport;
use crate::policy::PolicyRecord;
use crate::types::{DistributionStrategy, Effect, GroupingKey};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Statistics of one generation run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationStatistics {
    /// Seed the random source was initialized with
    pub seed: u64,
    /// Configured rule cap
    pub max_policies: usize,

    // Candidate counts
    /// Candidates expanded from base policies
    pub template_candidates: usize,
    /// Candidates built from role restrictions
    pub restriction_candidates: usize,
    /// Candidates granted by capability attributes
    pub capability_candidates: usize,
    /// Unique rules after the first deduplication
    pub unique_rules: usize,

    // Generalization
    /// Whether the generalizer had to run
    pub generalization_applied: bool,
    /// Grouping key in effect
    pub grouping_key: GroupingKey,
    /// Distribution strategy in effect
    pub distribution_strategy: DistributionStrategy,
    /// Number of groups the rules were split into
    pub groups: usize,
    /// Rules folded into wider rules
    pub merged_rules: usize,
    /// Rules dropped because their group got no slots
    pub dropped_unallocated: usize,
    /// Rules dropped because widening could not fit their group
    pub dropped_overflow: usize,

    // Final set
    /// Rules in the final policy set
    pub final_rules: usize,
    /// Final rules with a grant effect
    pub grant_rules: usize,
    /// Final rules with a deny effect
    pub deny_rules: usize,
    /// Final rules with a filter effect
    pub filter_rules: usize,
    /// Users retained in the output
    pub retained_users: usize,
    /// Attribute rows retained in the output
    pub retained_attributes: usize,

    /// Wall-clock time of the run
    pub generation_duration: Duration,
}

impl GenerationStatistics {
    /// Create statistics for a run
    pub fn new(seed: u64, max_policies: usize) -> Self {
        Self { seed, max_policies, ..Self::default() }
    }

    /// Candidates produced by all builders
    pub fn total_candidates(&self) -> usize {
        self.template_candidates + self.restriction_candidates + self.capability_candidates
    }

    /// Candidates removed as exact duplicates
    pub fn duplicates_removed(&self) -> usize {
        self.total_candidates().saturating_sub(self.unique_rules)
    }

    /// Record the outcome of generalization
    pub fn record_generalization(&mut self, report: &GeneralizationReport) {
        self.generalization_applied = report.applied;
        self.groups = report.groups;
        self.merged_rules = report.merged_rules;
        self.dropped_unallocated = report.dropped_unallocated;
        self.dropped_overflow = report.dropped_overflow;
    }

    /// Record the final rules
    pub fn record_final_rules(&mut self, rules: &[PolicyRecord]) {
        self.final_rules = rules.len();
        self.grant_rules = rules.iter().filter(|r| r.effect == Effect::Grant).count();
        self.deny_rules = rules.iter().filter(|r| r.effect == Effect::Deny).count();
        self.filter_rules = rules.iter().filter(|r| r.effect == Effect::Filter).count();
    }

    /// Rules with the given effect
    pub fn effect_count(&self, effect: Effect) -> usize {
        match effect {
            Effect::Grant => self.grant_rules,
            Effect::Deny => self.deny_rules,
            Effect::Filter => self.filter_rules,
        }
    }

    /// Percentage of final rules with the given effect
    pub fn effect_percentage(&self, effect: Effect) -> f64 {
        percentage(self.effect_count(effect), self.final_rules)
    }

    /// Percentage of candidates that did not make it into the output
    pub fn reduction_percentage(&self) -> f64 {
        let total = self.total_candidates();
        percentage(total.saturating_sub(self.final_rules), total)
    }

    /// Generate a multi-line report
    pub fn generate_summary_report(&self) -> String {
        let mut report = String::new();

        report.push_str("=== Policy Generation Summary ===\n\n");
        report.push_str(&format!(
            "Generation Duration: {:.3} seconds\n",
            self.generation_duration.as_secs_f64()
        ));
        report.push_str(&format!("Seed: {}\n\n", self.seed));

        report.push_str("Candidates:\n");
        report.push_str(&format!("  - From templates: {}\n", self.template_candidates));
        report.push_str(&format!("  - From role restrictions: {}\n", self.restriction_candidates));
        report.push_str(&format!("  - From capabilities: {}\n", self.capability_candidates));
        report.push_str(&format!(
            "  - Unique after deduplication: {} ({} duplicates removed)\n\n",
            self.unique_rules,
            self.duplicates_removed()
        ));

        if self.generalization_applied {
            report.push_str(&format!(
                "Generalization ({} / {}, cap {}):\n",
                self.grouping_key, self.distribution_strategy, self.max_policies
            ));
            report.push_str(&format!("  - Groups: {}\n", self.groups));
            report.push_str(&format!("  - Rules merged: {}\n", self.merged_rules));
            report.push_str(&format!("  - Dropped (no slots): {}\n", self.dropped_unallocated));
            report.push_str(&format!("  - Dropped (overflow): {}\n\n", self.dropped_overflow));
        } else {
            report.push_str(&format!(
                "Generalization: not needed (cap {})\n\n",
                self.max_policies
            ));
        }

        report.push_str("Final Policy Set:\n");
        report.push_str(&format!(
            "  - Rules: {} ({:.1}% reduction)\n",
            self.final_rules,
            self.reduction_percentage()
        ));
        for effect in Effect::ALL {
            report.push_str(&format!(
                "  - {}: {} ({:.1}%)\n",
                effect,
                self.effect_count(effect),
                self.effect_percentage(effect)
            ));
        }
        report.push_str(&format!(
            "  - Users: {} ({} attribute rows)\n",
            self.retained_users, self.retained_attributes
        ));

        report
    }

    /// Generate a compact one-line summary suitable for logging
    pub fn generate_compact_summary(&self) -> String {
        format!(
            "Generated {} rules from {} candidates ({} unique, {} merged, {} dropped) for {} users",
            self.final_rules,
            self.total_candidates(),
            self.unique_rules,
            self.merged_rules,
            self.dropped_unallocated + self.dropped_overflow,
            self.retained_users
        )
    }
}

fn percentage(part: usize, whole: usize) -> f64 {
    if whole > 0 {
        (part as f64 / whole as f64) * 100.0
    } else {
        0.0
    }
}

impl fmt::Display for GenerationStatistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.generate_summary_report())
    }
}
