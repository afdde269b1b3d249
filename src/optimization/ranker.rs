//! Priority ranking
//!
//! Orders rules by priority (descending), then role importance (descending),
//! then restricted rules before unrestricted ones, then by identifier.

use crate::policy::{PolicyRecord, RuleCandidate};
use std::cmp::Ordering;

/// Ranking order of two rules; `Less` means `a` is evaluated first
pub fn compare_rules(a: &RuleCandidate, b: &RuleCandidate) -> Ordering {
    b.priority
        .cmp(&a.priority)
        .then_with(|| b.role_importance.cmp(&a.role_importance))
        .then_with(|| b.restricted.cmp(&a.restricted))
        .then_with(|| a.id.cmp(&b.id))
}

/// Sort rules into evaluation order and freeze them
pub fn rank(mut rules: Vec<RuleCandidate>) -> Vec<PolicyRecord> {
    rules.sort_by(compare_rules);
    rules.into_iter().map(PolicyRecord::from).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::rule::test_support::spatial_rule;
    use crate::types::{Effect, RuleId};

    #[test]
    fn test_rank_order() {
        let mut low = spatial_rule(1, "B1", "f1", "r1", Effect::Grant, 1);
        let high = spatial_rule(2, "B1", "f1", "r2", Effect::Grant, 9);
        let mut important = spatial_rule(3, "B1", "f1", "r3", Effect::Grant, 1);
        important.role_importance = 5;
        let mut restricted = spatial_rule(4, "B1", "f2", "r1", Effect::Deny, 1);
        restricted.restricted = true;
        low.id = RuleId(10);

        let ranked = rank(vec![low, high, important, restricted]);
        let ids: Vec<u64> = ranked.iter().map(|r| r.id.value()).collect();
        assert_eq!(ids, vec![2, 3, 4, 10]);
    }

    #[test]
    fn test_ties_break_on_id() {
        let a = spatial_rule(7, "B1", "f1", "r1", Effect::Grant, 1);
        let b = spatial_rule(3, "B1", "f1", "r2", Effect::Grant, 1);
        let ranked = rank(vec![a, b]);
        assert_eq!(ranked[0].id, RuleId(3));
    }
}
