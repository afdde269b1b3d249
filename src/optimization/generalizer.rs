//! Generalization under a rule cap
//!
//! When more unique rules exist than `max_policies`, rules are partitioned
//! into groups, each group is given a share of the slots, and groups that
//! exceed their share are shrunk by merging rules that coincide once some
//! spatial placeholders are treated as the `+` wildcard. Passes go from the
//! room alone up to all three levels; a merged rule wildcards only the levels
//! its members disagree on. A merge is skipped when it would let a rule
//! overtake another rule of its group that used to outrank it. A group that
//! still does not fit loses its lowest ranked rules.

use crate::optimization::ranker::compare_rules;
use crate::policy::{MergeKey, RuleCandidate};
use crate::types::{DimensionKind, DistributionStrategy, GeneralizationConfig, GroupingKey, RuleId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info, instrument, warn};

/// Group key used for rules without hints or without a device binding
pub const NO_KEY: &str = "none";

/// Group key of the single static group
pub const STATIC_KEY: &str = "all";

/// Slots given to one group
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupAllocation {
    /// Group key
    pub key: String,
    /// Rules in the group before generalization
    pub size: usize,
    /// Slots allocated
    pub slots: usize,
    /// Rules kept after merging and dropping
    pub kept: usize,
}

/// Outcome of a generalization pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneralizationReport {
    /// Whether the rule count exceeded the cap
    pub applied: bool,
    /// Number of groups
    pub groups: usize,
    /// Rules folded into wider rules
    pub merged_rules: usize,
    /// Rules dropped because their group got no slots
    pub dropped_unallocated: usize,
    /// Rules dropped because widening could not fit their group
    pub dropped_overflow: usize,
    /// Per-group allocation, in group order
    pub allocations: Vec<GroupAllocation>,
    /// Folded rule id to the id of the kept rule covering it
    pub absorbed: BTreeMap<RuleId, RuleId>,
}

/// Rules sharing a group key, in first-appearance order
#[derive(Debug, Clone)]
pub struct RuleGroup {
    /// Group key
    pub key: String,
    /// Member rules
    pub rules: Vec<RuleCandidate>,
}

impl RuleGroup {
    /// Highest priority of any member
    pub fn max_priority(&self) -> u32 {
        self.rules.iter().map(|r| r.priority).max().unwrap_or(0)
    }
}

/// Reduces a rule list to at most `max_policies` rules
#[derive(Debug, Clone)]
pub struct Generalizer {
    max_policies: usize,
    grouping_key: GroupingKey,
    strategy: DistributionStrategy,
}

impl Generalizer {
    /// Create a generalizer
    pub fn new(max_policies: usize, config: GeneralizationConfig) -> Self {
        Self {
            max_policies,
            grouping_key: config.grouping_key,
            strategy: config.distribution_strategy,
        }
    }

    /// Fit the rules under the cap; rules already under it are returned unchanged
    #[instrument(skip_all, fields(rules = rules.len(), max_policies = self.max_policies))]
    pub fn generalize(&self, rules: Vec<RuleCandidate>) -> (Vec<RuleCandidate>, GeneralizationReport) {
        if rules.len() <= self.max_policies {
            return (rules, GeneralizationReport::default());
        }

        let groups = self.partition(rules);
        let sizes: Vec<usize> = groups.iter().map(|g| g.rules.len()).collect();
        let allocation = self.allocate(&groups);

        let mut report = GeneralizationReport { applied: true, groups: groups.len(), ..Default::default() };
        let mut output = Vec::with_capacity(self.max_policies);

        for ((group, slots), size) in groups.into_iter().zip(allocation).zip(sizes) {
            let key = group.key.clone();
            let fitted = fit_group(group.rules, slots);

            if slots == 0 {
                report.dropped_unallocated += size;
            }
            if fitted.dropped > 0 {
                warn!(
                    group = %key,
                    slots,
                    dropped = fitted.dropped,
                    "Widening could not fit group, dropping lowest ranked rules"
                );
            }
            report.merged_rules += fitted.merged;
            report.dropped_overflow += fitted.dropped;
            report.absorbed.extend(fitted.absorbed);
            report.allocations.push(GroupAllocation { key, size, slots, kept: fitted.rules.len() });
            output.extend(fitted.rules);
        }

        info!(
            groups = report.groups,
            merged = report.merged_rules,
            dropped = report.dropped_unallocated + report.dropped_overflow,
            remaining = output.len(),
            "Generalized rule set"
        );
        (output, report)
    }

    /// Key of the group a rule belongs to
    pub fn group_key(&self, rule: &RuleCandidate) -> String {
        match self.grouping_key {
            GroupingKey::Static => STATIC_KEY.to_string(),
            GroupingKey::Hints if rule.hints.is_empty() => NO_KEY.to_string(),
            GroupingKey::Hints => rule.hints.to_string(),
            GroupingKey::Device => rule.device().unwrap_or(NO_KEY).to_string(),
        }
    }

    /// Partition rules into groups in order of first appearance
    pub fn partition(&self, rules: Vec<RuleCandidate>) -> Vec<RuleGroup> {
        let mut groups: Vec<RuleGroup> = Vec::new();
        let mut index: HashMap<String, usize> = HashMap::new();
        for rule in rules {
            let key = self.group_key(&rule);
            let position = match index.get(&key) {
                Some(&position) => position,
                None => {
                    index.insert(key.clone(), groups.len());
                    groups.push(RuleGroup { key, rules: Vec::new() });
                    groups.len() - 1
                }
            };
            groups[position].rules.push(rule);
        }
        groups
    }

    /// Slots per group under the configured strategy; never more than a group's size
    pub fn allocate(&self, groups: &[RuleGroup]) -> Vec<usize> {
        let sizes: Vec<usize> = groups.iter().map(|g| g.rules.len()).collect();
        let allocation = match self.strategy {
            DistributionStrategy::RoundRobin => allocate_round_robin(&sizes, self.max_policies),
            DistributionStrategy::Proportional => allocate_proportional(&sizes, self.max_policies),
            DistributionStrategy::PriorityBuckets => allocate_priority_buckets(groups, self.max_policies),
        };
        for (group, slots) in groups.iter().zip(&allocation) {
            debug!(group = %group.key, size = group.rules.len(), slots, strategy = %self.strategy, "Allocated slots");
        }
        allocation
    }
}

/// One slot per group per round, skipping groups that are already full
fn allocate_round_robin(sizes: &[usize], budget: usize) -> Vec<usize> {
    let mut allocation = vec![0; sizes.len()];
    let mut remaining = budget;
    while remaining > 0 {
        let mut progressed = false;
        for (slots, size) in allocation.iter_mut().zip(sizes) {
            if remaining == 0 {
                break;
            }
            if *slots < *size {
                *slots += 1;
                remaining -= 1;
                progressed = true;
            }
        }
        if !progressed {
            break;
        }
    }
    allocation
}

/// Floor of the proportional share, remaining slots to the largest remainders
fn allocate_proportional(sizes: &[usize], budget: usize) -> Vec<usize> {
    let total: usize = sizes.iter().sum();
    if total <= budget {
        return sizes.to_vec();
    }

    let (total, budget128) = (total as u128, budget as u128);
    let mut allocation: Vec<usize> = Vec::with_capacity(sizes.len());
    let mut remainders: Vec<(u128, usize)> = Vec::with_capacity(sizes.len());
    for (index, size) in sizes.iter().enumerate() {
        let share = *size as u128 * budget128;
        allocation.push((share / total) as usize);
        remainders.push((share % total, index));
    }

    let mut leftover = budget - allocation.iter().sum::<usize>();
    remainders.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));
    for (_, index) in remainders {
        if leftover == 0 {
            break;
        }
        if allocation[index] < sizes[index] {
            allocation[index] += 1;
            leftover -= 1;
        }
    }
    allocation
}

/// Groups by highest priority (key order on ties) take what they need
fn allocate_priority_buckets(groups: &[RuleGroup], budget: usize) -> Vec<usize> {
    let mut order: Vec<usize> = (0..groups.len()).collect();
    order.sort_by(|&a, &b| {
        groups[b]
            .max_priority()
            .cmp(&groups[a].max_priority())
            .then_with(|| groups[a].key.cmp(&groups[b].key))
    });

    let mut allocation = vec![0; groups.len()];
    let mut remaining = budget;
    for index in order {
        let slots = groups[index].rules.len().min(remaining);
        allocation[index] = slots;
        remaining -= slots;
    }
    allocation
}

/// Cluster keys of the widening passes, narrowest first
const WIDENING_PASSES: [&[DimensionKind]; 7] = [
    &[DimensionKind::Room],
    &[DimensionKind::Floor],
    &[DimensionKind::Room, DimensionKind::Floor],
    &[DimensionKind::Building],
    &[DimensionKind::Room, DimensionKind::Building],
    &[DimensionKind::Floor, DimensionKind::Building],
    &[DimensionKind::Room, DimensionKind::Floor, DimensionKind::Building],
];

struct FittedGroup {
    rules: Vec<RuleCandidate>,
    absorbed: BTreeMap<RuleId, RuleId>,
    merged: usize,
    dropped: usize,
}

/// A rule being fitted together with the input rules folded into it
#[derive(Debug)]
struct Unit {
    rule: RuleCandidate,
    lowest: u32,
    originals: Vec<RuleId>,
}

impl Unit {
    fn new(rule: RuleCandidate) -> Self {
        Self { lowest: rule.priority, originals: vec![rule.id], rule }
    }

    /// Lowest and highest priority of the folded rules
    fn span(&self) -> (u32, u32) {
        (self.lowest, self.rule.priority)
    }
}

/// Whether two units would swap the order of some pair of their folded rules
///
/// Every rule folded into a unit ranks at the unit's highest priority. The
/// order flips when the unit with the lower maximum holds a rule above the
/// lowest rule of the other unit.
fn interleaved(a: (u32, u32), b: (u32, u32)) -> bool {
    let (low, high) = if a.1 <= b.1 { (a, b) } else { (b, a) };
    low.1 < high.1 && low.1 > high.0
}

/// Shrink one group to its slot count
fn fit_group(rules: Vec<RuleCandidate>, slots: usize) -> FittedGroup {
    if slots == 0 {
        return FittedGroup { rules: Vec::new(), absorbed: BTreeMap::new(), merged: 0, dropped: 0 };
    }

    let mut units: Vec<Unit> = rules.into_iter().map(Unit::new).collect();
    let mut merged = 0;
    for levels in WIDENING_PASSES {
        if units.len() <= slots {
            break;
        }
        let (widened, count) = merge_level(units, levels, slots);
        debug!(levels = ?levels, merged = count, remaining = widened.len(), slots, "Widened group");
        units = widened;
        merged += count;
    }

    let mut dropped = 0;
    if units.len() > slots {
        units.sort_by(|a, b| compare_rules(&a.rule, &b.rule));
        dropped = units.len() - slots;
        units.truncate(slots);
    }

    let mut absorbed = BTreeMap::new();
    let rules = units
        .into_iter()
        .map(|unit| {
            for original in unit.originals {
                if original != unit.rule.id {
                    absorbed.insert(original, unit.rule.id);
                }
            }
            unit.rule
        })
        .collect();
    FittedGroup { rules, absorbed, merged, dropped }
}

/// Rule with every listed level replaced by the wildcard, if any was concrete
fn widen_through(rule: &RuleCandidate, levels: &[DimensionKind]) -> Option<RuleCandidate> {
    let mut current: Option<RuleCandidate> = None;
    for kind in levels {
        let base = current.as_ref().unwrap_or(rule);
        if let Some(next) = base.widened(*kind) {
            current = Some(next);
        }
    }
    current
}

/// Merge clusters of units that coincide once the levels are wildcarded,
/// largest clusters first, until the count fits `slots` or no cluster is left
fn merge_level(units: Vec<Unit>, levels: &[DimensionKind], slots: usize) -> (Vec<Unit>, usize) {
    let excess = units.len().saturating_sub(slots);
    if excess == 0 {
        return (units, 0);
    }

    let mut clusters: Vec<Vec<usize>> = Vec::new();
    let mut cluster_of: Vec<usize> = Vec::with_capacity(units.len());
    let mut index: HashMap<MergeKey, usize> = HashMap::new();
    for unit in &units {
        let key = widen_through(&unit.rule, levels).as_ref().unwrap_or(&unit.rule).merge_key();
        let cluster = match index.get(&key) {
            Some(&cluster) => cluster,
            None => {
                index.insert(key, clusters.len());
                clusters.push(Vec::new());
                clusters.len() - 1
            }
        };
        clusters[cluster].push(cluster_of.len());
        cluster_of.push(cluster);
    }

    let spans: Vec<(u32, u32)> = clusters
        .iter()
        .map(|members| {
            members.iter().map(|&p| units[p].span()).fold((u32::MAX, 0), |(lo, hi), (l, h)| {
                (lo.min(l), hi.max(h))
            })
        })
        .collect();

    let mut candidates: Vec<usize> = (0..clusters.len()).filter(|&c| clusters[c].len() > 1).collect();
    candidates.sort_by(|&a, &b| {
        clusters[b].len().cmp(&clusters[a].len()).then(clusters[a][0].cmp(&clusters[b][0]))
    });

    let mut selected = vec![false; clusters.len()];
    let mut remaining = excess;
    let mut merged = 0;
    for cluster in candidates {
        if remaining == 0 {
            break;
        }
        let span = spans[cluster];
        let blocked = (0..clusters.len()).filter(|&other| other != cluster).any(|other| {
            if selected[other] {
                interleaved(span, spans[other])
            } else {
                clusters[other].iter().any(|&p| interleaved(span, units[p].span()))
            }
        });
        if blocked {
            debug!(
                members = clusters[cluster].len(),
                low = span.0,
                high = span.1,
                "Merge would reorder rules, skipping"
            );
            continue;
        }
        selected[cluster] = true;
        let saved = clusters[cluster].len() - 1;
        merged += saved;
        remaining = remaining.saturating_sub(saved);
    }

    let mut pending: Vec<Option<Unit>> = units.into_iter().map(Some).collect();
    let mut output = Vec::with_capacity(pending.len() - merged);
    for position in 0..pending.len() {
        let cluster = cluster_of[position];
        if !selected[cluster] {
            output.extend(pending[position].take());
            continue;
        }
        let members = &clusters[cluster];
        if members[0] != position {
            continue;
        }
        let mut folded = members.iter().filter_map(|&member| pending[member].take());
        let Some(first) = folded.next() else {
            continue;
        };
        let rest: Vec<Unit> = folded.collect();
        output.push(merge_units(first, rest, levels));
    }

    (output, merged)
}

/// Fold units into the first, wildcarding only the levels where they disagree
fn merge_units(first: Unit, rest: Vec<Unit>, levels: &[DimensionKind]) -> Unit {
    let Unit { mut rule, mut lowest, mut originals } = first;
    for kind in levels {
        let disagree = rest.iter().any(|unit| unit.rule.bindings.get(*kind) != rule.bindings.get(*kind));
        if disagree {
            if let Some(wider) = rule.widened(*kind) {
                rule = wider;
            }
        }
    }
    for unit in rest {
        rule.absorb(&unit.rule);
        lowest = lowest.min(unit.lowest);
        originals.extend(unit.originals);
    }
    Unit { rule, lowest, originals }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::rule::test_support::spatial_rule;
    use crate::types::{Effect, Hint, HintSet, RuleId};

    fn generalizer(max: usize, grouping_key: GroupingKey, strategy: DistributionStrategy) -> Generalizer {
        Generalizer::new(max, GeneralizationConfig { grouping_key, distribution_strategy: strategy })
    }

    fn with_hints(mut rule: RuleCandidate, hint: Hint) -> RuleCandidate {
        rule.hints = HintSet::single(hint);
        rule
    }

    #[test]
    fn test_under_cap_is_untouched() {
        let rules = vec![spatial_rule(1, "B1", "f1", "r1", Effect::Grant, 1)];
        let (out, report) = generalizer(5, GroupingKey::Static, DistributionStrategy::RoundRobin).generalize(rules);
        assert_eq!(out.len(), 1);
        assert!(!report.applied);
    }

    #[test]
    fn test_room_widening_merges_rooms() {
        let rules = vec![
            spatial_rule(1, "B1", "f1", "r1", Effect::Grant, 1),
            spatial_rule(2, "B1", "f1", "r2", Effect::Grant, 4),
            spatial_rule(3, "B1", "f2", "r1", Effect::Grant, 1),
        ];
        let (out, report) = generalizer(2, GroupingKey::Static, DistributionStrategy::RoundRobin).generalize(rules);

        assert_eq!(out.len(), 2);
        assert_eq!(out[0].resource.topic, "B1/f1/+/#");
        assert_eq!(out[0].id, RuleId(1));
        assert_eq!(out[0].priority, 4);
        assert_eq!(out[0].subsumed, 2);
        assert_eq!(out[1].resource.topic, "B1/f2/r1/#");
        assert_eq!(report.merged_rules, 1);
        assert_eq!(report.dropped_overflow, 0);
        assert_eq!(report.absorbed, BTreeMap::from([(RuleId(2), RuleId(1))]));
    }

    #[test]
    fn test_floor_merge_keeps_shared_room() {
        let rules = vec![
            spatial_rule(1, "B1", "f1", "r1", Effect::Grant, 1),
            spatial_rule(2, "B1", "f2", "r1", Effect::Grant, 1),
            spatial_rule(3, "B2", "f1", "r9", Effect::Grant, 1),
        ];
        let (out, report) = generalizer(2, GroupingKey::Static, DistributionStrategy::RoundRobin).generalize(rules);

        let topics: Vec<&str> = out.iter().map(|r| r.resource.topic.as_str()).collect();
        assert_eq!(topics, vec!["B1/+/r1/#", "B2/f1/r9/#"]);
        assert_eq!(out[0].subsumed, 2);
        assert_eq!(out[1].subsumed, 1);
        assert_eq!(report.merged_rules, 1);
    }

    #[test]
    fn test_merge_that_would_reorder_is_skipped() {
        // Merging the rooms of f1 would lift rule 1 above rule 3
        let rules = vec![
            spatial_rule(1, "B1", "f1", "r1", Effect::Grant, 1),
            spatial_rule(2, "B1", "f1", "r2", Effect::Grant, 9),
            spatial_rule(3, "B1", "f2", "r1", Effect::Grant, 5),
        ];
        let (out, report) = generalizer(2, GroupingKey::Static, DistributionStrategy::RoundRobin).generalize(rules);

        assert_eq!(out.len(), 2);
        assert_eq!(out[0].resource.topic, "B1/+/r1/#");
        assert_eq!(out[0].priority, 5);
        assert_eq!(out[1].resource.topic, "B1/f1/r2/#");
        assert_eq!(out[1].priority, 9);
        assert_eq!(report.absorbed, BTreeMap::from([(RuleId(3), RuleId(1))]));
        assert_eq!(report.dropped_overflow, 0);
    }

    #[test]
    fn test_interleaved_spans() {
        assert!(interleaved((1, 9), (5, 5)));
        assert!(interleaved((5, 5), (1, 9)));
        assert!(!interleaved((1, 5), (9, 9)));
        assert!(!interleaved((1, 9), (9, 9)));
        assert!(!interleaved((1, 9), (1, 1)));
        assert!(interleaved((3, 7), (4, 8)));
    }

    #[test]
    fn test_merge_resolves_effect_conflict_to_deny() {
        let rules = vec![
            spatial_rule(1, "B1", "f1", "r1", Effect::Grant, 1),
            spatial_rule(2, "B1", "f1", "r2", Effect::Deny, 1),
            spatial_rule(3, "B1", "f1", "r3", Effect::Filter, 1),
        ];
        let (out, _) = generalizer(1, GroupingKey::Static, DistributionStrategy::RoundRobin).generalize(rules);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].effect, Effect::Deny);
        assert_eq!(out[0].subsumed, 3);
    }

    #[test]
    fn test_widening_escalates_to_building() {
        let rules = vec![
            spatial_rule(1, "B1", "f1", "r1", Effect::Grant, 1),
            spatial_rule(2, "B1", "f2", "r2", Effect::Grant, 1),
            spatial_rule(3, "B2", "f1", "r1", Effect::Grant, 1),
        ];
        let (out, report) = generalizer(1, GroupingKey::Static, DistributionStrategy::RoundRobin).generalize(rules);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].resource.topic, "+/+/+/#");
        assert_eq!(report.merged_rules, 2);
    }

    #[test]
    fn test_overflow_drops_lowest_ranked() {
        // Distinct subjects can never merge
        let mut a = spatial_rule(1, "B1", "f1", "r1", Effect::Grant, 1);
        let mut b = spatial_rule(2, "B1", "f1", "r1", Effect::Grant, 7);
        a.subject = crate::policy::Subject::Role("a".to_string());
        b.subject = crate::policy::Subject::Role("b".to_string());
        let (out, report) = generalizer(1, GroupingKey::Static, DistributionStrategy::RoundRobin).generalize(vec![a, b]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].id, RuleId(2));
        assert_eq!(report.dropped_overflow, 1);
    }

    #[test]
    fn test_partition_by_hints_keeps_first_appearance_order() {
        let rules = vec![
            with_hints(spatial_rule(1, "B1", "f1", "r1", Effect::Grant, 1), Hint::Ctx),
            spatial_rule(2, "B1", "f1", "r2", Effect::Grant, 1),
            with_hints(spatial_rule(3, "B1", "f1", "r3", Effect::Grant, 1), Hint::Ctx),
        ];
        let groups = generalizer(1, GroupingKey::Hints, DistributionStrategy::RoundRobin).partition(rules);
        let keys: Vec<&str> = groups.iter().map(|g| g.key.as_str()).collect();
        assert_eq!(keys, vec!["ctx", NO_KEY]);
        assert_eq!(groups[0].rules.len(), 2);
    }

    #[test]
    fn test_round_robin_allocation() {
        assert_eq!(allocate_round_robin(&[5, 1, 3], 6), vec![3, 1, 2]);
        assert_eq!(allocate_round_robin(&[1, 1], 5), vec![1, 1]);
        assert_eq!(allocate_round_robin(&[4, 4], 0), vec![0, 0]);
    }

    #[test]
    fn test_proportional_allocation() {
        // Shares 8*5/12 = 3.33 and 4*5/12 = 1.67; the larger remainder gets the extra slot
        assert_eq!(allocate_proportional(&[8, 4], 5), vec![3, 2]);
        // Equal remainders go to the earlier group
        assert_eq!(allocate_proportional(&[1, 1, 1], 2), vec![1, 1, 0]);
        assert_eq!(allocate_proportional(&[3, 2], 10), vec![3, 2]);
    }

    #[test]
    fn test_priority_buckets_allocation() {
        let g = generalizer(5, GroupingKey::Hints, DistributionStrategy::PriorityBuckets);
        let groups = vec![
            RuleGroup { key: "low".to_string(), rules: vec![spatial_rule(1, "B1", "f1", "r1", Effect::Grant, 1); 4] },
            RuleGroup { key: "high".to_string(), rules: vec![spatial_rule(2, "B1", "f1", "r1", Effect::Grant, 9); 3] },
            RuleGroup { key: "alpha".to_string(), rules: vec![spatial_rule(3, "B1", "f1", "r1", Effect::Grant, 1); 3] },
        ];
        // high takes 3, then alpha (key order on tie) takes 2, low gets nothing
        assert_eq!(g.allocate(&groups), vec![0, 3, 2]);
    }

    #[test]
    fn test_zero_allocation_drops_group() {
        let rules = vec![
            with_hints(spatial_rule(1, "B1", "f1", "r1", Effect::Grant, 9), Hint::Ctx),
            with_hints(spatial_rule(2, "B2", "f1", "r1", Effect::Grant, 1), Hint::Json),
        ];
        let (out, report) =
            generalizer(1, GroupingKey::Hints, DistributionStrategy::PriorityBuckets).generalize(rules);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].id, RuleId(1));
        assert_eq!(report.dropped_unallocated, 1);
        assert_eq!(report.allocations[1].slots, 0);
    }
}
