//! Exact-duplicate removal
//!
//! Two rules are duplicates when subject, action, resource and effect all
//! match. The survivor is the one with the highest priority (the earliest on
//! a tie) and it takes the position of the first occurrence.

use crate::policy::{RuleCandidate, RuleIdentity};
use std::collections::HashMap;
use tracing::debug;

/// Remove exact duplicates, keeping first-occurrence order
pub fn deduplicate(candidates: Vec<RuleCandidate>) -> Vec<RuleCandidate> {
    let total = candidates.len();
    let mut positions: HashMap<RuleIdentity, usize> = HashMap::with_capacity(total);
    let mut unique: Vec<RuleCandidate> = Vec::with_capacity(total);

    for candidate in candidates {
        match positions.get(&candidate.identity()) {
            Some(&position) => {
                if candidate.priority > unique[position].priority {
                    unique[position] = candidate;
                }
            }
            None => {
                positions.insert(candidate.identity(), unique.len());
                unique.push(candidate);
            }
        }
    }

    debug!(candidates = total, unique = unique.len(), "Deduplicated rules");
    unique
}
