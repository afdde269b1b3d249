//! Per-run generation state
//!
//! Owns the seeded random source and the rule identifier counter. Every
//! builder draws from the same context, so a fixed seed and configuration
//! always yield the same rules with the same identifiers.

use crate::types::{Effect, EffectWeights, RuleId};
use rand::{rngs::StdRng, Rng, RngCore, SeedableRng};
use std::fmt;
use tracing::info;

/// Random source and identifier counter for one generation run
pub struct GenerationContext {
    rng: Box<dyn RngCore>,
    seed: u64,
    next_rule_id: u64,
}

impl fmt::Debug for GenerationContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GenerationContext")
            .field("seed", &self.seed)
            .field("next_rule_id", &self.next_rule_id)
            .finish()
    }
}

impl GenerationContext {
    /// Create a context; without a seed one is drawn from entropy and logged
    pub fn new(seed: Option<u64>) -> Self {
        let seed = match seed {
            Some(seed) => seed,
            None => {
                let drawn: u64 = rand::thread_rng().gen();
                info!(seed = drawn, "No seed configured, drew one from entropy");
                drawn
            }
        };
        Self::with_seed(seed)
    }

    /// Create a context with a specific seed for reproducible results
    pub fn with_seed(seed: u64) -> Self {
        Self { rng: Box::new(StdRng::seed_from_u64(seed)), seed, next_rule_id: 1 }
    }

    /// Seed the random source was initialized with
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Issue the next rule identifier
    pub fn next_rule_id(&mut self) -> RuleId {
        let id = RuleId(self.next_rule_id);
        self.next_rule_id += 1;
        id
    }

    /// Number of identifiers issued so far
    pub fn issued_rule_ids(&self) -> u64 {
        self.next_rule_id - 1
    }

    /// Pick an effect by weighted draw
    ///
    /// Weights are considered in `grant`, `deny`, `filter` order and only
    /// positive weights take part. Without a usable table the fallback effect
    /// is returned and no random number is consumed.
    pub fn choose_effect(&mut self, weights: Option<&EffectWeights>, fallback: Effect) -> Effect {
        let Some(weights) = weights else {
            return fallback;
        };

        let items: Vec<(Effect, f64)> = Effect::ALL
            .iter()
            .filter_map(|effect| {
                weights.get(effect).copied().filter(|w| *w > 0.0).map(|w| (*effect, w))
            })
            .collect();
        let total: f64 = items.iter().map(|(_, w)| w).sum();
        if items.is_empty() || total <= 0.0 {
            return fallback;
        }

        let draw = self.rng.gen::<f64>() * total;
        let mut cumulative = 0.0;
        for (effect, weight) in &items {
            cumulative += weight;
            if draw <= cumulative {
                return *effect;
            }
        }
        items.last().map(|(effect, _)| *effect).unwrap_or(fallback)
    }
}
