//! Weighted reward tables.
//!
//! A table is an ordered list of entries, each carrying a relative
//! weight. Sampling draws a point in [0, total_weight) and walks the
//! entries in stored order, accumulating positive weights. An entry
//! may nest a whole sub-table; selecting it recurses into the nested
//! table and the entry's own weight plays no further role.

use crate::rng::RandomSource;
use serde::Serialize;

/// Hard cap on table nesting, enforced when a table is built from
/// config. Real configs stop at two levels; anything deeper is a
/// config generator gone wrong.
pub const MAX_TREE_DEPTH: usize = 8;

/// Name carried by the canonical empty result.
pub const NO_REWARD: &str = "no_reward";

#[derive(Debug, Clone)]
pub struct RewardLeaf {
    pub name: String,
    pub amount_min: i64,
    pub amount_max: i64,
    pub command: Option<String>,
    pub weight: f64,
}

#[derive(Debug, Clone)]
pub enum RewardNode {
    Leaf(RewardLeaf),
    Branch { weight: f64, tree: WeightedRewardTree },
}

impl RewardNode {
    pub fn weight(&self) -> f64 {
        match self {
            RewardNode::Leaf(leaf) => leaf.weight,
            RewardNode::Branch { weight, .. } => *weight,
        }
    }
}

/// One resolved draw.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RewardResult {
    pub name: String,
    pub amount: i64,
    pub command: Option<String>,
}

impl RewardResult {
    /// Canonical result for tables that cannot produce anything.
    /// Draws on such tables succeed with this instead of failing.
    pub fn empty() -> Self {
        Self { name: NO_REWARD.into(), amount: 1, command: None }
    }
}

#[derive(Debug, Clone, Default)]
pub struct WeightedRewardTree {
    entries: Vec<RewardNode>,
    total_weight: f64,
}

impl WeightedRewardTree {
    pub fn new(entries: Vec<RewardNode>) -> Self {
        let total_weight = entries
            .iter()
            .map(RewardNode::weight)
            .filter(|w| *w > 0.0)
            .sum();
        Self { entries, total_weight }
    }

    pub fn entries(&self) -> &[RewardNode] {
        &self.entries
    }

    pub fn total_weight(&self) -> f64 {
        self.total_weight
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Draw one reward.
    ///
    /// Entries with weight <= 0 are skipped from accumulation and can
    /// never be chosen. If float rounding leaves nothing selected, the
    /// last entry in stored order wins; stored order is a deterministic
    /// tie-break, not a probability ordering.
    pub fn sample(&self, rng: &mut dyn RandomSource) -> RewardResult {
        if self.entries.is_empty() || self.total_weight <= 0.0 {
            return RewardResult::empty();
        }
        let target = rng.next_f64() * self.total_weight;
        let mut cumulative = 0.0;
        for entry in &self.entries {
            let weight = entry.weight();
            if weight <= 0.0 {
                continue;
            }
            cumulative += weight;
            if target <= cumulative {
                return Self::resolve(entry, rng);
            }
        }
        match self.entries.last() {
            Some(entry) => Self::resolve(entry, rng),
            None => RewardResult::empty(),
        }
    }

    /// Grant-all mode: every entry gets an independent Bernoulli trial
    /// on its own weight. A selected branch still resolves by sampling
    /// its sub-table.
    pub fn grant_all(&self, rng: &mut dyn RandomSource) -> Vec<RewardResult> {
        let mut granted = Vec::new();
        for entry in &self.entries {
            if bernoulli_select(entry.weight(), rng) {
                granted.push(Self::resolve(entry, rng));
            }
        }
        granted
    }

    fn resolve(entry: &RewardNode, rng: &mut dyn RandomSource) -> RewardResult {
        match entry {
            RewardNode::Branch { tree, .. } => tree.sample(rng),
            RewardNode::Leaf(leaf) => {
                let amount = if leaf.amount_max > leaf.amount_min {
                    rng.roll_range(leaf.amount_min, leaf.amount_max)
                } else {
                    leaf.amount_min
                };
                RewardResult {
                    name: leaf.name.clone(),
                    amount: amount.max(1),
                    command: leaf.command.clone(),
                }
            }
        }
    }
}

/// Interpret a grant-all weight as a probability.
///
/// Weights up to and including 1.0 are probabilities; anything above
/// is a percentage, clipped to 100%. Exactly 1.0 means certainty, and
/// existing config data relies on that literal boundary.
pub fn bernoulli_select(weight: f64, rng: &mut dyn RandomSource) -> bool {
    if weight <= 0.0 {
        return false;
    }
    let p = if weight <= 1.0 { weight } else { (weight / 100.0).min(1.0) };
    rng.chance(p)
}
