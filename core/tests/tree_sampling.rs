//! Weighted table sampling properties.
//!
//! Boundary draws, the last-entry rounding fallback, the canonical
//! empty result and frequency convergence over many seeded draws.

use wishwell_core::rng::{RandomSource, SeededRng};
use wishwell_core::tree::{
    bernoulli_select, RewardLeaf, RewardNode, RewardResult, WeightedRewardTree, NO_REWARD,
};

// ── Helpers ──────────────────────────────────────────────────────────────────

/// Returns the same float on every draw and the low end of ranges.
struct Fixed(f64);

impl RandomSource for Fixed {
    fn next_f64(&mut self) -> f64 {
        self.0
    }
    fn next_u64_below(&mut self, _n: u64) -> u64 {
        0
    }
}

/// Always draws the top of every range.
struct MaxBoundary;

impl RandomSource for MaxBoundary {
    fn next_f64(&mut self) -> f64 {
        1.0 - 1e-12
    }
    fn next_u64_below(&mut self, n: u64) -> u64 {
        n - 1
    }
}

fn leaf(name: &str, weight: f64) -> RewardNode {
    RewardNode::Leaf(RewardLeaf {
        name: name.into(),
        amount_min: 1,
        amount_max: 1,
        command: None,
        weight,
    })
}

fn two_entry_tree() -> WeightedRewardTree {
    WeightedRewardTree::new(vec![leaf("common_dust", 1.0), leaf("rare_gem", 3.0)])
}

// ── Tests ────────────────────────────────────────────────────────────────────

/// A draw at u = 0 must land on the first positive-weight entry, even
/// when a zero-weight entry precedes it.
#[test]
fn zero_draw_selects_first_positive_entry() {
    let tree = WeightedRewardTree::new(vec![
        leaf("phantom", 0.0),
        leaf("common_dust", 1.0),
        leaf("rare_gem", 3.0),
    ]);
    let result = tree.sample(&mut Fixed(0.0));
    assert_eq!(result.name, "common_dust");
}

/// A draw just below the total weight lands on the last positive entry.
#[test]
fn near_total_draw_selects_last_entry() {
    let tree = two_entry_tree();
    let result = tree.sample(&mut MaxBoundary);
    assert_eq!(result.name, "rare_gem");
}

/// A draw source that misbehaves and hands back a value past the total
/// weight must still produce the last entry in stored order, never a
/// panic or an empty walk.
#[test]
fn beyond_total_falls_back_to_last_stored_entry() {
    let tree = two_entry_tree();
    let result = tree.sample(&mut Fixed(1.5));
    assert_eq!(result.name, "rare_gem");
}

/// Zero-weight entries are invisible to accumulation: over many seeded
/// draws they are never selected.
#[test]
fn zero_weight_entries_are_never_selected() {
    let tree = WeightedRewardTree::new(vec![
        leaf("common_dust", 1.0),
        leaf("cursed_relic", 0.0),
        leaf("rare_gem", 1.0),
    ]);
    let mut rng = SeededRng::seed_from(7);
    for _ in 0..5_000 {
        let result = tree.sample(&mut rng);
        assert_ne!(result.name, "cursed_relic");
    }
}

/// Tables that cannot produce anything succeed with the canonical
/// empty result instead of failing.
#[test]
fn empty_and_weightless_tables_return_canonical_result() {
    let empty = WeightedRewardTree::new(vec![]);
    assert_eq!(empty.sample(&mut Fixed(0.5)), RewardResult::empty());

    let weightless =
        WeightedRewardTree::new(vec![leaf("phantom", 0.0), leaf("ghost", -2.0)]);
    let result = weightless.sample(&mut Fixed(0.5));
    assert_eq!(result.name, NO_REWARD);
    assert_eq!(result.amount, 1);
    assert!(result.command.is_none());
}

/// Selecting a branch recurses into its nested table; the branch's own
/// weight plays no role inside.
#[test]
fn branch_selection_recurses_into_nested_table() {
    let nested = WeightedRewardTree::new(vec![leaf("relic_sword", 1.0)]);
    let tree = WeightedRewardTree::new(vec![RewardNode::Branch {
        weight: 1.0,
        tree: nested,
    }]);
    let result = tree.sample(&mut Fixed(0.5));
    assert_eq!(result.name, "relic_sword");
}

/// Amount ranges are inclusive on both ends and floored at 1.
#[test]
fn amount_range_is_inclusive_and_floored() {
    let ranged = WeightedRewardTree::new(vec![RewardNode::Leaf(RewardLeaf {
        name: "iron_ingot".into(),
        amount_min: 2,
        amount_max: 5,
        command: None,
        weight: 1.0,
    })]);
    assert_eq!(ranged.sample(&mut Fixed(0.0)).amount, 2);
    assert_eq!(ranged.sample(&mut MaxBoundary).amount, 5);

    let degenerate = WeightedRewardTree::new(vec![RewardNode::Leaf(RewardLeaf {
        name: "pebble".into(),
        amount_min: 0,
        amount_max: 0,
        command: None,
        weight: 1.0,
    })]);
    assert_eq!(degenerate.sample(&mut Fixed(0.0)).amount, 1);
}

/// Over many draws, the empirical frequency of each entry converges to
/// weight / total.
#[test]
fn empirical_frequency_matches_weights() {
    let tree = two_entry_tree();
    let mut rng = SeededRng::seed_from(0xC0FFEE);
    const DRAWS: usize = 40_000;

    let mut common = 0usize;
    for _ in 0..DRAWS {
        if tree.sample(&mut rng).name == "common_dust" {
            common += 1;
        }
    }
    let observed = common as f64 / DRAWS as f64;
    assert!(
        (observed - 0.25).abs() < 0.02,
        "expected common_dust near 25%, observed {observed:.4}"
    );
}

/// Grant-all weights: <= 1.0 reads as a probability, above reads as a
/// percentage clipped to 100%. Exactly 1.0 is certainty.
#[test]
fn bernoulli_weight_interpretation() {
    let mut rng = SeededRng::seed_from(99);
    for _ in 0..1_000 {
        assert!(bernoulli_select(1.0, &mut rng), "weight 1.0 must always grant");
        assert!(bernoulli_select(250.0, &mut rng), "weight 250 clips to 100%");
        assert!(!bernoulli_select(0.0, &mut rng), "weight 0 never grants");
    }

    let mut hits = 0usize;
    const TRIALS: usize = 20_000;
    for _ in 0..TRIALS {
        if bernoulli_select(50.0, &mut rng) {
            hits += 1;
        }
    }
    let observed = hits as f64 / TRIALS as f64;
    assert!(
        (observed - 0.5).abs() < 0.03,
        "weight 50 should grant near 50%, observed {observed:.4}"
    );
}
