//! Property-based tests for the item diff
//!
//! The diff decides how much stock moves on every order edit, so it has to be
//! independent of how the caller happens to split or order lines. These
//! properties are checked over randomly generated line sets drawn from a small
//! material pool, which makes overlaps between the two sides likely.

use order_reconcile::{
    diff::{consolidate, diff},
    inventory::InventoryPlan,
    types::OrderLine,
};
use proptest::prelude::*;

// PROPERTY TEST STRATEGIES

/// Strategy to generate a line over a pool of five materials
fn line_strategy() -> impl Strategy<Value = OrderLine> {
    (0u8..5, 0u64..50).prop_map(|(m, q)| OrderLine::new(format!("mat_{}", m), q))
}

fn lines_strategy() -> impl Strategy<Value = Vec<OrderLine>> {
    prop::collection::vec(line_strategy(), 0..12)
}

/// One line per material carrying the summed quantity
fn consolidated(lines: &[OrderLine]) -> Vec<OrderLine> {
    consolidate(lines)
        .unwrap()
        .into_iter()
        .map(|(material, quantity)| OrderLine::new(material, quantity))
        .collect()
}

// PROPERTY TESTS
proptest! {
    /// Property: a material is never both added and reduced
    #[test]
    fn prop_additions_and_reductions_are_disjoint(
        old in lines_strategy(),
        new in lines_strategy(),
    ) {
        let result = diff(&old, &new).unwrap();

        for material in result.additions.keys() {
            prop_assert!(!result.reductions.contains_key(material));
        }
        prop_assert!(result.additions.values().all(|q| *q > 0));
        prop_assert!(result.reductions.values().all(|q| *q > 0));
    }

    /// Property: consolidating duplicate lines first changes nothing
    #[test]
    fn prop_consolidation_invariance(
        old in lines_strategy(),
        new in lines_strategy(),
    ) {
        let raw = diff(&old, &new).unwrap();

        prop_assert_eq!(&raw, &diff(&consolidated(&old), &new).unwrap());
        prop_assert_eq!(&raw, &diff(&old, &consolidated(&new)).unwrap());
        prop_assert_eq!(&raw, &diff(&consolidated(&old), &consolidated(&new)).unwrap());
    }

    /// Property: line order does not matter
    #[test]
    fn prop_order_independence(
        old in lines_strategy(),
        new in lines_strategy(),
    ) {
        let mut old_reversed = old.clone();
        old_reversed.reverse();
        let mut new_reversed = new.clone();
        new_reversed.reverse();

        prop_assert_eq!(diff(&old, &new).unwrap(), diff(&old_reversed, &new_reversed).unwrap());
    }

    /// Property: diffing a composition against itself moves nothing
    #[test]
    fn prop_self_diff_is_empty(lines in lines_strategy()) {
        prop_assert!(diff(&lines, &lines).unwrap().is_empty());
    }

    /// Property: diffing backwards swaps additions and reductions
    #[test]
    fn prop_symmetry(
        old in lines_strategy(),
        new in lines_strategy(),
    ) {
        prop_assert_eq!(diff(&old, &new).unwrap().reversed(), diff(&new, &old).unwrap());
    }

    /// Property: applying the diff to the old totals yields the new totals
    #[test]
    fn prop_diff_bridges_compositions(
        old in lines_strategy(),
        new in lines_strategy(),
    ) {
        let old_totals = consolidate(&old).unwrap();
        let new_totals = consolidate(&new).unwrap();

        let mut plan = InventoryPlan::new();
        plan.apply_diff(&diff(&old, &new).unwrap()).unwrap();

        for material in old_totals.keys().chain(new_totals.keys()) {
            let before = old_totals.get(material).copied().unwrap_or(0) as i64;
            let after = new_totals.get(material).copied().unwrap_or(0) as i64;
            // the plan takes from stock what the order gained
            prop_assert_eq!(plan.delta(material), before - after);
        }
    }
}
