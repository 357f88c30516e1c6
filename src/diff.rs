//! Per-material differences between two order compositions
use crate::error::ReconcileError;
use crate::types::{MaterialId, OrderLine};
use std::collections::HashMap;

/// Net quantity changes needed to move from one composition to another.
///
/// `additions` holds materials whose total grew, `reductions` those whose total
/// shrank (including ones that disappeared). The key sets never overlap.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemDiff {
    pub additions: HashMap<MaterialId, u64>,
    pub reductions: HashMap<MaterialId, u64>,
}

impl ItemDiff {
    pub fn is_empty(&self) -> bool {
        self.additions.is_empty() && self.reductions.is_empty()
    }

    /// The same diff seen from the other direction.
    pub fn reversed(self) -> Self {
        Self {
            additions: self.reductions,
            reductions: self.additions,
        }
    }
}

/// Sum quantities per material. Zero-quantity lines are dropped.
pub fn consolidate<'a, I>(lines: I) -> Result<HashMap<MaterialId, u64>, ReconcileError>
where
    I: IntoIterator<Item = &'a OrderLine>,
{
    let mut totals: HashMap<MaterialId, u64> = HashMap::new();
    for line in lines.into_iter().filter(|l| l.quantity > 0) {
        let total = totals.entry(line.material.clone()).or_default();
        *total = total
            .checked_add(line.quantity)
            .ok_or_else(|| ReconcileError::QuantityOverflow(line.material.clone()))?;
    }
    Ok(totals)
}

pub fn diff(old_lines: &[OrderLine], new_lines: &[OrderLine]) -> Result<ItemDiff, ReconcileError> {
    let old_totals = consolidate(old_lines)?;
    let new_totals = consolidate(new_lines)?;

    let mut result = ItemDiff::default();

    for (material, &new_qty) in &new_totals {
        let old_qty = old_totals.get(material).copied().unwrap_or(0);
        if new_qty > old_qty {
            result.additions.insert(material.clone(), new_qty - old_qty);
        }
    }
    for (material, &old_qty) in &old_totals {
        let new_qty = new_totals.get(material).copied().unwrap_or(0);
        if old_qty > new_qty {
            result.reductions.insert(material.clone(), old_qty - new_qty);
        }
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(material: &str, quantity: u64) -> OrderLine {
        OrderLine::new(material, quantity)
    }

    #[test]
    fn increased_quantity_is_an_addition() {
        let result = diff(&[line("a", 5)], &[line("a", 8)]).unwrap();

        assert_eq!(result.additions, HashMap::from([(MaterialId::from("a"), 3)]));
        assert!(result.reductions.is_empty());
    }

    #[test]
    fn removed_material_is_a_full_reduction() {
        let result = diff(&[line("a", 5), line("b", 2)], &[line("a", 5)]).unwrap();

        assert!(result.additions.is_empty());
        assert_eq!(result.reductions, HashMap::from([(MaterialId::from("b"), 2)]));
    }

    #[test]
    fn fragmented_lines_match_consolidated_line() {
        let fragmented = diff(&[line("a", 2), line("a", 3)], &[line("a", 1), line("a", 7)]).unwrap();
        let single = diff(&[line("a", 5)], &[line("a", 8)]).unwrap();

        assert_eq!(fragmented, single);
    }

    #[test]
    fn zero_quantity_lines_are_absent() {
        let result = diff(&[line("a", 0)], &[]).unwrap();
        assert!(result.is_empty());

        let result = diff(&[], &[line("b", 0), line("c", 1)]).unwrap();
        assert_eq!(result.additions, HashMap::from([(MaterialId::from("c"), 1)]));
    }

    #[test]
    fn oversized_duplicate_lines_are_rejected() {
        let half = u64::MAX / 2 + 1;
        let result = diff(&[], &[line("a", half), line("a", half)]);

        assert!(matches!(
            result,
            Err(ReconcileError::QuantityOverflow(ref m)) if m == &MaterialId::from("a")
        ));
    }
}
