//! Inventory reconciliation for order creation, edits, status edges and deletion
//!
//! Every effect of one reconciliation call is first accumulated into an
//! [`InventoryPlan`] (one signed net delta per material) and only then written
//! through the [`MaterialAccessor`], once per material, in material-id order.
//! A failed write stops the loop; updates already written stay written.
use crate::accessor::MaterialAccessor;
use crate::diff::{ItemDiff, diff};
use crate::error::ReconcileError;
use crate::status::{OrderStatus, PurchaseFlag, PurchaseFlags, StatusModel, Transition};
use crate::status::{is_active, transition_of};
use crate::types::{MaterialId, OrderLine, OrderSnapshot};
use std::collections::BTreeMap;
use tracing::debug;

/// An inventory write that was carried out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaterialAdjustment {
    pub material: MaterialId,
    pub delta: i64,
    pub inventory: i64, // after the write
}

fn signed(material: &MaterialId, quantity: u64) -> Result<i64, ReconcileError> {
    i64::try_from(quantity).map_err(|_| ReconcileError::QuantityOverflow(material.clone()))
}

/// Signed per-material changes collected before anything is written.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InventoryPlan {
    deltas: BTreeMap<MaterialId, i64>,
}

impl InventoryPlan {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn adjust(&mut self, material: &MaterialId, delta: i64) -> Result<(), ReconcileError> {
        if delta == 0 {
            return Ok(());
        }
        let net = self.deltas.entry(material.clone()).or_default();
        *net = net
            .checked_add(delta)
            .ok_or_else(|| ReconcileError::QuantityOverflow(material.clone()))?;
        Ok(())
    }

    pub fn consume(&mut self, material: &MaterialId, quantity: u64) -> Result<(), ReconcileError> {
        self.adjust(material, -signed(material, quantity)?)
    }

    pub fn restock(&mut self, material: &MaterialId, quantity: u64) -> Result<(), ReconcileError> {
        self.adjust(material, signed(material, quantity)?)
    }

    /// Full order reduction.
    pub fn consume_lines(&mut self, lines: &[OrderLine]) -> Result<(), ReconcileError> {
        for line in lines {
            self.consume(&line.material, line.quantity)?;
        }
        Ok(())
    }

    /// Full order restoration.
    pub fn restock_lines(&mut self, lines: &[OrderLine]) -> Result<(), ReconcileError> {
        for line in lines {
            self.restock(&line.material, line.quantity)?;
        }
        Ok(())
    }

    /// Additions are taken from stock, reductions go back to it.
    pub fn apply_diff(&mut self, item_diff: &ItemDiff) -> Result<(), ReconcileError> {
        for (material, &quantity) in &item_diff.additions {
            self.consume(material, quantity)?;
        }
        for (material, &quantity) in &item_diff.reductions {
            self.restock(material, quantity)?;
        }
        Ok(())
    }

    /// Additions arrive in stock, reductions leave it.
    pub fn receive_diff(&mut self, item_diff: &ItemDiff) -> Result<(), ReconcileError> {
        self.apply_diff(&item_diff.clone().reversed())
    }

    /// Net change for `material`, zero when untouched.
    pub fn delta(&self, material: &MaterialId) -> i64 {
        self.deltas.get(material).copied().unwrap_or(0)
    }

    /// Non-zero net changes in material-id order.
    pub fn deltas(&self) -> impl Iterator<Item = (&MaterialId, i64)> {
        self.deltas.iter().filter(|(_, d)| **d != 0).map(|(m, d)| (m, *d))
    }

    pub fn is_empty(&self) -> bool {
        self.deltas().next().is_none()
    }
}

/// Lines an order keeps out of stock: all of them unless the order is canceled
/// (or absent).
fn reserved_lines<S: StatusModel>(order: Option<&OrderSnapshot<S>>, canceled: S::Flag) -> &[OrderLine] {
    match order {
        Some(order) if !order.status.is_active(canceled) => &order.lines,
        _ => &[],
    }
}

/// Sales orders take their lines out of stock on creation and give them back on
/// cancellation or deletion. Line edits move only the difference.
pub fn sales_plan(
    old: Option<&OrderSnapshot<OrderStatus>>,
    new: Option<&OrderSnapshot<OrderStatus>>,
) -> Result<InventoryPlan, ReconcileError> {
    let mut plan = InventoryPlan::new();
    plan.apply_diff(&diff(
        reserved_lines(old, OrderStatus::Canceled),
        reserved_lines(new, OrderStatus::Canceled),
    )?)?;
    Ok(plan)
}

/// Lines whose goods receipt is booked: GOODS_RECEIPT up and CANCELED down.
fn received_lines(order: Option<&OrderSnapshot<PurchaseFlags>>) -> Option<&[OrderLine]> {
    order
        .filter(|o| o.status.is_active(PurchaseFlag::GoodsReceipt))
        .filter(|o| !o.status.is_active(PurchaseFlag::Canceled))
        .map(|o| o.lines.as_slice())
}

/// Purchase orders reserve like sales orders and additionally move stock on
/// goods receipt.
///
/// Receipt is undone when GOODS_RECEIPT drops, or when CANCELED is raised while
/// GOODS_RECEIPT stays up. Dropping CANCELED again does not redo the receipt.
/// Line edits while the receipt stays booked receive the difference.
pub fn purchase_plan(
    old: Option<&OrderSnapshot<PurchaseFlags>>,
    new: Option<&OrderSnapshot<PurchaseFlags>>,
) -> Result<InventoryPlan, ReconcileError> {
    let mut plan = InventoryPlan::new();
    plan.apply_diff(&diff(
        reserved_lines(old, PurchaseFlag::Canceled),
        reserved_lines(new, PurchaseFlag::Canceled),
    )?)?;

    let old_status = old.map(|o| &o.status);
    let new_status = new.map(|o| &o.status);

    match (transition_of(old_status, new_status, PurchaseFlag::GoodsReceipt), old, new) {
        (Some(Transition::Activated), _, Some(new))
            if !is_active(new_status, PurchaseFlag::Canceled) =>
        {
            plan.restock_lines(&new.lines)?;
        }
        (Some(Transition::Deactivated), Some(old), _)
            if !is_active(old_status, PurchaseFlag::Canceled) =>
        {
            plan.consume_lines(&old.lines)?;
        }
        _ => {}
    }

    if let Some(old) = old {
        let canceled = transition_of(old_status, new_status, PurchaseFlag::Canceled);
        if canceled == Some(Transition::Activated)
            && is_active(old_status, PurchaseFlag::GoodsReceipt)
            && is_active(new_status, PurchaseFlag::GoodsReceipt)
        {
            plan.consume_lines(&old.lines)?;
        }
    }

    if let (Some(old_lines), Some(new_lines)) = (received_lines(old), received_lines(new)) {
        plan.receive_diff(&diff(old_lines, new_lines)?)?;
    }

    Ok(plan)
}

pub struct InventoryReconciler<'a, M: ?Sized> {
    materials: &'a M,
}

impl<'a, M: MaterialAccessor + ?Sized> InventoryReconciler<'a, M> {
    pub fn new(materials: &'a M) -> Self {
        Self { materials }
    }

    pub fn reconcile_sales(
        &self,
        old: Option<&OrderSnapshot<OrderStatus>>,
        new: Option<&OrderSnapshot<OrderStatus>>,
    ) -> Result<Vec<MaterialAdjustment>, ReconcileError> {
        self.apply(&sales_plan(old, new)?)
    }

    pub fn reconcile_purchase(
        &self,
        old: Option<&OrderSnapshot<PurchaseFlags>>,
        new: Option<&OrderSnapshot<PurchaseFlags>>,
    ) -> Result<Vec<MaterialAdjustment>, ReconcileError> {
        self.apply(&purchase_plan(old, new)?)
    }

    pub fn reconcile_production(
        &self,
        old: Option<&OrderSnapshot<OrderStatus>>,
        new: Option<&OrderSnapshot<OrderStatus>>,
    ) -> Result<Vec<MaterialAdjustment>, ReconcileError> {
        let plan = self.production_plan(old, new)?;
        self.apply(&plan)
    }

    /// Production orders touch stock only through FINISHED: reaching it adds the
    /// products and consumes their bill of materials, leaving it reverses that.
    /// Line edits while FINISHED stays active produce or unproduce the difference.
    pub fn production_plan(
        &self,
        old: Option<&OrderSnapshot<OrderStatus>>,
        new: Option<&OrderSnapshot<OrderStatus>>,
    ) -> Result<InventoryPlan, ReconcileError> {
        let mut plan = InventoryPlan::new();
        let was_finished = is_active(old.map(|o| &o.status), OrderStatus::Finished);
        let is_finished = is_active(new.map(|o| &o.status), OrderStatus::Finished);

        match (old, new) {
            (_, Some(new)) if !was_finished && is_finished => {
                for line in &new.lines {
                    let quantity = signed(&line.material, line.quantity)?;
                    self.produce(&mut plan, &line.material, quantity)?;
                }
            }
            (Some(old), _) if was_finished && !is_finished => {
                for line in &old.lines {
                    let quantity = signed(&line.material, line.quantity)?;
                    self.produce(&mut plan, &line.material, -quantity)?;
                }
            }
            (Some(old), Some(new)) if was_finished && is_finished => {
                let item_diff = diff(&old.lines, &new.lines)?;
                for (material, &quantity) in &item_diff.additions {
                    self.produce(&mut plan, material, signed(material, quantity)?)?;
                }
                for (material, &quantity) in &item_diff.reductions {
                    self.produce(&mut plan, material, -signed(material, quantity)?)?;
                }
            }
            _ => {}
        }

        Ok(plan)
    }

    /// `quantity` units of `product` enter stock (negative: leave it), and the
    /// matching component quantities move the other way.
    fn produce(
        &self,
        plan: &mut InventoryPlan,
        product: &MaterialId,
        quantity: i64,
    ) -> Result<(), ReconcileError> {
        if quantity == 0 {
            return Ok(());
        }
        let material = self.materials.get_material(product)?;

        plan.adjust(product, quantity)?;
        for entry in &material.bill_of_materials {
            let required = signed(&entry.component, entry.multiplier)?
                .checked_mul(quantity)
                .ok_or_else(|| ReconcileError::QuantityOverflow(entry.component.clone()))?;
            plan.adjust(&entry.component, -required)?;
        }
        Ok(())
    }

    /// Writes every non-zero delta once.
    pub fn apply(&self, plan: &InventoryPlan) -> Result<Vec<MaterialAdjustment>, ReconcileError> {
        let mut applied = vec![];

        for (id, delta) in plan.deltas() {
            let mut material = self.materials.get_material(id)?;
            material.inventory = material
                .inventory
                .checked_add(delta)
                .ok_or_else(|| ReconcileError::QuantityOverflow(id.clone()))?;
            self.materials.update_material(&material)?;

            debug!(material = %id, delta, inventory = material.inventory, "inventory adjusted");
            applied.push(MaterialAdjustment {
                material: id.clone(),
                delta,
                inventory: material.inventory,
            });
        }

        Ok(applied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sales(status: OrderStatus, lines: &[(&str, u64)]) -> OrderSnapshot<OrderStatus> {
        lines
            .iter()
            .fold(OrderSnapshot::new("so", status), |order, (m, q)| {
                order.add_line(OrderLine::new(*m, *q))
            })
    }

    fn purchase(flags: &[PurchaseFlag], lines: &[(&str, u64)]) -> OrderSnapshot<PurchaseFlags> {
        let status: PurchaseFlags = flags.iter().copied().collect();
        lines
            .iter()
            .fold(OrderSnapshot::new("po", status), |order, (m, q)| {
                order.add_line(OrderLine::new(*m, *q))
            })
    }

    fn a() -> MaterialId {
        MaterialId::from("a")
    }

    #[test]
    fn sales_creation_consumes_all_lines() {
        let new = sales(OrderStatus::Open, &[("a", 5)]);
        assert_eq!(sales_plan(None, Some(&new)).unwrap().delta(&a()), -5);
    }

    #[test]
    fn sales_cancellation_restores_and_deleting_afterwards_does_nothing() {
        let open = sales(OrderStatus::Open, &[("a", 5)]);
        let canceled = sales(OrderStatus::Canceled, &[("a", 5)]);

        assert_eq!(sales_plan(Some(&open), Some(&canceled)).unwrap().delta(&a()), 5);
        assert!(sales_plan(Some(&canceled), None).unwrap().is_empty());
    }

    #[test]
    fn sales_edit_and_cancel_in_one_call_restores_old_lines_once() {
        let open = sales(OrderStatus::Open, &[("a", 5)]);
        let canceled = sales(OrderStatus::Canceled, &[("a", 9)]);

        assert_eq!(sales_plan(Some(&open), Some(&canceled)).unwrap().delta(&a()), 5);
    }

    #[test]
    fn goods_receipt_toggles_stock() {
        let open = purchase(&[PurchaseFlag::Open], &[("a", 4)]);
        let received = purchase(&[PurchaseFlag::Open, PurchaseFlag::GoodsReceipt], &[("a", 4)]);

        assert_eq!(purchase_plan(Some(&open), Some(&received)).unwrap().delta(&a()), 4);
        assert_eq!(purchase_plan(Some(&received), Some(&open)).unwrap().delta(&a()), -4);
    }

    #[test]
    fn canceling_a_received_order_reverses_the_receipt() {
        let received = purchase(&[PurchaseFlag::GoodsReceipt], &[("a", 4)]);
        let canceled = purchase(&[PurchaseFlag::GoodsReceipt, PurchaseFlag::Canceled], &[("a", 4)]);

        // reservation comes back (+4), receipt goes away (-4)
        let plan = purchase_plan(Some(&received), Some(&canceled)).unwrap();
        assert_eq!(plan.delta(&a()), 0);

        // lifting the cancellation re-reserves but does not redo the receipt
        let plan = purchase_plan(Some(&canceled), Some(&received)).unwrap();
        assert_eq!(plan.delta(&a()), -4);
    }

    #[test]
    fn deleting_a_received_order_undoes_receipt_before_restoring() {
        let received = purchase(&[PurchaseFlag::GoodsReceipt], &[("a", 4), ("b", 1)]);

        assert!(purchase_plan(Some(&received), None).unwrap().is_empty());
    }

    #[test]
    fn plan_nets_repeated_materials() {
        let mut plan = InventoryPlan::new();
        plan.consume(&a(), 3).unwrap();
        plan.restock(&a(), 3).unwrap();
        plan.restock(&MaterialId::from("b"), 2).unwrap();

        let deltas: Vec<_> = plan.deltas().collect();
        assert_eq!(deltas, vec![(&MaterialId::from("b"), 2)]);
    }

    #[test]
    fn edits_after_receipt_receive_the_difference() {
        let received = purchase(&[PurchaseFlag::GoodsReceipt], &[("a", 4)]);
        let grown = purchase(&[PurchaseFlag::GoodsReceipt], &[("a", 6)]);

        // two more reserved, two more received
        assert!(purchase_plan(Some(&received), Some(&grown)).unwrap().is_empty());
        assert!(purchase_plan(Some(&grown), None).unwrap().is_empty());
    }

    #[test]
    fn edits_after_canceled_receipt_move_nothing() {
        let canceled = purchase(&[PurchaseFlag::GoodsReceipt, PurchaseFlag::Canceled], &[("a", 4)]);
        let grown = purchase(&[PurchaseFlag::GoodsReceipt, PurchaseFlag::Canceled], &[("a", 6)]);

        assert!(purchase_plan(Some(&canceled), Some(&grown)).unwrap().is_empty());
    }

    #[test]
    fn oversized_quantities_are_rejected() {
        let mut plan = InventoryPlan::new();
        plan.adjust(&a(), i64::MAX).unwrap();

        assert!(matches!(
            plan.adjust(&a(), 1),
            Err(ReconcileError::QuantityOverflow(_))
        ));
        assert!(matches!(
            InventoryPlan::new().restock(&a(), u64::MAX),
            Err(ReconcileError::QuantityOverflow(_))
        ));
    }
}
