//! Order-type adapters tying status edges, inventory and payments together
//!
//! Callers pass the previously persisted snapshot and the requested one. An
//! absent previous snapshot means creation, an absent requested one deletion.
//! Inventory effects are applied before payment effects.
use crate::accessor::{AccountAccessor, MaterialAccessor};
use crate::error::ReconcileError;
use crate::inventory::{InventoryReconciler, MaterialAdjustment};
use crate::payment::{PaymentOutcome, PaymentReconciler};
use crate::status::{OrderStatus, PurchaseFlag, PurchaseFlags, StatusEdge, StatusModel, transitions};
use crate::types::{OrderId, OrderSnapshot};
use std::fmt;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OrderKind {
    Sales,
    Purchase,
    Production,
}

impl OrderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderKind::Sales => "sales",
            OrderKind::Purchase => "purchase",
            OrderKind::Production => "production",
        }
    }
}

impl fmt::Display for OrderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What one reconciliation call did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileReport<F> {
    pub order: OrderId,
    pub edges: Vec<StatusEdge<F>>,
    pub inventory: Vec<MaterialAdjustment>,
    pub payment: Option<PaymentOutcome>,
}

pub type SalesReport = ReconcileReport<OrderStatus>;
pub type PurchaseReport = ReconcileReport<PurchaseFlag>;
pub type ProductionReport = ReconcileReport<OrderStatus>;

pub struct ReconcileEngine<'a, M: ?Sized, A: ?Sized> {
    materials: &'a M,
    accounts: &'a A,
}

impl<'a, M, A> ReconcileEngine<'a, M, A>
where
    M: MaterialAccessor + ?Sized,
    A: AccountAccessor + ?Sized,
{
    pub fn new(materials: &'a M, accounts: &'a A) -> Self {
        Self {
            materials,
            accounts,
        }
    }

    pub fn create_sales(&self, new: &OrderSnapshot<OrderStatus>) -> Result<SalesReport, ReconcileError> {
        self.reconcile_sales(None, Some(new))
    }

    pub fn update_sales(
        &self,
        old: &OrderSnapshot<OrderStatus>,
        new: &OrderSnapshot<OrderStatus>,
    ) -> Result<SalesReport, ReconcileError> {
        self.reconcile_sales(Some(old), Some(new))
    }

    pub fn delete_sales(&self, old: &OrderSnapshot<OrderStatus>) -> Result<SalesReport, ReconcileError> {
        self.reconcile_sales(Some(old), None)
    }

    pub fn create_purchase(
        &self,
        new: &OrderSnapshot<PurchaseFlags>,
    ) -> Result<PurchaseReport, ReconcileError> {
        self.reconcile_purchase(None, Some(new))
    }

    pub fn update_purchase(
        &self,
        old: &OrderSnapshot<PurchaseFlags>,
        new: &OrderSnapshot<PurchaseFlags>,
    ) -> Result<PurchaseReport, ReconcileError> {
        self.reconcile_purchase(Some(old), Some(new))
    }

    pub fn delete_purchase(
        &self,
        old: &OrderSnapshot<PurchaseFlags>,
    ) -> Result<PurchaseReport, ReconcileError> {
        self.reconcile_purchase(Some(old), None)
    }

    pub fn create_production(
        &self,
        new: &OrderSnapshot<OrderStatus>,
    ) -> Result<ProductionReport, ReconcileError> {
        self.reconcile_production(None, Some(new))
    }

    pub fn update_production(
        &self,
        old: &OrderSnapshot<OrderStatus>,
        new: &OrderSnapshot<OrderStatus>,
    ) -> Result<ProductionReport, ReconcileError> {
        self.reconcile_production(Some(old), Some(new))
    }

    pub fn delete_production(
        &self,
        old: &OrderSnapshot<OrderStatus>,
    ) -> Result<ProductionReport, ReconcileError> {
        self.reconcile_production(Some(old), None)
    }

    pub fn reconcile_sales(
        &self,
        old: Option<&OrderSnapshot<OrderStatus>>,
        new: Option<&OrderSnapshot<OrderStatus>>,
    ) -> Result<SalesReport, ReconcileError> {
        let (order, edges) = prepare(OrderKind::Sales, old, new)?;

        let inventory = InventoryReconciler::new(self.materials).reconcile_sales(old, new)?;
        let payment = PaymentReconciler::new(self.accounts).reconcile_sales(old, new)?;

        Ok(ReconcileReport {
            order,
            edges,
            inventory,
            payment,
        })
    }

    pub fn reconcile_purchase(
        &self,
        old: Option<&OrderSnapshot<PurchaseFlags>>,
        new: Option<&OrderSnapshot<PurchaseFlags>>,
    ) -> Result<PurchaseReport, ReconcileError> {
        let (order, edges) = prepare(OrderKind::Purchase, old, new)?;

        let inventory = InventoryReconciler::new(self.materials).reconcile_purchase(old, new)?;
        let payment = PaymentReconciler::new(self.accounts).reconcile_purchase(old, new)?;

        Ok(ReconcileReport {
            order,
            edges,
            inventory,
            payment,
        })
    }

    pub fn reconcile_production(
        &self,
        old: Option<&OrderSnapshot<OrderStatus>>,
        new: Option<&OrderSnapshot<OrderStatus>>,
    ) -> Result<ProductionReport, ReconcileError> {
        let (order, edges) = prepare(OrderKind::Production, old, new)?;

        let inventory = InventoryReconciler::new(self.materials).reconcile_production(old, new)?;

        Ok(ReconcileReport {
            order,
            edges,
            inventory,
            payment: None,
        })
    }
}

/// Checks both snapshots describe the same order and detects its status edges.
fn prepare<S: StatusModel>(
    kind: OrderKind,
    old: Option<&OrderSnapshot<S>>,
    new: Option<&OrderSnapshot<S>>,
) -> Result<(OrderId, Vec<StatusEdge<S::Flag>>), ReconcileError> {
    let order = match (old, new) {
        (Some(old), Some(new)) if old.id != new.id => {
            return Err(ReconcileError::OrderMismatch {
                expected: old.id.clone(),
                found: new.id.clone(),
            });
        }
        (Some(order), _) | (None, Some(order)) => order.id.clone(),
        (None, None) => OrderId::new(""),
    };

    let edges = transitions(old.map(|o| &o.status), new.map(|o| &o.status));
    info!(%kind, %order, created = old.is_none(), deleted = new.is_none(), edges = edges.len(), "reconciling order");

    Ok((order, edges))
}
