//! Service layer API for order lifecycle operations
//!
//! Every operation reads the previously persisted snapshot first, reconciles
//! inventory and payments against it, and then writes the new snapshot, all in
//! one sled transaction. A failed call leaves stock, balances and orders as
//! they were, so it can simply be retried.
use super::accessor::{AccountAccessor, MaterialAccessor};
use super::config::ReconcileConfig;
use super::engine::{OrderKind, ProductionReport, PurchaseReport, ReconcileEngine, SalesReport};
use super::error::ReconcileError;
use super::status::{OrderStatus, PurchaseFlags};
use super::store::{SledStore, StoreTransaction};
use super::types::{Account, AccountId, Material, MaterialId, OrderId, OrderSnapshot, Posting};
use anyhow::Context;
use std::sync::Arc;

type Engine<'a> = ReconcileEngine<'a, StoreTransaction<'a>, StoreTransaction<'a>>;

pub struct OrderService {
    store: SledStore,
}

impl OrderService {
    pub fn new(instance: Arc<sled::Db>) -> anyhow::Result<Self> {
        let store = SledStore::new(instance).context("Failed to open order trees")?;
        Ok(Self { store })
    }

    /// Open the database described by `config`
    pub fn open(config: &ReconcileConfig) -> anyhow::Result<Self> {
        let db = config
            .sled_config()
            .open()
            .with_context(|| format!("Failed to open database at {}", config.db_path.display()))?;
        Self::new(Arc::new(db))
    }

    pub fn store(&self) -> &SledStore {
        &self.store
    }

    /// Register or overwrite a material master record
    pub fn register_material(&self, material: Material) -> anyhow::Result<()> {
        Ok(self.store.put_material(&material)?)
    }

    /// Register or overwrite an account
    pub fn register_account(&self, account: Account) -> anyhow::Result<()> {
        Ok(self.store.put_account(&account)?)
    }

    pub fn material(&self, id: &MaterialId) -> anyhow::Result<Material> {
        Ok(self.store.get_material(id)?)
    }

    pub fn account(&self, id: &AccountId) -> anyhow::Result<Account> {
        Ok(self.store.get_account(id)?)
    }

    pub fn postings_for(&self, order: &OrderId) -> anyhow::Result<Vec<Posting>> {
        Ok(self.store.postings_for(order)?)
    }

    fn create_order<S, R>(
        &self,
        kind: OrderKind,
        order: &OrderSnapshot<S>,
        reconcile: impl Fn(&Engine<'_>, &OrderSnapshot<S>) -> Result<R, ReconcileError>,
    ) -> anyhow::Result<R>
    where
        OrderSnapshot<S>: minicbor::Encode<()> + for<'b> minicbor::Decode<'b, ()>,
    {
        self.store
            .transaction(|tx| {
                // Refuse to overwrite an order that already exists
                if tx.load_order::<S>(kind, &order.id)?.is_some() {
                    return Err(ReconcileError::DuplicateOrder(order.id.clone()));
                }

                let engine: Engine<'_> = ReconcileEngine::new(tx, tx);
                let report = reconcile(&engine, order)?;

                tx.save_order(kind, order)?;
                Ok(report)
            })
            .with_context(|| format!("Failed to reconcile new {} order {}", kind, order.id))
    }

    fn update_order<S, R>(
        &self,
        kind: OrderKind,
        order: &OrderSnapshot<S>,
        reconcile: impl Fn(&Engine<'_>, &OrderSnapshot<S>, &OrderSnapshot<S>) -> Result<R, ReconcileError>,
    ) -> anyhow::Result<R>
    where
        OrderSnapshot<S>: minicbor::Encode<()> + for<'b> minicbor::Decode<'b, ()>,
    {
        self.store
            .transaction(|tx| {
                // Load the persisted state before anything is written
                let previous = tx
                    .load_order::<S>(kind, &order.id)?
                    .ok_or_else(|| ReconcileError::UnknownOrder(order.id.clone()))?;

                let engine: Engine<'_> = ReconcileEngine::new(tx, tx);
                let report = reconcile(&engine, &previous, order)?;

                tx.save_order(kind, order)?;
                Ok(report)
            })
            .with_context(|| format!("Failed to reconcile {} order {}", kind, order.id))
    }

    fn delete_order<S, R>(
        &self,
        kind: OrderKind,
        id: &OrderId,
        reconcile: impl Fn(&Engine<'_>, &OrderSnapshot<S>) -> Result<R, ReconcileError>,
    ) -> anyhow::Result<R>
    where
        OrderSnapshot<S>: minicbor::Encode<()> + for<'b> minicbor::Decode<'b, ()>,
    {
        self.store
            .transaction(|tx| {
                let previous = tx
                    .load_order::<S>(kind, id)?
                    .ok_or_else(|| ReconcileError::UnknownOrder(id.clone()))?;

                let engine: Engine<'_> = ReconcileEngine::new(tx, tx);
                let report = reconcile(&engine, &previous)?;

                tx.remove_order(kind, id)?;
                Ok(report)
            })
            .with_context(|| format!("Failed to reconcile deletion of {} order {}", kind, id))
    }

    /// Create a sales order, taking its lines out of stock
    pub fn create_sales_order(&self, order: OrderSnapshot<OrderStatus>) -> anyhow::Result<SalesReport> {
        self.create_order(OrderKind::Sales, &order, |engine, new| engine.create_sales(new))
    }

    /// Replace a sales order with `order`
    pub fn update_sales_order(&self, order: OrderSnapshot<OrderStatus>) -> anyhow::Result<SalesReport> {
        self.update_order(OrderKind::Sales, &order, |engine, old, new| {
            engine.update_sales(old, new)
        })
    }

    pub fn delete_sales_order(&self, id: &OrderId) -> anyhow::Result<SalesReport> {
        self.delete_order(OrderKind::Sales, id, |engine, old| engine.delete_sales(old))
    }

    pub fn sales_order(&self, id: &OrderId) -> anyhow::Result<Option<OrderSnapshot<OrderStatus>>> {
        Ok(self.store.load_order(OrderKind::Sales, id)?)
    }

    /// Create a purchase order
    pub fn create_purchase_order(
        &self,
        order: OrderSnapshot<PurchaseFlags>,
    ) -> anyhow::Result<PurchaseReport> {
        self.create_order(OrderKind::Purchase, &order, |engine, new| {
            engine.create_purchase(new)
        })
    }

    /// Replace a purchase order with `order`, e.g. to raise GOODS_RECEIPT
    pub fn update_purchase_order(
        &self,
        order: OrderSnapshot<PurchaseFlags>,
    ) -> anyhow::Result<PurchaseReport> {
        self.update_order(OrderKind::Purchase, &order, |engine, old, new| {
            engine.update_purchase(old, new)
        })
    }

    pub fn delete_purchase_order(&self, id: &OrderId) -> anyhow::Result<PurchaseReport> {
        self.delete_order(OrderKind::Purchase, id, |engine, old| {
            engine.delete_purchase(old)
        })
    }

    pub fn purchase_order(
        &self,
        id: &OrderId,
    ) -> anyhow::Result<Option<OrderSnapshot<PurchaseFlags>>> {
        Ok(self.store.load_order(OrderKind::Purchase, id)?)
    }

    /// Create a production order. Stock only moves once it is FINISHED.
    pub fn create_production_order(
        &self,
        order: OrderSnapshot<OrderStatus>,
    ) -> anyhow::Result<ProductionReport> {
        self.create_order(OrderKind::Production, &order, |engine, new| {
            engine.create_production(new)
        })
    }

    pub fn update_production_order(
        &self,
        order: OrderSnapshot<OrderStatus>,
    ) -> anyhow::Result<ProductionReport> {
        self.update_order(OrderKind::Production, &order, |engine, old, new| {
            engine.update_production(old, new)
        })
    }

    pub fn delete_production_order(&self, id: &OrderId) -> anyhow::Result<ProductionReport> {
        self.delete_order(OrderKind::Production, id, |engine, old| {
            engine.delete_production(old)
        })
    }

    pub fn production_order(
        &self,
        id: &OrderId,
    ) -> anyhow::Result<Option<OrderSnapshot<OrderStatus>>> {
        Ok(self.store.load_order(OrderKind::Production, id)?)
    }
}
