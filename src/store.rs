//! sled-backed accessors and order snapshot storage
//!
//! Records are CBOR encoded. Postings are keyed by the sha256 digest of their
//! encoding, so the posting tree is an append-only, content-addressed log.
//!
//! [`SledStore::transaction`] runs a unit of work against all four trees at
//! once; nothing it wrote survives an error.
use crate::accessor::{AccountAccessor, MaterialAccessor, UpdateOutcome};
use crate::engine::OrderKind;
use crate::error::{AccessError, ReconcileError};
use crate::types::{Account, AccountId, Material, MaterialId, OrderId, OrderSnapshot, Posting};
use sled::transaction::{ConflictableTransactionError, TransactionError, TransactionalTree};
use sled::{Db, Transactional, Tree};
use std::sync::Arc;

#[derive(Clone)]
pub struct SledStore {
    instance: Arc<Db>,
    materials: Tree,
    accounts: Tree,
    postings: Tree,
    orders: Tree,
}

fn order_key(kind: OrderKind, id: &OrderId) -> String {
    format!("{kind}/{id}")
}

impl SledStore {
    pub fn new(instance: Arc<Db>) -> Result<Self, AccessError> {
        Ok(Self {
            materials: instance.open_tree("materials")?,
            accounts: instance.open_tree("accounts")?,
            postings: instance.open_tree("postings")?,
            orders: instance.open_tree("orders")?,
            instance,
        })
    }

    pub fn put_material(&self, material: &Material) -> Result<(), AccessError> {
        self.materials
            .insert(material.id.as_str(), minicbor::to_vec(material)?)?;
        Ok(())
    }

    pub fn put_account(&self, account: &Account) -> Result<(), AccessError> {
        self.accounts
            .insert(account.id.as_str(), minicbor::to_vec(account)?)?;
        Ok(())
    }

    pub fn load_order<S>(
        &self,
        kind: OrderKind,
        id: &OrderId,
    ) -> Result<Option<OrderSnapshot<S>>, AccessError>
    where
        OrderSnapshot<S>: for<'b> minicbor::Decode<'b, ()>,
    {
        match self.orders.get(order_key(kind, id))? {
            Some(bytes) => Ok(Some(minicbor::decode(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn save_order<S>(&self, kind: OrderKind, order: &OrderSnapshot<S>) -> Result<(), AccessError>
    where
        OrderSnapshot<S>: minicbor::Encode<()>,
    {
        self.orders
            .insert(order_key(kind, &order.id), minicbor::to_vec(order)?)?;
        Ok(())
    }

    pub fn remove_order(&self, kind: OrderKind, id: &OrderId) -> Result<(), AccessError> {
        self.orders.remove(order_key(kind, id))?;
        Ok(())
    }

    /// Every posting written for `order`, in no particular order.
    pub fn postings_for(&self, order: &OrderId) -> Result<Vec<Posting>, AccessError> {
        let mut found = vec![];
        for entry in self.postings.iter() {
            let (_, bytes) = entry?;
            let posting: Posting = minicbor::decode(&bytes)?;
            if &posting.order == order {
                found.push(posting);
            }
        }
        Ok(found)
    }

    pub fn flush(&self) -> Result<(), AccessError> {
        self.instance.flush()?;
        Ok(())
    }

    /// Runs `work` atomically over the material, account, posting and order
    /// trees. sled may call `work` again after a conflict.
    pub fn transaction<R>(
        &self,
        work: impl Fn(&StoreTransaction<'_>) -> Result<R, ReconcileError>,
    ) -> Result<R, ReconcileError> {
        let trees = (&self.materials, &self.accounts, &self.postings, &self.orders);

        trees
            .transaction(|(materials, accounts, postings, orders)| {
                let tx = StoreTransaction {
                    materials,
                    accounts,
                    postings,
                    orders,
                };
                work(&tx).map_err(|err| match err {
                    // conflicts and storage failures go back to sled
                    ReconcileError::Access(AccessError::Transaction(inner)) => inner.into(),
                    other => ConflictableTransactionError::Abort(other),
                })
            })
            .map_err(|err| match err {
                TransactionError::Abort(err) => err,
                TransactionError::Storage(err) => AccessError::from(err).into(),
            })
    }
}

fn unchanged(stored: &[u8], account: &Account) -> Result<bool, AccessError> {
    // compare values, the encoding keeps the decimal scale
    let stored: Account = minicbor::decode(stored)?;
    Ok(&stored == account)
}

impl MaterialAccessor for SledStore {
    fn get_material(&self, id: &MaterialId) -> Result<Material, AccessError> {
        let bytes = self
            .materials
            .get(id.as_str())?
            .ok_or_else(|| AccessError::MaterialNotFound(id.clone()))?;
        Ok(minicbor::decode(&bytes)?)
    }

    fn update_material(&self, material: &Material) -> Result<(), AccessError> {
        if !self.materials.contains_key(material.id.as_str())? {
            return Err(AccessError::MaterialNotFound(material.id.clone()));
        }
        self.put_material(material)
    }
}

impl AccountAccessor for SledStore {
    fn get_account(&self, id: &AccountId) -> Result<Account, AccessError> {
        let bytes = self
            .accounts
            .get(id.as_str())?
            .ok_or_else(|| AccessError::AccountNotFound(id.clone()))?;
        Ok(minicbor::decode(&bytes)?)
    }

    fn update_account(&self, account: &Account) -> Result<UpdateOutcome, AccessError> {
        let encoded = minicbor::to_vec(account)?;
        let stored = self
            .accounts
            .get(account.id.as_str())?
            .ok_or_else(|| AccessError::AccountNotFound(account.id.clone()))?;

        if unchanged(&stored, account)? {
            return Ok(UpdateOutcome::Unchanged);
        }
        self.accounts.insert(account.id.as_str(), encoded)?;
        Ok(UpdateOutcome::Updated)
    }

    fn append_posting(&self, posting: &Posting) -> Result<(), AccessError> {
        let (hash, cbor) = posting.build()?;
        self.postings.insert(hash.as_bytes(), cbor)?;
        Ok(())
    }
}

/// View of a [`SledStore`] inside [`SledStore::transaction`].
pub struct StoreTransaction<'t> {
    materials: &'t TransactionalTree,
    accounts: &'t TransactionalTree,
    postings: &'t TransactionalTree,
    orders: &'t TransactionalTree,
}

impl StoreTransaction<'_> {
    pub fn load_order<S>(
        &self,
        kind: OrderKind,
        id: &OrderId,
    ) -> Result<Option<OrderSnapshot<S>>, AccessError>
    where
        OrderSnapshot<S>: for<'b> minicbor::Decode<'b, ()>,
    {
        match self.orders.get(order_key(kind, id).as_bytes())? {
            Some(bytes) => Ok(Some(minicbor::decode(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn save_order<S>(&self, kind: OrderKind, order: &OrderSnapshot<S>) -> Result<(), AccessError>
    where
        OrderSnapshot<S>: minicbor::Encode<()>,
    {
        self.orders
            .insert(order_key(kind, &order.id).as_bytes(), minicbor::to_vec(order)?)?;
        Ok(())
    }

    pub fn remove_order(&self, kind: OrderKind, id: &OrderId) -> Result<(), AccessError> {
        self.orders.remove(order_key(kind, id).as_bytes())?;
        Ok(())
    }
}

impl MaterialAccessor for StoreTransaction<'_> {
    fn get_material(&self, id: &MaterialId) -> Result<Material, AccessError> {
        let bytes = self
            .materials
            .get(id.as_str())?
            .ok_or_else(|| AccessError::MaterialNotFound(id.clone()))?;
        Ok(minicbor::decode(&bytes)?)
    }

    fn update_material(&self, material: &Material) -> Result<(), AccessError> {
        if self.materials.get(material.id.as_str())?.is_none() {
            return Err(AccessError::MaterialNotFound(material.id.clone()));
        }
        self.materials
            .insert(material.id.as_str(), minicbor::to_vec(material)?)?;
        Ok(())
    }
}

impl AccountAccessor for StoreTransaction<'_> {
    fn get_account(&self, id: &AccountId) -> Result<Account, AccessError> {
        let bytes = self
            .accounts
            .get(id.as_str())?
            .ok_or_else(|| AccessError::AccountNotFound(id.clone()))?;
        Ok(minicbor::decode(&bytes)?)
    }

    fn update_account(&self, account: &Account) -> Result<UpdateOutcome, AccessError> {
        let stored = self
            .accounts
            .get(account.id.as_str())?
            .ok_or_else(|| AccessError::AccountNotFound(account.id.clone()))?;

        if unchanged(&stored, account)? {
            return Ok(UpdateOutcome::Unchanged);
        }
        self.accounts
            .insert(account.id.as_str(), minicbor::to_vec(account)?)?;
        Ok(UpdateOutcome::Updated)
    }

    fn append_posting(&self, posting: &Posting) -> Result<(), AccessError> {
        let (hash, cbor) = posting.build()?;
        self.postings.insert(hash.as_bytes(), cbor)?;
        Ok(())
    }
}
