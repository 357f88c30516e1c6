//! In-memory accessors for tests and experiments
use crate::accessor::{AccountAccessor, MaterialAccessor, UpdateOutcome};
use crate::error::AccessError;
use crate::types::{Account, AccountId, Material, MaterialId, Posting};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Default)]
struct Tables {
    materials: HashMap<MaterialId, Material>,
    accounts: HashMap<AccountId, Account>,
    postings: Vec<Posting>,
    // remaining successful material writes before every further one fails
    material_write_budget: Option<usize>,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Tables> {
        // a poisoned table is still consistent: every write is a single insert
        self.tables.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn put_material(&self, material: Material) {
        self.lock().materials.insert(material.id.clone(), material);
    }

    pub fn put_account(&self, account: Account) {
        self.lock().accounts.insert(account.id.clone(), account);
    }

    pub fn material(&self, id: &MaterialId) -> Option<Material> {
        self.lock().materials.get(id).cloned()
    }

    pub fn inventory(&self, id: &MaterialId) -> Option<i64> {
        self.lock().materials.get(id).map(|m| m.inventory)
    }

    pub fn account(&self, id: &AccountId) -> Option<Account> {
        self.lock().accounts.get(id).cloned()
    }

    pub fn postings(&self) -> Vec<Posting> {
        self.lock().postings.clone()
    }

    /// Lets `writes` more material updates succeed, then fails every later one.
    pub fn fail_material_updates_after(&self, writes: usize) {
        self.lock().material_write_budget = Some(writes);
    }
}

impl MaterialAccessor for MemoryStore {
    fn get_material(&self, id: &MaterialId) -> Result<Material, AccessError> {
        self.material(id)
            .ok_or_else(|| AccessError::MaterialNotFound(id.clone()))
    }

    fn update_material(&self, material: &Material) -> Result<(), AccessError> {
        let mut tables = self.lock();
        if let Some(budget) = tables.material_write_budget.as_mut() {
            if *budget == 0 {
                return Err(AccessError::Storage(format!(
                    "write to material {} rejected",
                    material.id
                )));
            }
            *budget -= 1;
        }
        if !tables.materials.contains_key(&material.id) {
            return Err(AccessError::MaterialNotFound(material.id.clone()));
        }
        tables.materials.insert(material.id.clone(), material.clone());
        Ok(())
    }
}

impl AccountAccessor for MemoryStore {
    fn get_account(&self, id: &AccountId) -> Result<Account, AccessError> {
        self.account(id)
            .ok_or_else(|| AccessError::AccountNotFound(id.clone()))
    }

    fn update_account(&self, account: &Account) -> Result<UpdateOutcome, AccessError> {
        let mut tables = self.lock();
        let outcome = match tables.accounts.get(&account.id) {
            None => return Err(AccessError::AccountNotFound(account.id.clone())),
            Some(stored) if stored == account => UpdateOutcome::Unchanged,
            Some(_) => UpdateOutcome::Updated,
        };
        if outcome == UpdateOutcome::Updated {
            tables.accounts.insert(account.id.clone(), account.clone());
        }
        Ok(outcome)
    }

    fn append_posting(&self, posting: &Posting) -> Result<(), AccessError> {
        self.lock().postings.push(posting.clone());
        Ok(())
    }
}
