//! Contracts the engine calls into for material and account state
//!
//! The engine never stores anything itself. Callers hand it implementations of
//! these traits; see [`crate::memory::MemoryStore`] and [`crate::store::SledStore`].
use crate::error::AccessError;
use crate::types::{Account, AccountId, Material, MaterialId, Posting};

/// Result of a write that may legitimately change nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    Updated,
    Unchanged,
}

pub trait MaterialAccessor {
    fn get_material(&self, id: &MaterialId) -> Result<Material, AccessError>;
    fn update_material(&self, material: &Material) -> Result<(), AccessError>;
}

pub trait AccountAccessor {
    fn get_account(&self, id: &AccountId) -> Result<Account, AccessError>;
    /// Returns [`UpdateOutcome::Unchanged`] when the stored account already equals `account`.
    fn update_account(&self, account: &Account) -> Result<UpdateOutcome, AccessError>;
    fn append_posting(&self, posting: &Posting) -> Result<(), AccessError>;
}
