use crate::types::{AccountId, MaterialId, OrderId};
use sled::transaction::UnabortableTransactionError;

/// Failures raised by material and account accessors.
#[derive(thiserror::Error, Debug)]
pub enum AccessError {
    #[error("Material {0} does not exist")]
    MaterialNotFound(MaterialId),
    #[error("Account {0} does not exist")]
    AccountNotFound(AccountId),
    #[error("Storage failure: {0}")]
    Storage(String),
    #[error("Failed to encode or decode a record: {0}")]
    Codec(String),
    /// sled reports a conflict here so the transaction can be retried.
    #[error("Transaction failed: {0}")]
    Transaction(UnabortableTransactionError),
}

#[derive(thiserror::Error, Debug)]
pub enum ReconcileError {
    #[error(transparent)]
    Access(#[from] AccessError),
    #[error("Order {0} reached a payment status but references no account")]
    MissingAccount(OrderId),
    #[error("Snapshots belong to different orders: expected {expected}, found {found}")]
    OrderMismatch { expected: OrderId, found: OrderId },
    #[error("Failed to generate identifier: {0}")]
    Identifier(String),
    #[error("Quantity of material {0} does not fit the stock counter")]
    QuantityOverflow(MaterialId),
    #[error("Order {0} already exists")]
    DuplicateOrder(OrderId),
    #[error("Order {0} does not exist")]
    UnknownOrder(OrderId),
}

impl From<sled::Error> for AccessError {
    fn from(value: sled::Error) -> Self {
        AccessError::Storage(value.to_string())
    }
}

impl From<minicbor::decode::Error> for AccessError {
    fn from(value: minicbor::decode::Error) -> Self {
        AccessError::Codec(value.to_string())
    }
}

impl<E: std::fmt::Display> From<minicbor::encode::Error<E>> for AccessError {
    fn from(value: minicbor::encode::Error<E>) -> Self {
        AccessError::Codec(value.to_string())
    }
}

impl From<UnabortableTransactionError> for AccessError {
    fn from(value: UnabortableTransactionError) -> Self {
        AccessError::Transaction(value)
    }
}
