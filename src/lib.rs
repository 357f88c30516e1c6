//! Order lifecycle reconciliation.
//!
//! Whenever a sales, purchase or production order is created, edited or
//! deleted, [`engine::ReconcileEngine`] compares the previously persisted
//! snapshot with the requested one, works out which status edges fired and
//! which material quantities changed, and applies the matching inventory
//! adjustments and account postings exactly once.

pub mod accessor;
pub mod config;
pub mod diff;
pub mod engine;
pub mod error;
pub mod inventory;
pub mod memory;
pub mod payment;
pub mod service;
pub mod status;
pub mod store;
pub mod telemetry;
pub mod types;
pub mod utils;

pub use engine::{OrderKind, ReconcileEngine, ReconcileReport};
pub use error::{AccessError, ReconcileError};
