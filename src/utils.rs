//! Posting identifiers
//!
//! A posting id is a uuid7 (so ids sort by creation time) encoded as bech32m
//! under the `post_` prefix, e.g. `post_1qyq...`.
use crate::error::ReconcileError;
use bech32::{Bech32m, Hrp};
use uuid7::uuid7;

pub const POSTING_ID_PREFIX: &str = "post_";

pub fn new_posting_id() -> Result<String, ReconcileError> {
    let identifier = |e: &dyn std::fmt::Display| ReconcileError::Identifier(e.to_string());

    let hrp = Hrp::parse(POSTING_ID_PREFIX).map_err(|e| identifier(&e))?;
    bech32::encode::<Bech32m>(hrp, uuid7().as_bytes()).map_err(|e| identifier(&e))
}
