use alloy_primitives::Address;
use async_trait::async_trait;
use num_bigint::{BigInt, BigUint};

use crate::holders::HolderCursor;
use crate::indexer::HolderDeltas;

use super::models::{HolderRow, TrackedToken};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Applying a delta would take a holder's balance below zero. The whole
    /// batch aborts and the token is a candidate for quarantine.
    #[error("negative balance for {holder} (chain {chain_id}, token {token}): existing {existing}, delta {delta}")]
    NegativeBalance {
        chain_id: u64,
        token: Address,
        holder: Address,
        existing: BigInt,
        delta: BigInt,
    },

    #[error("database unavailable: {0}")]
    Unavailable(String),

    #[error("corrupt row: {0}")]
    Corrupt(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        Self::Unavailable(e.to_string())
    }
}

/// Write path used by the chain pollers and the admin reindex queue.
#[async_trait]
pub trait IndexerStore: Send + Sync {
    async fn list_tracked(&self, chain_id: u64) -> Result<Vec<TrackedToken>, StoreError>;

    async fn get_cursor(
        &self,
        chain_id: u64,
        token: Address,
    ) -> Result<Option<TrackedToken>, StoreError>;

    /// Applies one batch's deltas and advances the cursor to
    /// `(to_block + 1, to_block)`, atomically. Either every mutation commits
    /// together or none do; a would-be-negative balance aborts with
    /// `NegativeBalance` and leaves the cursor untouched.
    async fn apply_batch(
        &self,
        chain_id: u64,
        token: Address,
        deltas: &HolderDeltas,
        to_block: u64,
    ) -> Result<(), StoreError>;

    /// Inserts the token if absent; otherwise rewinds `from_block` (when
    /// given) and clears any quarantine marker. `to_block` is never touched.
    async fn enqueue_reindex(
        &self,
        chain_id: u64,
        token: Address,
        from_block: Option<u64>,
    ) -> Result<(), StoreError>;

    /// Marks a token so pollers skip it until an admin reindex.
    async fn quarantine(
        &self,
        chain_id: u64,
        token: Address,
        reason: &str,
    ) -> Result<(), StoreError>;
}

/// Read path behind the holder query engine. Only positive balances are
/// visible here.
#[async_trait]
pub trait HolderQueries: Send + Sync {
    /// Up to `limit` rows in (balance DESC, holder ASC) order, strictly
    /// after `after` when present.
    async fn page(
        &self,
        chain_id: u64,
        token: Address,
        after: Option<&HolderCursor>,
        limit: i64,
    ) -> Result<Vec<HolderRow>, StoreError>;

    /// Number of rows at or before `cursor` under the pagination ordering;
    /// feeds the 1-based rank of the following row.
    async fn preceding_count(
        &self,
        chain_id: u64,
        token: Address,
        cursor: &HolderCursor,
    ) -> Result<u64, StoreError>;

    async fn total_supply(&self, chain_id: u64, token: Address) -> Result<BigUint, StoreError>;
}
