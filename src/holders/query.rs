use alloy_primitives::Address;
use num_bigint::BigUint;
use num_traits::{ToPrimitive, Zero};
use serde::Serialize;
use std::sync::Arc;

use crate::config::ChainCatalogue;
use crate::db::models::{address_hex, IndexingStatus};
use crate::db::{HolderQueries, IndexerStore, StoreError};

use super::cursor::HolderCursor;

pub const DEFAULT_PAGE_SIZE: i64 = 25;
pub const MAX_PAGE_SIZE: i64 = 100;

/// pct carries five fractional digits of percent, computed in integers.
const PCT_SCALE: u64 = 10_000_000;

#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    #[error("unsupported chain {0}")]
    UnsupportedChain(u64),

    #[error("invalid pagination cursor")]
    InvalidCursor,

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Serialize)]
pub struct HolderEntry {
    /// 1-based global rank under (balance DESC, holder ASC).
    pub rank: u64,
    pub holder: String,
    /// Exact balance as a decimal string.
    pub balance: String,
    /// Share of the token's indexed supply, in percent.
    pub pct: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HoldersPage {
    pub items: Vec<HolderEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
    pub status: IndexingStatus,
}

/// Read path over the materialised holder table. Never mutates anything;
/// reads may lag the pollers but always observe a consistent batch boundary.
pub struct HolderQueryEngine {
    holders: Arc<dyn HolderQueries>,
    cursors: Arc<dyn IndexerStore>,
    chains: Arc<ChainCatalogue>,
}

impl HolderQueryEngine {
    pub fn new(
        holders: Arc<dyn HolderQueries>,
        cursors: Arc<dyn IndexerStore>,
        chains: Arc<ChainCatalogue>,
    ) -> Self {
        Self {
            holders,
            cursors,
            chains,
        }
    }

    pub async fn get_holders(
        &self,
        chain_id: u64,
        token: Address,
        cursor: Option<&str>,
        limit: Option<i64>,
    ) -> Result<HoldersPage, QueryError> {
        if !self.chains.is_supported(chain_id) {
            return Err(QueryError::UnsupportedChain(chain_id));
        }

        let limit = limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
        let after: Option<HolderCursor> = cursor
            .map(|c| c.parse())
            .transpose()
            .map_err(|_| QueryError::InvalidCursor)?;

        let rows = self
            .holders
            .page(chain_id, token, after.as_ref(), limit)
            .await?;

        let rank_start = match &after {
            None => 1,
            Some(cursor) => {
                self.holders
                    .preceding_count(chain_id, token, cursor)
                    .await?
                    + 1
            }
        };

        let total_supply = self.holders.total_supply(chain_id, token).await?;

        let items: Vec<HolderEntry> = rows
            .iter()
            .enumerate()
            .map(|(offset, row)| HolderEntry {
                rank: rank_start + offset as u64,
                holder: address_hex(&row.holder),
                balance: row.balance.to_string(),
                pct: pct_of(&row.balance, &total_supply),
            })
            .collect();

        let next_cursor = if rows.len() as i64 == limit {
            rows.last()
                .map(|row| HolderCursor::new(row.balance.clone(), row.holder).to_string())
        } else {
            None
        };

        let status = match self.cursors.get_cursor(chain_id, token).await? {
            Some(tracked) if tracked.to_block.is_some() => IndexingStatus::Ok,
            _ => IndexingStatus::Indexing,
        };

        Ok(HoldersPage {
            items,
            next_cursor,
            status,
        })
    }
}

/// balance / total × 100, floored to five fractional digits. Integer
/// arithmetic end to end so giant supplies don't lose precision in floats.
fn pct_of(balance: &BigUint, total: &BigUint) -> f64 {
    if total.is_zero() {
        return 0.0;
    }
    let scaled = (balance * BigUint::from(PCT_SCALE)) / total;
    // scaled <= PCT_SCALE whenever balance <= total, so this fits u64.
    scaled.to_u64().map(|s| s as f64 / 100_000.0).unwrap_or(100.0)
}
