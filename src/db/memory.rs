use alloy_primitives::Address;
use async_trait::async_trait;
use chrono::Utc;
use num_bigint::{BigInt, BigUint};
use num_traits::{Signed, Zero};
use std::collections::BTreeMap;
use std::sync::Mutex;

use crate::holders::HolderCursor;
use crate::indexer::HolderDeltas;

use super::models::{HolderRow, TrackedToken};
use super::store::{HolderQueries, IndexerStore, StoreError};

/// In-memory store with the same transactional contract as `PgStore`:
/// a batch either applies fully (deltas + cursor) or not at all. Backs the
/// test suites and `HOLDERS_INDEXER_ONCE` dry runs.
#[derive(Default)]
pub struct MemStore {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    tracked: BTreeMap<(u64, Address), TrackedToken>,
    balances: BTreeMap<(u64, Address), BTreeMap<Address, BigUint>>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Direct balance lookup for assertions.
    pub fn balance_of(&self, chain_id: u64, token: Address, holder: Address) -> Option<BigUint> {
        let inner = self.inner.lock().expect("mem store poisoned");
        inner
            .balances
            .get(&(chain_id, token))
            .and_then(|m| m.get(&holder))
            .cloned()
    }

    pub fn holder_count(&self, chain_id: u64, token: Address) -> usize {
        let inner = self.inner.lock().expect("mem store poisoned");
        inner
            .balances
            .get(&(chain_id, token))
            .map(|m| m.len())
            .unwrap_or(0)
    }
}

#[async_trait]
impl IndexerStore for MemStore {
    async fn list_tracked(&self, chain_id: u64) -> Result<Vec<TrackedToken>, StoreError> {
        let inner = self.inner.lock().expect("mem store poisoned");
        Ok(inner
            .tracked
            .values()
            .filter(|t| t.chain_id == chain_id)
            .cloned()
            .collect())
    }

    async fn get_cursor(
        &self,
        chain_id: u64,
        token: Address,
    ) -> Result<Option<TrackedToken>, StoreError> {
        let inner = self.inner.lock().expect("mem store poisoned");
        Ok(inner.tracked.get(&(chain_id, token)).cloned())
    }

    async fn apply_batch(
        &self,
        chain_id: u64,
        token: Address,
        deltas: &HolderDeltas,
        to_block: u64,
    ) -> Result<(), StoreError> {
        let mut guard = self.inner.lock().expect("mem store poisoned");
        let inner = &mut *guard;

        // Validate every delta before mutating anything, so a failing batch
        // leaves both balances and cursor untouched.
        let balances = inner.balances.entry((chain_id, token)).or_default();
        let mut updated: Vec<(Address, BigInt)> = Vec::with_capacity(deltas.len());
        for (holder, delta) in deltas {
            let existing = balances
                .get(holder)
                .map(|b| BigInt::from(b.clone()))
                .unwrap_or_else(BigInt::zero);
            let next = &existing + delta;
            if next.is_negative() {
                return Err(StoreError::NegativeBalance {
                    chain_id,
                    token,
                    holder: *holder,
                    existing,
                    delta: delta.clone(),
                });
            }
            updated.push((*holder, next));
        }

        for (holder, next) in updated {
            if next.is_zero() {
                balances.remove(&holder);
            } else {
                let (_, magnitude) = next.into_parts();
                balances.insert(holder, magnitude);
            }
        }

        let now = Utc::now();
        let entry = inner
            .tracked
            .entry((chain_id, token))
            .or_insert_with(|| TrackedToken {
                chain_id,
                token,
                from_block: None,
                to_block: None,
                error: None,
                created_at: now,
                updated_at: now,
            });
        entry.from_block = Some(to_block + 1);
        entry.to_block = Some(to_block);
        entry.updated_at = now;
        Ok(())
    }

    async fn enqueue_reindex(
        &self,
        chain_id: u64,
        token: Address,
        from_block: Option<u64>,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().expect("mem store poisoned");
        let now = Utc::now();
        let entry = inner
            .tracked
            .entry((chain_id, token))
            .or_insert_with(|| TrackedToken {
                chain_id,
                token,
                from_block: None,
                to_block: None,
                error: None,
                created_at: now,
                updated_at: now,
            });
        if from_block.is_some() {
            entry.from_block = from_block;
        }
        entry.error = None;
        entry.updated_at = now;
        Ok(())
    }

    async fn quarantine(
        &self,
        chain_id: u64,
        token: Address,
        reason: &str,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().expect("mem store poisoned");
        if let Some(entry) = inner.tracked.get_mut(&(chain_id, token)) {
            entry.error = Some(reason.to_string());
            entry.updated_at = Utc::now();
        }
        Ok(())
    }
}

#[async_trait]
impl HolderQueries for MemStore {
    async fn page(
        &self,
        chain_id: u64,
        token: Address,
        after: Option<&HolderCursor>,
        limit: i64,
    ) -> Result<Vec<HolderRow>, StoreError> {
        let inner = self.inner.lock().expect("mem store poisoned");
        let mut rows: Vec<HolderRow> = inner
            .balances
            .get(&(chain_id, token))
            .map(|m| {
                m.iter()
                    .filter(|(_, balance)| !balance.is_zero())
                    .map(|(holder, balance)| HolderRow {
                        holder: *holder,
                        balance: balance.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default();

        rows.sort_by(|a, b| b.balance.cmp(&a.balance).then(a.holder.cmp(&b.holder)));

        let rows = rows
            .into_iter()
            .filter(|row| match after {
                None => true,
                Some(cursor) => {
                    row.balance < cursor.balance
                        || (row.balance == cursor.balance && row.holder > cursor.holder)
                }
            })
            .take(limit.max(0) as usize)
            .collect();
        Ok(rows)
    }

    async fn preceding_count(
        &self,
        chain_id: u64,
        token: Address,
        cursor: &HolderCursor,
    ) -> Result<u64, StoreError> {
        let inner = self.inner.lock().expect("mem store poisoned");
        let count = inner
            .balances
            .get(&(chain_id, token))
            .map(|m| {
                m.iter()
                    .filter(|(_, balance)| !balance.is_zero())
                    .filter(|(holder, balance)| {
                        **balance > cursor.balance
                            || (**balance == cursor.balance && **holder <= cursor.holder)
                    })
                    .count()
            })
            .unwrap_or(0);
        Ok(count as u64)
    }

    async fn total_supply(&self, chain_id: u64, token: Address) -> Result<BigUint, StoreError> {
        let inner = self.inner.lock().expect("mem store poisoned");
        Ok(inner
            .balances
            .get(&(chain_id, token))
            .map(|m| m.values().sum())
            .unwrap_or_default())
    }
}
