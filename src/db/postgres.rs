use alloy_primitives::Address;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use num_bigint::{BigInt, BigUint};
use num_traits::{Signed, Zero};
use sqlx::{PgPool, Row};

use crate::holders::HolderCursor;
use crate::indexer::HolderDeltas;

use super::models::{address_hex, parse_address, HolderRow, TrackedToken};
use super::store::{HolderQueries, IndexerStore, StoreError};

/// Postgres-backed cursor + holder store. Balances live in NUMERIC(78,0)
/// columns and travel as decimal text; addresses as canonical lower-hex.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn row_to_tracked(row: &sqlx::postgres::PgRow) -> Result<TrackedToken, StoreError> {
    let chain_id: i64 = row.try_get("chain_id")?;
    let token: String = row.try_get("token")?;
    let from_block: Option<i64> = row.try_get("from_block")?;
    let to_block: Option<i64> = row.try_get("to_block")?;
    let error: Option<String> = row.try_get("error")?;
    let created_at: DateTime<Utc> = row.try_get("created_at")?;
    let updated_at: DateTime<Utc> = row.try_get("updated_at")?;

    let token = parse_address(&token)
        .ok_or_else(|| StoreError::Corrupt(format!("bad token address {token}")))?;
    Ok(TrackedToken {
        chain_id: chain_id as u64,
        token,
        from_block: from_block.map(|b| b as u64),
        to_block: to_block.map(|b| b as u64),
        error,
        created_at,
        updated_at,
    })
}

fn parse_balance(text: &str) -> Result<BigUint, StoreError> {
    BigUint::parse_bytes(text.as_bytes(), 10)
        .ok_or_else(|| StoreError::Corrupt(format!("bad balance {text}")))
}

// RETURNING may legitimately carry a transient negative value on the way to
// a rollback, so it parses as signed.
fn parse_signed(text: &str) -> Result<BigInt, StoreError> {
    BigInt::parse_bytes(text.as_bytes(), 10)
        .ok_or_else(|| StoreError::Corrupt(format!("bad balance {text}")))
}

#[async_trait]
impl IndexerStore for PgStore {
    async fn list_tracked(&self, chain_id: u64) -> Result<Vec<TrackedToken>, StoreError> {
        let rows = sqlx::query(
            "SELECT chain_id, token, from_block, to_block, error, created_at, updated_at
             FROM tracked_tokens
             WHERE chain_id = $1
             ORDER BY created_at, token",
        )
        .bind(chain_id as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_tracked).collect()
    }

    async fn get_cursor(
        &self,
        chain_id: u64,
        token: Address,
    ) -> Result<Option<TrackedToken>, StoreError> {
        let row = sqlx::query(
            "SELECT chain_id, token, from_block, to_block, error, created_at, updated_at
             FROM tracked_tokens
             WHERE chain_id = $1 AND token = $2",
        )
        .bind(chain_id as i64)
        .bind(address_hex(&token))
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_tracked).transpose()
    }

    async fn apply_batch(
        &self,
        chain_id: u64,
        token: Address,
        deltas: &HolderDeltas,
        to_block: u64,
    ) -> Result<(), StoreError> {
        let token_hex = address_hex(&token);
        let mut tx = self.pool.begin().await?;

        // Deltas arrive address-sorted, which keeps the row lock order
        // deterministic across writers.
        for (holder, delta) in deltas {
            let holder_hex = address_hex(holder);
            // One atomic read-modify-write per holder: the conflict arm
            // applies the delta under the row lock. A first-ever credit has
            // no row a SELECT ... FOR UPDATE could lock, so the increment
            // must not be split across statements.
            let updated_text: String = sqlx::query_scalar(
                "INSERT INTO token_holders (chain_id, token, holder, balance)
                 VALUES ($1, $2, $3, $4::numeric)
                 ON CONFLICT (chain_id, token, holder)
                 DO UPDATE SET balance = token_holders.balance + EXCLUDED.balance
                 RETURNING balance::text",
            )
            .bind(chain_id as i64)
            .bind(&token_hex)
            .bind(&holder_hex)
            .bind(delta.to_string())
            .fetch_one(&mut *tx)
            .await?;

            let updated = parse_signed(&updated_text)?;

            if updated.is_negative() {
                // Dropping the transaction rolls everything back, the
                // transient negative row and the cursor included.
                return Err(StoreError::NegativeBalance {
                    chain_id,
                    token,
                    holder: *holder,
                    existing: &updated - delta,
                    delta: delta.clone(),
                });
            }

            if updated.is_zero() {
                sqlx::query(
                    "DELETE FROM token_holders
                     WHERE chain_id = $1 AND token = $2 AND holder = $3",
                )
                .bind(chain_id as i64)
                .bind(&token_hex)
                .bind(&holder_hex)
                .execute(&mut *tx)
                .await?;
            }
        }

        sqlx::query(
            "INSERT INTO tracked_tokens (chain_id, token, from_block, to_block)
             VALUES ($1, $2, $3, $4)
             ON CONFLICT (chain_id, token)
             DO UPDATE SET from_block = $3, to_block = $4, updated_at = CURRENT_TIMESTAMP",
        )
        .bind(chain_id as i64)
        .bind(&token_hex)
        .bind((to_block + 1) as i64)
        .bind(to_block as i64)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn enqueue_reindex(
        &self,
        chain_id: u64,
        token: Address,
        from_block: Option<u64>,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO tracked_tokens (chain_id, token, from_block)
             VALUES ($1, $2, $3)
             ON CONFLICT (chain_id, token)
             DO UPDATE SET
                from_block = COALESCE($3, tracked_tokens.from_block),
                error = NULL,
                updated_at = CURRENT_TIMESTAMP",
        )
        .bind(chain_id as i64)
        .bind(address_hex(&token))
        .bind(from_block.map(|b| b as i64))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn quarantine(
        &self,
        chain_id: u64,
        token: Address,
        reason: &str,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "UPDATE tracked_tokens
             SET error = $3, updated_at = CURRENT_TIMESTAMP
             WHERE chain_id = $1 AND token = $2",
        )
        .bind(chain_id as i64)
        .bind(address_hex(&token))
        .bind(reason)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl HolderQueries for PgStore {
    async fn page(
        &self,
        chain_id: u64,
        token: Address,
        after: Option<&HolderCursor>,
        limit: i64,
    ) -> Result<Vec<HolderRow>, StoreError> {
        let rows = match after {
            None => {
                sqlx::query(
                    "SELECT holder, balance::text AS balance FROM token_holders
                     WHERE chain_id = $1 AND token = $2 AND balance > 0
                     ORDER BY balance DESC, holder ASC
                     LIMIT $3",
                )
                .bind(chain_id as i64)
                .bind(address_hex(&token))
                .bind(limit)
                .fetch_all(&self.pool)
                .await?
            }
            Some(cursor) => {
                sqlx::query(
                    "SELECT holder, balance::text AS balance FROM token_holders
                     WHERE chain_id = $1 AND token = $2 AND balance > 0
                       AND (balance < $3::numeric
                            OR (balance = $3::numeric AND holder > $4))
                     ORDER BY balance DESC, holder ASC
                     LIMIT $5",
                )
                .bind(chain_id as i64)
                .bind(address_hex(&token))
                .bind(cursor.balance.to_string())
                .bind(address_hex(&cursor.holder))
                .bind(limit)
                .fetch_all(&self.pool)
                .await?
            }
        };

        rows.iter()
            .map(|row| {
                let holder: String = row.try_get("holder")?;
                let balance: String = row.try_get("balance")?;
                let holder = parse_address(&holder)
                    .ok_or_else(|| StoreError::Corrupt(format!("bad holder address {holder}")))?;
                Ok(HolderRow {
                    holder,
                    balance: parse_balance(&balance)?,
                })
            })
            .collect()
    }

    async fn preceding_count(
        &self,
        chain_id: u64,
        token: Address,
        cursor: &HolderCursor,
    ) -> Result<u64, StoreError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM token_holders
             WHERE chain_id = $1 AND token = $2 AND balance > 0
               AND (balance > $3::numeric
                    OR (balance = $3::numeric AND holder <= $4))",
        )
        .bind(chain_id as i64)
        .bind(address_hex(&token))
        .bind(cursor.balance.to_string())
        .bind(address_hex(&cursor.holder))
        .fetch_one(&self.pool)
        .await?;
        Ok(count as u64)
    }

    async fn total_supply(&self, chain_id: u64, token: Address) -> Result<BigUint, StoreError> {
        let total: String = sqlx::query_scalar(
            "SELECT COALESCE(SUM(balance), 0)::text FROM token_holders
             WHERE chain_id = $1 AND token = $2",
        )
        .bind(chain_id as i64)
        .bind(address_hex(&token))
        .fetch_one(&self.pool)
        .await?;
        parse_balance(&total)
    }
}
