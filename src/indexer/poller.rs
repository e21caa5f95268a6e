use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::{ChainConfig, ChainPollerSettings, PollerMode};
use crate::db::models::address_hex;
use crate::db::{IndexerStore, StoreError, TrackedToken};
use crate::eth_rpc::{EthRpc, LogFilter, RpcError};
use crate::metrics;

use super::aggregator::aggregate;
use super::decoder::{decode_transfers, TRANSFER_TOPIC};
use super::span::SpanController;
use super::status::{ChainProgress, StatusBoard, TokenProgress};

/// A failed batch is retried with a shrunken span at most this many times
/// before the range error surfaces.
pub const MAX_SPAN_RETRIES: u32 = 4;
const SPAN_RETRY_DELAY: Duration = Duration::from_millis(300);

/// Consecutive database failures tolerated before the poller gives up and
/// lets the supervisor restart the process.
const MAX_DB_FAILURES: u32 = 10;

#[derive(Debug, thiserror::Error)]
pub enum PollError {
    #[error(transparent)]
    Rpc(#[from] RpcError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Outcome of one pass over a chain's tracked tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassOutcome {
    /// At least one token advanced its cursor.
    Progressed,
    /// Every token was already caught up (or skipped).
    Idle,
}

/// Per-chain control loop: advances each tracked token's cursor through
/// bounded eth_getLogs windows and applies the resulting balance deltas.
/// One poller per chain; tokens within the chain are processed round-robin
/// so a single writer touches any (chain, token) pair.
pub struct ChainPoller {
    chain: ChainConfig,
    settings: ChainPollerSettings,
    rpc: Arc<dyn EthRpc>,
    store: Arc<dyn IndexerStore>,
    span: SpanController,
    status: StatusBoard,
    cancel: CancellationToken,
    db_failures: u32,
}

impl ChainPoller {
    pub fn new(
        chain: ChainConfig,
        settings: ChainPollerSettings,
        rpc: Arc<dyn EthRpc>,
        store: Arc<dyn IndexerStore>,
        status: StatusBoard,
        cancel: CancellationToken,
    ) -> Self {
        let span = SpanController::new(chain.max_span);
        Self {
            chain,
            settings,
            rpc,
            store,
            span,
            status,
            cancel,
            db_failures: 0,
        }
    }

    /// Swaps in a fresh span controller; span memory is per-poller state.
    pub fn reset_span_controller(&mut self) {
        self.span = SpanController::new(self.chain.max_span);
    }

    pub async fn run(mut self) -> anyhow::Result<()> {
        info!(
            chain_id = self.chain.chain_id,
            chain = self.chain.name,
            mode = self.settings.mode.as_str(),
            "chain poller starting"
        );

        loop {
            if self.cancel.is_cancelled() {
                break;
            }

            let outcome = match self.run_pass().await {
                Ok(outcome) => outcome,
                Err(PollError::Rpc(RpcError::RateLimited { retry_after })) => {
                    warn!(
                        chain_id = self.chain.chain_id,
                        retry_after_ms = retry_after.as_millis() as u64,
                        "rate limited, backing off"
                    );
                    self.sleep(retry_after).await;
                    continue;
                }
                Err(PollError::Rpc(err)) => {
                    warn!(chain_id = self.chain.chain_id, error = %err, "rpc failure, backing off");
                    self.sleep(Duration::from_millis(self.settings.backoff_ms)).await;
                    continue;
                }
                Err(PollError::Store(err)) => {
                    self.db_failures += 1;
                    error!(
                        chain_id = self.chain.chain_id,
                        failures = self.db_failures,
                        error = %err,
                        "database failure in poller pass"
                    );
                    if self.db_failures >= MAX_DB_FAILURES {
                        anyhow::bail!(
                            "chain {} poller giving up after {} database failures",
                            self.chain.chain_id,
                            self.db_failures
                        );
                    }
                    self.sleep(Duration::from_millis(self.settings.backoff_ms)).await;
                    continue;
                }
            };
            self.db_failures = 0;

            if self.settings.once {
                info!(chain_id = self.chain.chain_id, "single pass complete, exiting");
                break;
            }
            match (self.settings.mode, outcome) {
                (PollerMode::Backfill, PassOutcome::Idle) => {
                    info!(chain_id = self.chain.chain_id, "backfill caught up, exiting");
                    break;
                }
                (_, PassOutcome::Idle) => {
                    self.sleep(Duration::from_millis(self.settings.interval_ms)).await;
                }
                (_, PassOutcome::Progressed) => {}
            }
        }

        info!(chain_id = self.chain.chain_id, "chain poller stopped");
        Ok(())
    }

    /// One pass: fetch the confirmed tip, then give every live token a
    /// single batch. Public so the once-mode runner and tests can drive
    /// passes directly.
    pub async fn run_pass(&mut self) -> Result<PassOutcome, PollError> {
        let head = self.rpc.get_block_number().await?;
        let mut tip = head.saturating_sub(self.settings.confirmations);
        if self.settings.mode == PollerMode::Backfill {
            if let Some(target) = self.settings.target_block {
                tip = tip.min(target);
            }
        }
        metrics::record_chain_tip(self.chain.chain_id, tip);

        let tokens = self.store.list_tracked(self.chain.chain_id).await?;
        let mut outcome = PassOutcome::Idle;

        for token in &tokens {
            if self.cancel.is_cancelled() {
                break;
            }
            if token.is_quarantined() {
                continue;
            }
            match self.process_token(token, tip).await {
                Ok(true) => outcome = PassOutcome::Progressed,
                Ok(false) => {}
                Err(PollError::Store(StoreError::NegativeBalance {
                    chain_id,
                    token,
                    holder,
                    existing,
                    delta,
                })) => {
                    error!(
                        chain_id,
                        token = %address_hex(&token),
                        holder = %address_hex(&holder),
                        existing = %existing,
                        delta = %delta,
                        "negative balance, quarantining token"
                    );
                    self.store
                        .quarantine(
                            chain_id,
                            token,
                            &format!("negative balance for {}", address_hex(&holder)),
                        )
                        .await?;
                }
                Err(other) => {
                    self.publish_status(tip, &tokens).await;
                    return Err(other);
                }
            }
        }

        self.publish_status(tip, &tokens).await;
        Ok(outcome)
    }

    /// Processes at most one batch for one token. Returns whether the
    /// cursor advanced.
    async fn process_token(&mut self, token: &TrackedToken, tip: u64) -> Result<bool, PollError> {
        let start = match self.resolve_start(token, tip) {
            Some(start) => start,
            None => return Ok(false),
        };
        if start > tip {
            return Ok(false);
        }

        let remaining = tip - start + 1;
        let mut span = self.span.initial_span(remaining);
        let mut retries = 0u32;
        let started = Instant::now();

        loop {
            let end = start + span - 1;
            let filter = LogFilter {
                from_block: start,
                to_block: end,
                address: token.token,
                topic0: TRANSFER_TOPIC,
            };

            match self.rpc.get_logs(&filter).await {
                Ok(logs) => {
                    let transfers = decode_transfers(&logs);
                    let deltas = aggregate(&transfers);
                    self.store
                        .apply_batch(self.chain.chain_id, token.token, &deltas, end)
                        .await?;
                    self.span.remember(span);

                    let duration_ms = started.elapsed().as_millis() as u64;
                    info!(
                        chain_id = self.chain.chain_id,
                        token = %address_hex(&token.token),
                        from = start,
                        to = end,
                        span,
                        logs = logs.len(),
                        transfers = transfers.len(),
                        duration_ms,
                        "indexed batch"
                    );
                    metrics::record_batch(self.chain.chain_id, logs.len(), transfers.len(), duration_ms);
                    metrics::record_cursor(self.chain.chain_id, end);
                    return Ok(true);
                }
                Err(RpcError::BlockRangeTooLarge) => {
                    retries += 1;
                    if retries > MAX_SPAN_RETRIES {
                        return Err(RpcError::BlockRangeTooLarge.into());
                    }
                    let next = self.span.shrink(span, remaining);
                    if next == span {
                        // The controller is at its floor; shrinking further
                        // cannot help.
                        return Err(RpcError::BlockRangeTooLarge.into());
                    }
                    warn!(
                        chain_id = self.chain.chain_id,
                        token = %address_hex(&token.token),
                        span,
                        next_span = next,
                        "block range rejected, shrinking span"
                    );
                    span = next;
                    self.sleep(SPAN_RETRY_DELAY).await;
                    if self.cancel.is_cancelled() {
                        return Ok(false);
                    }
                }
                Err(other) => return Err(other.into()),
            }
        }
    }

    /// First block of the next batch, or None when the token has nothing to
    /// do yet.
    fn resolve_start(&self, token: &TrackedToken, tip: u64) -> Option<u64> {
        if let Some(from) = token.from_block {
            return Some(from);
        }
        if let Some(to) = token.to_block {
            return Some(to + 1);
        }
        // Fresh token: explicit backfill start wins, otherwise scan the
        // configured lookback window below the tip.
        if let Some(start) = self.settings.start_block {
            return Some(start);
        }
        Some(tip.saturating_sub(self.settings.initial_lookback))
    }

    async fn publish_status(&self, tip: u64, tokens: &[TrackedToken]) {
        // Re-read cursors so the snapshot reflects this pass's advances.
        let tokens = match self.store.list_tracked(self.chain.chain_id).await {
            Ok(fresh) => fresh,
            Err(_) => tokens.to_vec(),
        };
        self.status.update(ChainProgress {
            chain_id: self.chain.chain_id,
            name: self.chain.name.to_string(),
            mode: self.settings.mode.as_str().to_string(),
            tip,
            tokens: tokens
                .iter()
                .map(|t| TokenProgress {
                    token: address_hex(&t.token),
                    from_block: t.from_block,
                    to_block: t.to_block,
                    quarantined: t.is_quarantined(),
                })
                .collect(),
        });
    }

    async fn sleep(&self, duration: Duration) {
        tokio::select! {
            _ = self.cancel.cancelled() => {}
            _ = tokio::time::sleep(duration) => {}
        }
    }
}
