use dashmap::DashMap;
use serde::Serialize;
use std::sync::Arc;

/// Progress snapshot for one tracked token.
#[derive(Debug, Clone, Serialize)]
pub struct TokenProgress {
    pub token: String,
    pub from_block: Option<u64>,
    pub to_block: Option<u64>,
    pub quarantined: bool,
}

/// Progress snapshot for one chain's poller.
#[derive(Debug, Clone, Serialize)]
pub struct ChainProgress {
    pub chain_id: u64,
    pub name: String,
    pub mode: String,
    pub tip: u64,
    pub tokens: Vec<TokenProgress>,
}

/// Shared poller-to-API status map. Pollers overwrite their own chain's
/// entry each pass; the status endpoint reads a point-in-time snapshot.
#[derive(Clone, Default)]
pub struct StatusBoard {
    inner: Arc<DashMap<u64, ChainProgress>>,
}

impl StatusBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&self, progress: ChainProgress) {
        self.inner.insert(progress.chain_id, progress);
    }

    pub fn snapshot(&self) -> Vec<ChainProgress> {
        let mut chains: Vec<ChainProgress> =
            self.inner.iter().map(|entry| entry.value().clone()).collect();
        chains.sort_by_key(|c| c.chain_id);
        chains
    }
}
