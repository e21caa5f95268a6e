use std::collections::BTreeMap;

/// Static catalogue entry for one EVM chain. Values are defaults; the
/// settings layer may override `rpc_url`, `max_span`, `confirmations` and
/// `qps` from the environment.
#[derive(Debug, Clone)]
pub struct ChainConfig {
    pub chain_id: u64,
    pub name: &'static str,
    pub rpc_url: String,
    /// Blocks below the tip considered final for indexing.
    pub confirmations: u64,
    /// Ceiling for a single eth_getLogs block span.
    pub max_span: u64,
    /// Request-rate floor for the chain's endpoint.
    pub qps: u64,
    pub supported: bool,
}

impl ChainConfig {
    pub fn get(chain_id: u64) -> Option<Self> {
        match chain_id {
            1 => Some(Self::mainnet()),
            10 => Some(Self::optimism()),
            56 => Some(Self::bsc()),
            137 => Some(Self::polygon()),
            324 => Some(Self::zksync()),
            8453 => Some(Self::base()),
            42161 => Some(Self::arbitrum()),
            _ => None,
        }
    }

    pub fn mainnet() -> Self {
        Self {
            chain_id: 1,
            name: "Ethereum Mainnet",
            rpc_url: "https://eth.llamarpc.com".to_string(),
            confirmations: 10,
            max_span: 5000,
            qps: 5,
            supported: true,
        }
    }

    pub fn optimism() -> Self {
        Self {
            chain_id: 10,
            name: "OP Mainnet",
            rpc_url: "https://mainnet.optimism.io".to_string(),
            confirmations: 10,
            max_span: 2000,
            qps: 5,
            supported: true,
        }
    }

    pub fn bsc() -> Self {
        Self {
            chain_id: 56,
            name: "BNB Smart Chain",
            rpc_url: "https://bsc-dataseed.bnbchain.org".to_string(),
            confirmations: 15,
            max_span: 3000,
            qps: 5,
            supported: true,
        }
    }

    pub fn polygon() -> Self {
        Self {
            chain_id: 137,
            name: "Polygon PoS",
            rpc_url: "https://polygon-rpc.com".to_string(),
            confirmations: 30,
            max_span: 1000,
            qps: 5,
            supported: true,
        }
    }

    pub fn zksync() -> Self {
        Self {
            chain_id: 324,
            name: "zkSync Era",
            rpc_url: "https://mainnet.era.zksync.io".to_string(),
            confirmations: 10,
            max_span: 2000,
            qps: 5,
            supported: true,
        }
    }

    pub fn base() -> Self {
        Self {
            chain_id: 8453,
            name: "Base",
            rpc_url: "https://mainnet.base.org".to_string(),
            confirmations: 10,
            max_span: 2000,
            qps: 5,
            supported: true,
        }
    }

    pub fn arbitrum() -> Self {
        Self {
            chain_id: 42161,
            name: "Arbitrum One",
            rpc_url: "https://arb1.arbitrum.io/rpc".to_string(),
            confirmations: 20,
            max_span: 2000,
            qps: 5,
            supported: true,
        }
    }
}

/// The set of chains this deployment indexes, keyed by chain id.
#[derive(Debug, Clone, Default)]
pub struct ChainCatalogue {
    chains: BTreeMap<u64, ChainConfig>,
}

impl ChainCatalogue {
    pub fn new(chains: Vec<ChainConfig>) -> Self {
        Self {
            chains: chains.into_iter().map(|c| (c.chain_id, c)).collect(),
        }
    }

    /// Catalogue restricted to `ids`, or every known chain when `ids` is None.
    pub fn from_ids(ids: Option<&[u64]>) -> Self {
        let all = [1u64, 10, 56, 137, 324, 8453, 42161];
        let selected: Vec<ChainConfig> = match ids {
            Some(ids) => ids.iter().filter_map(|id| ChainConfig::get(*id)).collect(),
            None => all.iter().filter_map(|id| ChainConfig::get(*id)).collect(),
        };
        Self::new(selected)
    }

    pub fn get(&self, chain_id: u64) -> Option<&ChainConfig> {
        self.chains.get(&chain_id).filter(|c| c.supported)
    }

    pub fn is_supported(&self, chain_id: u64) -> bool {
        self.get(chain_id).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ChainConfig> {
        self.chains.values().filter(|c| c.supported)
    }

    pub fn get_mut(&mut self, chain_id: u64) -> Option<&mut ChainConfig> {
        self.chains.get_mut(&chain_id)
    }
}
