mod chains;
mod settings;

pub use chains::{ChainCatalogue, ChainConfig};
pub use settings::{ChainPollerSettings, IndexerSettings, PollerMode, Settings};
