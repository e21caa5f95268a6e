mod handlers;
mod routes;
mod types;

use std::sync::Arc;

use crate::config::ChainCatalogue;
use crate::db::IndexerStore;
use crate::holders::HolderQueryEngine;
use crate::indexer::StatusBoard;

pub use routes::create_router;
pub use types::ApiError;

/// Everything the HTTP handlers need, behind one Arc.
pub struct AppState {
    pub engine: HolderQueryEngine,
    pub store: Arc<dyn IndexerStore>,
    pub chains: Arc<ChainCatalogue>,
    pub status: StatusBoard,
}
