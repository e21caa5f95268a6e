pub mod memory;
pub mod models;
pub mod postgres;
pub mod schema;
pub mod store;

pub use memory::MemStore;
pub use models::{address_hex, parse_address, HolderRow, IndexingStatus, TrackedToken};
pub use postgres::PgStore;
pub use store::{HolderQueries, IndexerStore, StoreError};
