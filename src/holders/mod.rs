mod cursor;
mod query;

pub use cursor::{HolderCursor, InvalidCursor};
pub use query::{
    HolderEntry, HolderQueryEngine, HoldersPage, QueryError, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE,
};
