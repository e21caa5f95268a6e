pub mod aggregator;
pub mod decoder;
pub mod poller;
pub mod span;
pub mod status;

pub use aggregator::{aggregate, HolderDeltas};
pub use decoder::{decode_transfers, Transfer, TRANSFER_TOPIC};
pub use poller::{ChainPoller, PassOutcome, PollError, MAX_SPAN_RETRIES};
pub use span::{SpanController, MIN_SPAN};
pub use status::{ChainProgress, StatusBoard, TokenProgress};
