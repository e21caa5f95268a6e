use alloy_primitives::{b256, Address, B256};
use num_bigint::BigUint;

use crate::eth_rpc::RpcLog;

/// keccak256("Transfer(address,address,uint256)")
pub const TRANSFER_TOPIC: B256 =
    b256!("ddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef");

/// A decoded ERC-20 Transfer event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transfer {
    pub from: Address,
    pub to: Address,
    pub value: BigUint,
}

/// Decodes Transfer events out of a batch of raw logs. Logs that are not
/// well-formed Transfers (wrong topic0, removed, wrong topic count, short
/// data) are dropped silently.
pub fn decode_transfers(logs: &[RpcLog]) -> Vec<Transfer> {
    logs.iter().filter_map(decode_transfer).collect()
}

fn decode_transfer(log: &RpcLog) -> Option<Transfer> {
    if log.removed || log.topics.len() != 3 || log.topics[0] != TRANSFER_TOPIC {
        return None;
    }
    if log.data.len() != 32 {
        return None;
    }
    // Indexed address topics are left-padded to 32 bytes.
    let from = Address::from_slice(&log.topics[1][12..]);
    let to = Address::from_slice(&log.topics[2][12..]);
    let value = BigUint::from_bytes_be(&log.data);
    Some(Transfer { from, to, value })
}
