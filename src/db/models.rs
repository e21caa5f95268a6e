use alloy_primitives::Address;
use chrono::{DateTime, Utc};
use num_bigint::BigUint;
use serde::Serialize;

/// A token being indexed on one chain, with its scan cursor.
///
/// `from_block` is the next block to scan; `to_block` the last block whose
/// transfers were applied. `from_block = to_block + 1` holds after every
/// successful batch. A fresh token has both unset; `error` marks a
/// quarantined token that the poller skips until an admin reindex clears it.
#[derive(Debug, Clone)]
pub struct TrackedToken {
    pub chain_id: u64,
    pub token: Address,
    pub from_block: Option<u64>,
    pub to_block: Option<u64>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TrackedToken {
    pub fn is_quarantined(&self) -> bool {
        self.error.is_some()
    }
}

/// One positive holder balance row, as stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HolderRow {
    pub holder: Address,
    pub balance: BigUint,
}

/// Freshness of a token's holder table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexingStatus {
    Ok,
    Indexing,
}

/// Canonical lower-hex form used in storage and over the API.
pub fn address_hex(addr: &Address) -> String {
    format!("0x{}", hex::encode(addr))
}

/// Parses a 20-byte hex address (leading 0x, 40 hex chars, any case).
pub fn parse_address(s: &str) -> Option<Address> {
    let digits = s.strip_prefix("0x")?;
    if digits.len() != 40 {
        return None;
    }
    let bytes = hex::decode(digits).ok()?;
    Some(Address::from_slice(&bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::address;

    #[test]
    fn address_round_trips_through_lower_hex() {
        let addr = address!("AaAaAAAaaAAAAaaAAaaaaaAAaAaaaAaAaaAaaAaA");
        let hex = address_hex(&addr);
        assert_eq!(hex, "0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa");
        assert_eq!(parse_address(&hex), Some(addr));
    }

    #[test]
    fn parse_address_accepts_mixed_case() {
        assert!(parse_address("0xDeAdBeEfDeAdBeEfDeAdBeEfDeAdBeEfDeAdBeEf").is_some());
    }

    #[test]
    fn parse_address_rejects_malformed_input() {
        assert!(parse_address("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa").is_none());
        assert!(parse_address("0xaaaa").is_none());
        assert!(parse_address("0xgggggggggggggggggggggggggggggggggggggggg").is_none());
        assert!(parse_address("0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa").is_none());
        assert!(parse_address("").is_none());
    }
}
