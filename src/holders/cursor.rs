use alloy_primitives::Address;
use num_bigint::BigUint;
use std::fmt;
use std::str::FromStr;

use crate::db::models::{address_hex, parse_address};

/// Keyset-pagination cursor over the (balance DESC, holder ASC) ordering.
/// Opaque to API callers; the canonical encoding is
/// `"<balance_decimal>:<holder_lowerhex>"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HolderCursor {
    pub balance: BigUint,
    pub holder: Address,
}

impl HolderCursor {
    pub fn new(balance: BigUint, holder: Address) -> Self {
        Self { balance, holder }
    }
}

impl fmt::Display for HolderCursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.balance, address_hex(&self.holder))
    }
}

#[derive(Debug, thiserror::Error)]
#[error("invalid holder cursor")]
pub struct InvalidCursor;

impl FromStr for HolderCursor {
    type Err = InvalidCursor;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (balance, holder) = s.split_once(':').ok_or(InvalidCursor)?;
        if balance.is_empty() || balance.starts_with('+') || balance.starts_with('-') {
            return Err(InvalidCursor);
        }
        let balance = BigUint::parse_bytes(balance.as_bytes(), 10).ok_or(InvalidCursor)?;
        let holder = parse_address(holder).ok_or(InvalidCursor)?;
        Ok(Self { balance, holder })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::address;

    #[test]
    fn cursor_round_trips() {
        let cursor = HolderCursor::new(
            BigUint::parse_bytes(b"115792089237316195423570985008687907853269984665640564039457", 10)
                .unwrap(),
            address!("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa"),
        );
        let encoded = cursor.to_string();
        let decoded: HolderCursor = encoded.parse().unwrap();
        assert_eq!(decoded, cursor);
    }

    #[test]
    fn canonical_encoding_shape() {
        let cursor = HolderCursor::new(
            BigUint::from(1000u32),
            address!("cccccccccccccccccccccccccccccccccccccccc"),
        );
        assert_eq!(
            cursor.to_string(),
            "1000:0xcccccccccccccccccccccccccccccccccccccccc"
        );
    }

    #[test]
    fn malformed_cursors_are_rejected(){
        for bad in [
            "",
            "1000",
            ":0xcccccccccccccccccccccccccccccccccccccccc",
            "abc:0xcccccccccccccccccccccccccccccccccccccccc",
            "-5:0xcccccccccccccccccccccccccccccccccccccccc",
            "1000:cccccccccccccccccccccccccccccccccccccccc",
            "1000:0xcc",
        ] {
            assert!(bad.parse::<HolderCursor>().is_err(), "{bad:?} should fail");
        }
    }
}
