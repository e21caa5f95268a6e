use alloy_primitives::Address;
use num_bigint::BigInt;
use num_traits::Zero;
use std::collections::BTreeMap;

use super::decoder::Transfer;

/// Per-address signed balance deltas for one batch of one token.
pub type HolderDeltas = BTreeMap<Address, BigInt>;

/// Folds a batch of transfers into signed per-address deltas. The zero
/// address contributes nothing: a mint credits the receiver only, a burn
/// debits the sender only. Addresses whose net delta is zero are omitted.
pub fn aggregate(transfers: &[Transfer]) -> HolderDeltas {
    let mut deltas = HolderDeltas::new();
    for transfer in transfers {
        let value = BigInt::from(transfer.value.clone());
        if transfer.from != Address::ZERO {
            *deltas.entry(transfer.from).or_insert_with(BigInt::zero) -= &value;
        }
        if transfer.to != Address::ZERO {
            *deltas.entry(transfer.to).or_insert_with(BigInt::zero) += &value;
        }
    }
    deltas.retain(|_, delta| !delta.is_zero());
    deltas
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::address;
    use num_bigint::BigUint;

    const ALICE: Address = address!("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa");
    const BOB: Address = address!("bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb");
    const CAROL: Address = address!("cccccccccccccccccccccccccccccccccccccccc");

    fn transfer(from: Address, to: Address, value: u64) -> Transfer {
        Transfer {
            from,
            to,
            value: BigUint::from(value),
        }
    }

    #[test]
    fn mint_credits_receiver_without_debiting_zero() {
        let deltas = aggregate(&[transfer(Address::ZERO, ALICE, 1000)]);
        assert_eq!(deltas.len(), 1);
        assert_eq!(deltas[&ALICE], BigInt::from(1000));
    }

    #[test]
    fn burn_debits_sender_without_crediting_zero() {
        let deltas = aggregate(&[transfer(ALICE, Address::ZERO, 100)]);
        assert_eq!(deltas.len(), 1);
        assert_eq!(deltas[&ALICE], BigInt::from(-100));
    }

    #[test]
    fn transfers_net_out_per_address() {
        let deltas = aggregate(&[
            transfer(ALICE, BOB, 400),
            transfer(BOB, CAROL, 150),
            transfer(CAROL, ALICE, 50),
        ]);
        assert_eq!(deltas[&ALICE], BigInt::from(-350));
        assert_eq!(deltas[&BOB], BigInt::from(250));
        assert_eq!(deltas[&CAROL], BigInt::from(100));
    }

    #[test]
    fn zero_net_addresses_are_omitted() {
        let deltas = aggregate(&[transfer(ALICE, BOB, 5), transfer(BOB, ALICE, 5)]);
        assert!(deltas.is_empty());
    }

    #[test]
    fn self_transfers_are_a_no_op() {
        let deltas = aggregate(&[transfer(ALICE, ALICE, 123)]);
        assert!(deltas.is_empty());
    }

    #[test]
    fn aggregation_is_order_independent() {
        let batch = vec![
            transfer(Address::ZERO, ALICE, 1000),
            transfer(ALICE, BOB, 400),
            transfer(ALICE, Address::ZERO, 100),
            transfer(BOB, CAROL, 1),
        ];
        let mut reversed = batch.clone();
        reversed.reverse();
        assert_eq!(aggregate(&batch), aggregate(&reversed));
    }

    #[test]
    fn deltas_exceeding_u64_stay_exact() {
        let big = BigUint::from(u64::MAX) * 3u32;
        let t = Transfer {
            from: Address::ZERO,
            to: ALICE,
            value: big.clone(),
        };
        let deltas = aggregate(&[t.clone(), t]);
        assert_eq!(deltas[&ALICE], BigInt::from(big * 2u32));
    }
}
