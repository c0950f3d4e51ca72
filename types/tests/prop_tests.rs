use proptest::prelude::*;

use tessera_types::{BallHash, ProtocolParams, SpendKey, UnitId};

proptest! {
    /// UnitId text form parses back to the same id.
    #[test]
    fn unit_id_display_roundtrip(bytes in prop::array::uniform32(0u8..)) {
        let id = UnitId::new(bytes);
        let parsed: UnitId = id.to_string().parse().unwrap();
        prop_assert_eq!(parsed, id);
    }

    /// BallHash::is_zero is true only for all-zero bytes.
    #[test]
    fn ball_hash_is_zero_correct(bytes in prop::array::uniform32(0u8..)) {
        let ball = BallHash::new(bytes);
        prop_assert_eq!(ball.is_zero(), bytes == [0u8; 32]);
    }

    /// Ordering of ids agrees with ordering of their hex encodings.
    #[test]
    fn unit_id_order_matches_hex_order(
        a in prop::array::uniform32(0u8..),
        b in prop::array::uniform32(0u8..),
    ) {
        let (ia, ib) = (UnitId::new(a), UnitId::new(b));
        prop_assert_eq!(ia.cmp(&ib), ia.to_string().cmp(&ib.to_string()));
    }

    /// SpendKey byte encoding preserves key order.
    #[test]
    fn spend_key_encoding_is_order_preserving(
        u in prop::array::uniform32(0u8..),
        m1 in 0u32..1000, o1 in 0u32..1000,
        m2 in 0u32..1000, o2 in 0u32..1000,
    ) {
        let a = SpendKey { unit: UnitId::new(u), message_index: m1, output_index: o1 };
        let b = SpendKey { unit: UnitId::new(u), message_index: m2, output_index: o2 };
        prop_assert_eq!(a.cmp(&b), a.to_bytes().cmp(&b.to_bytes()));
    }

    /// Every skiplist target is strictly earlier and a multiple of the interval.
    #[test]
    fn skiplist_targets_are_earlier(mci in 1u64..1_000_000) {
        let params = ProtocolParams::default();
        for target in params.skiplist_mcis(mci) {
            prop_assert!(target < mci);
            prop_assert_eq!((mci - target) % params.skiplist_interval, 0);
        }
    }
}
