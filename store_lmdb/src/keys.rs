//! Binary key layouts and prefix scans.
//!
//! Composite keys are fixed-width big-endian where possible so that LMDB's
//! lexicographic order matches numeric order.

use std::ops::Bound;

use heed::RoTxn;
use tessera_types::{Address, BallHash, Level, Mci, SpendKey, UnitId};

use crate::environment::Table;
use crate::LmdbError;

pub(crate) fn pair_key(prefix: &[u8], suffix: &[u8]) -> Vec<u8> {
    let mut key = Vec::with_capacity(prefix.len() + suffix.len());
    key.extend_from_slice(prefix);
    key.extend_from_slice(suffix);
    key
}

/// Length-prefixed address so that no address is a prefix of another.
pub(crate) fn address_prefix(address: &Address) -> Vec<u8> {
    let bytes = address.as_str().as_bytes();
    let mut key = Vec::with_capacity(bytes.len() + 1);
    key.push(bytes.len().min(u8::MAX as usize) as u8);
    key.extend_from_slice(bytes);
    key
}

pub(crate) fn mci_prefix(mci: Mci) -> [u8; 8] {
    mci.to_be_bytes()
}

pub(crate) fn mci_unit_key(mci: Mci, level: Level, unit: &UnitId) -> [u8; 48] {
    let mut key = [0u8; 48];
    key[..8].copy_from_slice(&mci.to_be_bytes());
    key[8..16].copy_from_slice(&level.to_be_bytes());
    key[16..].copy_from_slice(unit.as_bytes());
    key
}

pub(crate) fn spend_prefix(key: &SpendKey) -> [u8; SpendKey::ENCODED_LEN] {
    key.to_bytes()
}

/// Smallest byte string greater than every string starting with `prefix`.
/// Returns `false` when no such bound exists (all bytes are 0xFF).
pub(crate) fn increment_prefix(prefix: &mut Vec<u8>) -> bool {
    while let Some(last) = prefix.pop() {
        if last < u8::MAX {
            prefix.push(last + 1);
            return true;
        }
    }
    false
}

/// Every key in `db` that starts with `prefix`, in key order.
pub(crate) fn scan_prefix(db: &Table, txn: &RoTxn, prefix: &[u8]) -> Result<Vec<Vec<u8>>, LmdbError> {
    let mut upper = prefix.to_vec();
    let upper_bound = if increment_prefix(&mut upper) {
        Bound::Excluded(upper.as_slice())
    } else {
        Bound::Unbounded
    };
    let bounds = (Bound::Included(prefix), upper_bound);
    let mut keys = Vec::new();
    for entry in db.range(txn, &bounds)? {
        let (key, _) = entry?;
        keys.push(key.to_vec());
    }
    Ok(keys)
}

pub(crate) fn decode_unit_id(bytes: &[u8]) -> Result<UnitId, LmdbError> {
    UnitId::from_slice(bytes)
        .ok_or_else(|| LmdbError::Serialization(format!("invalid unit id length {}", bytes.len())))
}

pub(crate) fn decode_ball(bytes: &[u8]) -> Result<BallHash, LmdbError> {
    BallHash::from_slice(bytes)
        .ok_or_else(|| LmdbError::Serialization(format!("invalid ball length {}", bytes.len())))
}

/// The trailing unit id of a composite key.
pub(crate) fn trailing_unit_id(key: &[u8]) -> Result<UnitId, LmdbError> {
    if key.len() < 32 {
        return Err(LmdbError::Serialization("composite key too short".into()));
    }
    decode_unit_id(&key[key.len() - 32..])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn increment_prefix_carries() {
        let mut p = vec![0x01, 0xFF];
        assert!(increment_prefix(&mut p));
        assert_eq!(p, vec![0x02]);

        let mut all_max = vec![0xFF, 0xFF];
        assert!(!increment_prefix(&mut all_max));
    }

    #[test]
    fn mci_keys_sort_numerically() {
        let u = UnitId::new([0xAA; 32]);
        assert!(mci_unit_key(2, 9, &u) < mci_unit_key(10, 0, &u));
        assert!(mci_unit_key(3, 1, &u) < mci_unit_key(3, 2, &u));
    }

    #[test]
    fn address_prefixes_do_not_nest() {
        let short = address_prefix(&Address::new("AB"));
        let long = address_prefix(&Address::new("ABC"));
        assert!(!long.starts_with(&short));
    }
}
