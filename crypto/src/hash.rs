//! Blake2b hashing of units and balls.
//!
//! Unit ids and hashes-to-sign cover the bincode encoding of the unit's
//! content with authentifiers stripped, under distinct domain tags. Balls
//! cover `(unit, sorted parent balls, sorted skiplist balls, nonserial)`
//! with empty lists encoded as absent.

use blake2::digest::consts::U32;
use blake2::{Blake2b, Digest};
use serde::Serialize;
use tessera_types::{
    Address, BallHash, Definition, Message, Timestamp, Unit, UnitId,
};

type Blake2b256 = Blake2b<U32>;

const UNIT_DOMAIN: &[u8] = b"tessera/unit/v1";
const SIGN_DOMAIN: &[u8] = b"tessera/sign/v1";
const BALL_DOMAIN: &[u8] = b"tessera/ball/v1";

/// Compute a 256-bit Blake2b hash of arbitrary data.
pub fn blake2b_256(data: &[u8]) -> [u8; 32] {
    blake2b_256_multi(&[data])
}

/// Hash multiple byte slices in sequence (avoids concatenation allocation).
pub fn blake2b_256_multi(parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = Blake2b256::new();
    for part in parts {
        hasher.update(part);
    }
    let mut output = [0u8; 32];
    output.copy_from_slice(&hasher.finalize());
    output
}

#[derive(Serialize)]
struct AuthorEssence<'a> {
    address: &'a Address,
    definition: &'a Option<Definition>,
}

#[derive(Serialize)]
struct UnitEssence<'a> {
    version: u32,
    parent_units: &'a [UnitId],
    last_ball: &'a Option<BallHash>,
    last_ball_unit: &'a Option<UnitId>,
    witnesses: &'a [Address],
    witness_list_unit: &'a Option<UnitId>,
    authors: Vec<AuthorEssence<'a>>,
    messages: &'a [Message],
    timestamp: Timestamp,
}

fn essence_bytes(unit: &Unit) -> Vec<u8> {
    let essence = UnitEssence {
        version: unit.version,
        parent_units: &unit.parent_units,
        last_ball: &unit.last_ball,
        last_ball_unit: &unit.last_ball_unit,
        witnesses: &unit.witnesses,
        witness_list_unit: &unit.witness_list_unit,
        authors: unit
            .authors
            .iter()
            .map(|a| AuthorEssence {
                address: &a.address,
                definition: &a.definition,
            })
            .collect(),
        messages: &unit.messages,
        timestamp: unit.timestamp,
    };
    bincode::serialize(&essence).expect("unit essence contains only sized, serializable fields")
}

/// Content-addressed identity of a unit.
pub fn unit_hash(unit: &Unit) -> UnitId {
    UnitId::new(blake2b_256_multi(&[UNIT_DOMAIN, &essence_bytes(unit)]))
}

/// The message every author signs.
pub fn unit_hash_to_sign(unit: &Unit) -> [u8; 32] {
    blake2b_256_multi(&[SIGN_DOMAIN, &essence_bytes(unit)])
}

/// Whether the unit's declared id matches its content.
pub fn has_valid_unit_hash(unit: &Unit) -> bool {
    unit_hash(unit) == unit.unit
}

#[derive(Serialize)]
struct BallEssence<'a> {
    unit: &'a UnitId,
    parent_balls: Option<Vec<BallHash>>,
    skiplist_balls: Option<Vec<BallHash>>,
    is_nonserial: bool,
}

fn sorted_or_absent(balls: &[BallHash]) -> Option<Vec<BallHash>> {
    if balls.is_empty() {
        return None;
    }
    let mut sorted = balls.to_vec();
    sorted.sort();
    Some(sorted)
}

/// Checkpoint hash of a stable unit.
pub fn ball_hash(
    unit: &UnitId,
    parent_balls: &[BallHash],
    skiplist_balls: &[BallHash],
    is_nonserial: bool,
) -> BallHash {
    let essence = BallEssence {
        unit,
        parent_balls: sorted_or_absent(parent_balls),
        skiplist_balls: sorted_or_absent(skiplist_balls),
        is_nonserial,
    };
    let bytes = bincode::serialize(&essence).expect("ball essence is always serializable");
    BallHash::new(blake2b_256_multi(&[BALL_DOMAIN, &bytes]))
}
