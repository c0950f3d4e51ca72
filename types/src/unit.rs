//! Units, joints, authors, definitions and application messages.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::{Address, BallHash, PublicKey, Signature, Timestamp, UnitId};

/// The condition an address's signers must satisfy.
///
/// An address is the chash of its definition. Authentifiers are keyed by
/// the path of the satisfied clause: `r` for the root, `r.0`, `r.1`, ... for
/// members of a set.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Definition {
    /// A single Ed25519 signature.
    Sig { pubkey: PublicKey },
    /// At least `required` of the nested definitions must be satisfied.
    RofSet { required: u32, set: Vec<Definition> },
}

/// One author of a unit.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    pub address: Address,
    /// Present on first use of the address and after a definition change.
    pub definition: Option<Definition>,
    /// Signatures keyed by definition path.
    pub authentifiers: BTreeMap<String, Signature>,
}

/// Resource key consumed by a payment input: an output of an earlier unit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SpendKey {
    pub unit: UnitId,
    pub message_index: u32,
    pub output_index: u32,
}

impl SpendKey {
    pub const ENCODED_LEN: usize = 40;

    /// Fixed-width big-endian key used by ordered stores.
    pub fn to_bytes(&self) -> [u8; Self::ENCODED_LEN] {
        let mut out = [0u8; Self::ENCODED_LEN];
        out[..32].copy_from_slice(self.unit.as_bytes());
        out[32..36].copy_from_slice(&self.message_index.to_be_bytes());
        out[36..].copy_from_slice(&self.output_index.to_be_bytes());
        out
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Output {
    pub address: Address,
    pub amount: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    pub inputs: Vec<SpendKey>,
    pub outputs: Vec<Output>,
}

/// Replaces the definition chash that controls `address` (or the sole
/// author when `address` is omitted).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefinitionChange {
    pub address: Option<Address>,
    pub definition_chash: Address,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Payload {
    Payment(Payment),
    AddressDefinitionChange(DefinitionChange),
    /// Opaque application data; interpreted outside the consensus core.
    Data(Vec<u8>),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub payload: Payload,
}

/// An immutable, content-addressed DAG record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Unit {
    /// Hash of every other field with authentifiers stripped.
    pub unit: UnitId,
    pub version: u32,
    /// Ordered parent identities; empty only for the root unit.
    pub parent_units: Vec<UnitId>,
    pub last_ball: Option<BallHash>,
    pub last_ball_unit: Option<UnitId>,
    /// Explicit witness list; empty when `witness_list_unit` is referenced.
    pub witnesses: Vec<Address>,
    pub witness_list_unit: Option<UnitId>,
    pub authors: Vec<Author>,
    pub messages: Vec<Message>,
    pub timestamp: Timestamp,
}

impl Unit {
    pub fn is_genesis(&self) -> bool {
        self.parent_units.is_empty()
    }

    pub fn author_addresses(&self) -> impl Iterator<Item = &Address> {
        self.authors.iter().map(|a| &a.address)
    }

    pub fn is_authored_by(&self, address: &Address) -> bool {
        self.authors.iter().any(|a| &a.address == address)
    }

    /// Every resource this unit consumes, in message order.
    pub fn spent_keys(&self) -> Vec<SpendKey> {
        self.messages
            .iter()
            .filter_map(|m| match &m.payload {
                Payload::Payment(p) => Some(p.inputs.iter().copied()),
                _ => None,
            })
            .flatten()
            .collect()
    }

    /// The definition chash that `address` switches to in this unit, if any.
    ///
    /// A change applies to `address` when it names it explicitly, or when it
    /// names nobody and `address` is the unit's only author.
    pub fn definition_change_for(&self, address: &Address) -> Option<&Address> {
        let sole_author = self.authors.len() == 1 && &self.authors[0].address == address;
        self.messages.iter().rev().find_map(|m| match &m.payload {
            Payload::AddressDefinitionChange(change) => {
                let applies = match &change.address {
                    Some(a) => a == address,
                    None => sole_author,
                };
                applies.then_some(&change.definition_chash)
            }
            _ => None,
        })
    }

    pub fn has_definition_change(&self) -> bool {
        self.messages
            .iter()
            .any(|m| matches!(m.payload, Payload::AddressDefinitionChange(_)))
    }
}

/// A unit plus the proof fields that travel with it once it is stable.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Joint {
    pub unit: Unit,
    pub ball: Option<BallHash>,
    pub skiplist_units: Vec<UnitId>,
}

impl Joint {
    pub fn new(unit: Unit) -> Self {
        Self {
            unit,
            ball: None,
            skiplist_units: Vec::new(),
        }
    }

    pub fn id(&self) -> UnitId {
        self.unit.unit
    }
}
