//! Wire shapes of the catchup and hash-tree exchanges.
//!
//! These types are transport-agnostic; the canonical encoding is JSON.
//! Optional fields are omitted when empty, so they must not be encoded with
//! non-self-describing formats.

use serde::{Deserialize, Serialize};
use tessera_types::{Address, BallHash, Joint, Mci, UnitId};

#[derive(Debug, thiserror::Error)]
pub enum MessageError {
    #[error("malformed message: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Ask a peer for the balls between our stable tip and theirs.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatchupRequest {
    pub last_stable_mci: Mci,
    pub last_known_mci: Mci,
    pub witnesses: Vec<Address>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CatchupStatus {
    Current,
}

/// Proof material answering a [`CatchupRequest`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatchupChain {
    /// Unstable main-chain joints, tip first, balls stripped.
    pub unstable_mc_joints: Vec<Joint>,
    /// Joints linked by `last_ball_unit`, newest first, with balls.
    pub stable_last_ball_joints: Vec<Joint>,
    /// Stable joints that reveal or change witness definitions, by level.
    pub witness_change_and_definition_joints: Vec<Joint>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CatchupResponse {
    /// The requester already has everything the responder could prove.
    Current { status: CatchupStatus },
    Chain(CatchupChain),
}

impl CatchupResponse {
    pub fn current() -> Self {
        CatchupResponse::Current {
            status: CatchupStatus::Current,
        }
    }

    pub fn is_current(&self) -> bool {
        matches!(self, CatchupResponse::Current { .. })
    }
}

/// Ask for the units between two consecutive catchup balls.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashTreeRequest {
    pub from_ball: BallHash,
    pub to_ball: BallHash,
}

fn is_false(b: &bool) -> bool {
    !*b
}

/// One hash-tree record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashTreeBall {
    pub unit: UnitId,
    pub ball: BallHash,
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_nonserial: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parent_balls: Vec<BallHash>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skiplist_balls: Vec<BallHash>,
}

/// Records ordered by `(MCI, level)`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashTreeResponse {
    pub balls: Vec<HashTreeBall>,
}

pub fn to_json<T: Serialize>(message: &T) -> Result<String, MessageError> {
    Ok(serde_json::to_string(message)?)
}

pub fn from_json<'a, T: Deserialize<'a>>(text: &'a str) -> Result<T, MessageError> {
    Ok(serde_json::from_str(text)?)
}
