//! Ephemeral state of an in-progress catchup.

use crate::StoreError;
use tessera_types::{BallHash, UnitId};

/// The persisted catchup queue: balls from our stable tip to the peer's.
pub trait CatchupStore {
    /// Queued balls, oldest first. Empty when no catchup is in progress.
    fn catchup_chain(&self) -> Result<Vec<BallHash>, StoreError>;
}

/// Transient hash-tree records accepted but not yet promoted.
pub trait HashTreeStore {
    fn hash_tree_unit(&self, ball: &BallHash) -> Result<Option<UnitId>, StoreError>;

    fn hash_tree_balls(&self) -> Result<Vec<(BallHash, UnitId)>, StoreError>;
}
