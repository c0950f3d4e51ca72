use tessera_store::StoreError;
use tessera_types::{Mci, UnitId};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConsensusError {
    /// A referenced unit has no metadata row. The store and the DAG have
    /// diverged; this is not recoverable by protocol logic.
    #[error("unit {0} has no stored metadata")]
    MissingUnit(UnitId),

    #[error("no main-chain unit at MCI {0}")]
    NoMainChainUnit(Mci),

    #[error("MCIs stabilize in order: expected {expected}, got {got}")]
    OutOfOrderStability { expected: Mci, got: Mci },

    #[error("unit {0} should be stable but has no ball")]
    MissingBall(UnitId),

    #[error(transparent)]
    Store(#[from] StoreError),
}
