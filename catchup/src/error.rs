use tessera_store::StoreError;
use tessera_types::{BallHash, UnitId};
use tessera_witness::WitnessError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CatchupError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("ball {0} not found")]
    BallNotFound(BallHash),

    #[error("ball {0} is not stable")]
    BallNotStable(BallHash),

    #[error("ball {0} is not on the main chain")]
    BallNotOnMainChain(BallHash),

    #[error("stable joint {0} has no ball")]
    StableWithoutBall(UnitId),

    #[error("unit {0} does not hash to its id")]
    InvalidHash(UnitId),

    #[error("broken last ball chain: {0}")]
    ChainLinkage(String),

    #[error("a catchup chain is already in progress")]
    ChainInProgress,

    #[error("first chain ball {0} has an MCI above the last stable one")]
    FirstBallTooNew(BallHash),

    #[error("second chain ball {0} is already stable")]
    SecondBallStable(BallHash),

    #[error("catchup chain needs at least two balls")]
    ChainTooShort,

    #[error("wrong ball hash {ball} for unit {unit}")]
    WrongBallHash { unit: UnitId, ball: BallHash },

    #[error("unit {0} has no parent balls")]
    NoParents(UnitId),

    #[error("some parent balls of unit {0} are unknown")]
    MissingParentBalls(UnitId),

    #[error("some skiplist balls of unit {0} are unknown")]
    MissingSkiplistBalls(UnitId),

    #[error("tree root {got} does not match the catchup chain ball {expected}")]
    TreeRootMismatch { expected: BallHash, got: BallHash },

    #[error(transparent)]
    Witness(#[from] WitnessError),

    #[error(transparent)]
    Store(#[from] StoreError),
}
