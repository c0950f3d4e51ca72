use tessera_store::StoreError;
use tessera_types::{Address, UnitId};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WitnessError {
    /// The requester already knows everything the proof could anchor.
    #[error("already current")]
    AlreadyCurrent,

    #[error("not enough witnesses: found {found}, need {required}")]
    NotEnoughWitnesses { found: usize, required: usize },

    #[error("no last ball unit after witness majority")]
    NoLastBallUnits,

    #[error("invalid witness list: {0}")]
    InvalidWitnessList(String),

    #[error("unit {0} does not hash to its id")]
    InvalidHash(UnitId),

    #[error("unit {0} is not a parent of the previous main-chain unit")]
    NotInParents(UnitId),

    #[error("unstable main-chain unit {0} carries a ball")]
    UnexpectedBall(UnitId),

    #[error("definition or change unit {0} has no ball")]
    MissingBall(UnitId),

    #[error("unit {0} is not authored by a witness")]
    NotAuthoredByWitness(UnitId),

    #[error("unit {0} neither reveals nor changes a witness definition")]
    NeitherDefinitionNorChange(UnitId),

    #[error("definition of {address} in unit {unit} does not hash to {expected}")]
    DefinitionMismatch {
        unit: UnitId,
        address: Address,
        expected: Address,
    },

    #[error("definition {chash} of {address} is unknown")]
    UnknownDefinition { address: Address, chash: Address },

    #[error("bad signature by {address} in unit {unit}")]
    InvalidSignature { unit: UnitId, address: Address },

    #[error(transparent)]
    Store(#[from] StoreError),
}
