//! Abstract storage traits for the Tessera consensus core.
//!
//! Every storage backend (LMDB, in-memory for testing) implements these
//! traits. The engines depend only on the traits. Reads go through the
//! per-concern traits; every mutation is staged in a [`WriteBatch`] and
//! applied atomically by [`BatchWriter::commit`].

pub mod ball;
pub mod catchup;
pub mod definition;
pub mod error;
pub mod spend;
pub mod unit;
pub mod write_batch;

pub use ball::BallStore;
pub use catchup::{CatchupStore, HashTreeStore};
pub use definition::DefinitionStore;
pub use error::StoreError;
pub use spend::SpendStore;
pub use unit::UnitStore;
pub use write_batch::{BatchOp, BatchWriter, WriteBatch};

/// Everything the consensus engines need from a backend.
pub trait DagStore:
    UnitStore
    + BallStore
    + SpendStore
    + DefinitionStore
    + CatchupStore
    + HashTreeStore
    + BatchWriter
    + Send
    + Sync
{
}

impl<T> DagStore for T where
    T: UnitStore
        + BallStore
        + SpendStore
        + DefinitionStore
        + CatchupStore
        + HashTreeStore
        + BatchWriter
        + Send
        + Sync
{
}
