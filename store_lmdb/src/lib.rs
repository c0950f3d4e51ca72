//! LMDB storage backend for the Tessera consensus core.
//!
//! Implements every storage trait from `tessera-store` using the `heed`
//! LMDB bindings. Each logical table maps to one named database inside a
//! single environment, so a [`tessera_store::WriteBatch`] commits in one
//! write transaction.

pub mod ball;
pub mod catchup;
pub mod definition;
pub mod environment;
pub mod error;
pub mod integrity;
pub mod keys;
pub mod meta;
pub mod spend;
pub mod unit;
pub mod write_batch;

pub use environment::LmdbEnvironment;
pub use error::LmdbError;
pub use integrity::{check_data_dir, check_integrity, IntegrityReport};
