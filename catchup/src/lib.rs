//! Catchup: verifiable sync of stable history.
//!
//! A lagging node asks a peer for a catchup chain anchored by a witness
//! proof, then fills every gap between adjacent chain balls with a hash
//! tree. Each step is checked against ball hashes before anything is
//! written, and each write is a single batch.
//!
//! - [`chain`]: prepare and process catchup chains.
//! - [`hash_tree`]: read and process hash trees, plus the in-memory ball index.
//! - [`service`]: the lock-serialized workflow and queue helpers.

pub mod chain;
pub mod error;
pub mod hash_tree;
pub mod service;

pub use chain::{prepare_catchup_chain, process_catchup_chain};
pub use error::CatchupError;
pub use hash_tree::{process_hash_tree, read_hash_tree, HashTreeIndex, HashTreeOutcome};
pub use service::{CatchupService, CATCHUP_CHAIN_LOCK, HASH_TREE_LOCK};
