//! Tessera node: wires the consensus engines to a store.
//!
//! - [`config`]: TOML configuration with serde defaults.
//! - [`logging`]: human or JSON tracing output.
//! - [`facade`]: [`ConsensusCore`], the lock-serialized facade over ancestry,
//!   conflict classification, stabilization, witness proofs and catchup.

pub mod config;
pub mod error;
pub mod facade;
pub mod logging;

pub use config::NodeConfig;
pub use error::NodeError;
pub use facade::{open_checked, ConsensusCore, NodeStatus, STABILITY_LOCK};
pub use logging::{init_logging, LogFormat};
