//! Nullable infrastructure for deterministic testing.
//!
//! - [`NullStore`]: a thread-safe in-memory backend implementing every
//!   storage trait, with programmable commit failures.
//! - [`DagBuilder`]: builds signed DAGs on top of a `NullStore`, computing
//!   levels, best parents, witnessed levels, main-chain indexes and LIMCIs
//!   the way a node's main-chain rule would.
//!
//! Nothing here touches the filesystem or network.

pub mod dag;
pub mod store;

pub use dag::{DagBuilder, TestAuthor, UnitSpec};
pub use store::NullStore;
