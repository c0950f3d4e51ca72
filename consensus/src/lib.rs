//! Consensus core: partial order, conflict resolution and stabilization.
//!
//! Units form a DAG. The main chain, chosen outside this crate, gives each
//! covered unit a main-chain index (MCI), and every unit records the latest
//! MCI it includes (LIMCI). This crate answers ordering questions from those
//! indexes, classifies units that spend the same resource, and advances
//! stability one MCI at a time.
//!
//! ## Module overview
//!
//! - [`ancestry`]: `compare`, `is_included`, bounded descendant queries.
//! - [`conflict`]: sequence classification for double spends.
//! - [`stability`]: balls, skiplists and final sequences for a stable MCI.
//! - [`error`]: consensus error types.

pub mod ancestry;
pub mod conflict;
pub mod error;
pub mod stability;

pub use ancestry::{
    compare, compare_props, descendants_by_authors_before_mci, is_included,
    is_included_or_equal, UnitOrder,
};
pub use conflict::{classify, classify_sequence, Classification};
pub use error::ConsensusError;
pub use stability::{mark_mci_stable, stabilize_up_to, StabilizedMci};
