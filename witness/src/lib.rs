//! Witness proofs and witness list checks.
//!
//! A node that trusts a fixed list of witnesses can accept a last ball once
//! a majority of those witnesses has built on top of it. [`proof`] prepares
//! and verifies that evidence; [`witness_list`] validates lists and bounds
//! how far two lists may differ.

pub mod error;
pub mod proof;
pub mod witness_list;

pub use error::WitnessError;
pub use proof::{prepare_witness_proof, process_witness_proof, VerifiedProof, WitnessProof};
pub use witness_list::{
    lists_compatible, validate_witness_list, witness_list_mutations, witness_list_of,
};
