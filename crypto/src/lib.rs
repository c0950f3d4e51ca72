//! Cryptographic primitives for Tessera.
//!
//! - **Blake2b-256** for unit ids, hashes-to-sign and ball hashes
//! - **Blake2b-160** plus a checksum for definition chashes (addresses)
//! - **Ed25519** for `sig` definitions and authentifiers

pub mod address;
pub mod definition;
pub mod hash;
pub mod keys;

pub use address::{definition_chash, validate_address};
pub use definition::{sign_author, sign_message, verify_definition, verify_signature};
pub use hash::{
    ball_hash, blake2b_256, blake2b_256_multi, has_valid_unit_hash, unit_hash, unit_hash_to_sign,
};
pub use keys::{generate_keypair, keypair_from_seed, public_from_private};
