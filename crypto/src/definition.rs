//! Ed25519 authentifiers and evaluation of address definitions.

use ed25519_dalek::{Signer, SigningKey, Verifier, VerifyingKey};
use std::collections::BTreeMap;
use tessera_types::{Definition, PrivateKey, PublicKey, Signature, Unit};

use crate::hash::unit_hash_to_sign;

/// Path of the root clause of a definition.
pub const ROOT_PATH: &str = "r";

/// Sign a message (normally a unit's hash-to-sign).
pub fn sign_message(message: &[u8], private_key: &PrivateKey) -> Signature {
    let signing_key = SigningKey::from_bytes(&private_key.0);
    Signature(signing_key.sign(message).to_bytes())
}

/// Verify a signature against a message and public key.
///
/// Returns `false` for malformed keys as well as bad signatures.
pub fn verify_signature(message: &[u8], signature: &Signature, public_key: &PublicKey) -> bool {
    let Ok(verifying_key) = VerifyingKey::from_bytes(&public_key.0) else {
        return false;
    };
    let dalek_sig = ed25519_dalek::Signature::from_bytes(&signature.0);
    verifying_key.verify(message, &dalek_sig).is_ok()
}

/// Produce the authentifiers for one author of `unit`.
///
/// `signers` pairs each definition path with the key that signs for it.
pub fn sign_author(unit: &Unit, signers: &[(&str, &PrivateKey)]) -> BTreeMap<String, Signature> {
    let message = unit_hash_to_sign(unit);
    signers
        .iter()
        .map(|(path, key)| (path.to_string(), sign_message(&message, key)))
        .collect()
}

/// Whether `authentifiers` satisfy `definition` for `message`.
pub fn verify_definition(
    definition: &Definition,
    authentifiers: &BTreeMap<String, Signature>,
    message: &[u8],
) -> bool {
    evaluate(definition, ROOT_PATH, authentifiers, message)
}

fn evaluate(
    definition: &Definition,
    path: &str,
    authentifiers: &BTreeMap<String, Signature>,
    message: &[u8],
) -> bool {
    match definition {
        Definition::Sig { pubkey } => authentifiers
            .get(path)
            .is_some_and(|sig| verify_signature(message, sig, pubkey)),
        Definition::RofSet { required, set } => {
            if *required == 0 || *required as usize > set.len() {
                return false;
            }
            let satisfied = set
                .iter()
                .enumerate()
                .filter(|(i, member)| {
                    evaluate(member, &format!("{path}.{i}"), authentifiers, message)
                })
                .count();
            satisfied >= *required as usize
        }
    }
}
