//! Address type: the checksummed chash of an address definition.

use serde::{Deserialize, Serialize};
use std::fmt;

/// An address, i.e. the base32 chash of the definition that controls it.
///
/// Well-formedness (alphabet, length, checksum) is checked by
/// `tessera_crypto::validate_address`; this type is only a carrier.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Address(String);

impl Address {
    /// Length of an encoded address: 160-bit digest plus 40-bit checksum in base32.
    pub const ENCODED_LEN: usize = 40;

    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Return the raw address string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for Address {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for Address {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}
