//! Addresses: the checksummed chash of an address definition.
//!
//! Address format: base32(digest, 32 chars) + base32(checksum, 8 chars)
//!
//! - digest: Blake2b-160 of the bincode-encoded definition
//! - checksum: first 5 bytes of Blake2b-256(digest)
//! - alphabet: `13456789abcdefghijkmnopqrstuwxyz` (avoids ambiguous chars)

use blake2::digest::consts::U20;
use blake2::{Blake2b, Digest};
use tessera_types::{Address, Definition};

type Blake2b160 = Blake2b<U20>;

/// Number of base32 characters for the digest (160 bits → 32).
const DIGEST_CHARS: usize = 32;

/// Base32 alphabet (32 chars, avoids visually ambiguous 0/O, 2/Z, l/I, v).
const BASE32_ALPHABET: &[u8; 32] = b"13456789abcdefghijkmnopqrstuwxyz";

/// Reverse lookup table: ASCII byte → 5-bit value (0xFF = invalid).
const BASE32_DECODE: [u8; 128] = {
    let mut table = [0xFFu8; 128];
    let alpha = BASE32_ALPHABET;
    let mut i = 0;
    while i < 32 {
        table[alpha[i] as usize] = i as u8;
        i += 1;
    }
    table
};


/// Encode a byte slice as base32.
fn encode_base32(bytes: &[u8]) -> String {
    let total_bits = bytes.len() * 8;
    let num_chars = total_bits.div_ceil(5);
    let mut result = String::with_capacity(num_chars);

    let mut buffer: u64 = 0;
    let mut bits_in_buffer = 0;

    for &byte in bytes {
        buffer = (buffer << 8) | byte as u64;
        bits_in_buffer += 8;
        while bits_in_buffer >= 5 {
            bits_in_buffer -= 5;
            let idx = ((buffer >> bits_in_buffer) & 0x1F) as usize;
            result.push(BASE32_ALPHABET[idx] as char);
        }
    }
    // Remaining bits (padded with zeros on the right).
    if bits_in_buffer > 0 {
        let idx = ((buffer << (5 - bits_in_buffer)) & 0x1F) as usize;
        result.push(BASE32_ALPHABET[idx] as char);
    }

    result
}

/// Decode a base32 string into a fixed-size byte array. Returns `None` on
/// invalid characters or wrong length. Zero-allocation.
fn decode_base32_fixed<const N: usize>(s: &str) -> Option<[u8; N]> {
    let mut buffer: u64 = 0;
    let mut bits_in_buffer = 0;
    let mut result = [0u8; N];
    let mut pos = 0;

    for c in s.bytes() {
        if c >= 128 {
            return None;
        }
        let val = BASE32_DECODE[c as usize];
        if val == 0xFF {
            return None;
        }
        buffer = (buffer << 5) | val as u64;
        bits_in_buffer += 5;
        if bits_in_buffer >= 8 {
            bits_in_buffer -= 8;
            if pos < N {
                result[pos] = (buffer >> bits_in_buffer) as u8;
                pos += 1;
            }
        }
    }

    if pos < N {
        return None;
    }
    Some(result)
}

/// Derive the address controlled by `definition`.
pub fn definition_chash(definition: &Definition) -> Address {
    let bytes = bincode::serialize(definition).expect("definitions are always serializable");
    let mut hasher = Blake2b160::new();
    hasher.update(&bytes);
    let digest: [u8; 20] = hasher.finalize().into();
    let checksum = crate::blake2b_256(&digest);
    Address::new(format!(
        "{}{}",
        encode_base32(&digest),
        encode_base32(&checksum[..5])
    ))
}

/// Validate that an address string is well-formed and its checksum is correct.
pub fn validate_address(address: &str) -> bool {
    if address.len() != Address::ENCODED_LEN {
        return false;
    }
    let (digest_encoded, checksum_encoded) = address.split_at(DIGEST_CHARS);
    let Some(digest) = decode_base32_fixed::<20>(digest_encoded) else {
        return false;
    };
    let Some(checksum) = decode_base32_fixed::<5>(checksum_encoded) else {
        return false;
    };
    checksum == crate::blake2b_256(&digest)[..5]
}
