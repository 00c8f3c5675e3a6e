//! Fixed-width encodings between byte buffers, 256-bit integers and BN254
//! field elements.
//!
//! The circuit consumes secrets as 31-byte little-endian integers and the
//! contract consumes everything else as 32-byte big-endian words. Every
//! conversion between those worlds goes through this module.

use alloy_primitives::{B256, U256};
use ark_bn254::Fr;
use ark_ff::{BigInteger, PrimeField};

use crate::error::{Error, Result};

/// Width of a secret (nullifier or secret) in bytes.
///
/// 31 bytes keeps every value strictly below the BN254 scalar modulus, so
/// the little-endian integer maps into the field without reduction.
pub const SECRET_SIZE: usize = 31;

/// Width of a contract word in bytes.
pub const WORD_SIZE: usize = 32;

/// Width of an address argument in bytes.
pub const ADDRESS_SIZE: usize = 20;

/// The BN254 scalar field modulus as a 256-bit integer.
pub fn field_modulus() -> U256 {
    U256::from_le_slice(&Fr::MODULUS.to_bytes_le())
}

/// Encode `value` as exactly [`SECRET_SIZE`] little-endian bytes.
///
/// # Arguments
/// * `value` - Integer to encode, must be `< 2^248`
///
/// # Returns
/// * The fixed-width encoding, or `EncodingOverflow` if the value is too wide
pub fn to_le31(value: &U256) -> Result<[u8; SECRET_SIZE]> {
    if value.bit_len() > SECRET_SIZE * 8 {
        return Err(Error::EncodingOverflow {
            max_bytes: SECRET_SIZE,
        });
    }
    let le = value.to_le_bytes::<WORD_SIZE>();
    let mut out = [0u8; SECRET_SIZE];
    out.copy_from_slice(&le[..SECRET_SIZE]);
    Ok(out)
}

/// Decode a little-endian byte buffer into an integer.
///
/// # Arguments
/// * `bytes` - At most 32 little-endian bytes
///
/// # Returns
/// * The decoded integer
pub fn from_le(bytes: &[u8]) -> U256 {
    U256::from_le_slice(bytes)
}

/// Convert an integer into a field element, rejecting non-canonical values.
///
/// # Arguments
/// * `value` - Integer that must be below the field modulus
///
/// # Returns
/// * The field element, or `EncodingOverflow` if `value >= p`
pub fn fr_from_u256(value: &U256) -> Result<Fr> {
    if *value >= field_modulus() {
        return Err(Error::EncodingOverflow {
            max_bytes: WORD_SIZE,
        });
    }
    Ok(Fr::from_le_bytes_mod_order(&value.to_le_bytes::<WORD_SIZE>()))
}

/// Canonical integer representation of a field element.
pub fn fr_to_u256(value: &Fr) -> U256 {
    U256::from_le_slice(&value.into_bigint().to_bytes_le())
}

/// Field element as a 32-byte big-endian contract word.
pub fn fr_to_b256(value: &Fr) -> B256 {
    B256::from(fr_to_u256(value).to_be_bytes::<WORD_SIZE>())
}

/// Parse a 32-byte big-endian contract word into a field element.
///
/// Words at or above the modulus are rejected rather than reduced, since a
/// reduced value would silently name a different leaf.
pub fn fr_from_b256(word: &B256) -> Result<Fr> {
    fr_from_u256(&U256::from_be_bytes(word.0))
}

/// Format an integer as `0x`-prefixed hex, left-padded to `length` bytes.
///
/// # Arguments
/// * `value` - Integer to format
/// * `length` - Width in bytes of the padded output
///
/// # Returns
/// * Hex string of at least `2 * length` digits after the prefix
pub fn to_hex(value: &U256, length: usize) -> String {
    let digits = format!("{value:x}");
    format!("0x{digits:0>width$}", width = length * 2)
}

/// Format a field element as a `0x`-prefixed 32-byte hex word.
pub fn fr_to_hex(value: &Fr) -> String {
    to_hex(&fr_to_u256(value), WORD_SIZE)
}

/// Format raw bytes as `0x`-prefixed hex.
pub fn bytes_to_hex(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}
