//! Commitment derivation: `(nullifier, secret)` to the deposit triple.

use std::fmt;

use alloy_primitives::U256;
use ark_bn254::Fr;
use rand::{rngs::OsRng, RngCore};

use crate::crypto::Hasher;
use crate::error::{Error, Result};
use crate::field::{fr_from_u256, fr_to_hex, from_le, to_le31, SECRET_SIZE};

/// Length of `LE31(nullifier) ++ LE31(secret)`.
pub const PREIMAGE_SIZE: usize = 2 * SECRET_SIZE;

/// The secret material behind one pool deposit.
///
/// `commitment = H(preimage)` is the tree leaf published on deposit and
/// `nullifier_hash = H(LE31(nullifier))` is revealed on withdrawal. The
/// remaining fields are spend authority and are redacted from `Debug`.
#[derive(Clone, PartialEq, Eq)]
pub struct Deposit {
    pub nullifier: Fr,
    pub secret: Fr,
    pub preimage: [u8; PREIMAGE_SIZE],
    pub commitment: Fr,
    pub nullifier_hash: Fr,
}

impl Deposit {
    /// Derive the full deposit from its two secrets.
    ///
    /// Fails with `EncodingOverflow` if either value needs more than 31 bytes.
    pub fn derive<H: Hasher>(hasher: &H, nullifier: U256, secret: U256) -> Result<Self> {
        let nullifier_le = to_le31(&nullifier)?;
        let secret_le = to_le31(&secret)?;

        let mut preimage = [0u8; PREIMAGE_SIZE];
        preimage[..SECRET_SIZE].copy_from_slice(&nullifier_le);
        preimage[SECRET_SIZE..].copy_from_slice(&secret_le);

        let commitment = hasher.hash_bytes(&preimage)?;
        let nullifier_hash = hasher.hash_bytes(&nullifier_le)?;

        Ok(Self {
            nullifier: fr_from_u256(&nullifier)?,
            secret: fr_from_u256(&secret)?,
            preimage,
            commitment,
            nullifier_hash,
        })
    }

    /// Fresh deposit with both secrets drawn from the OS entropy source.
    pub fn random<H: Hasher>(hasher: &H) -> Result<Self> {
        let mut nullifier = [0u8; SECRET_SIZE];
        let mut secret = [0u8; SECRET_SIZE];
        OsRng.fill_bytes(&mut nullifier);
        OsRng.fill_bytes(&mut secret);
        Self::derive(hasher, from_le(&nullifier), from_le(&secret))
    }

    /// Rebuild a deposit from its 62-byte preimage, recomputing both hashes.
    pub fn from_preimage<H: Hasher>(hasher: &H, preimage: &[u8]) -> Result<Self> {
        if preimage.len() != PREIMAGE_SIZE {
            return Err(Error::MalformedNote(format!(
                "preimage is {} bytes, expected {PREIMAGE_SIZE}",
                preimage.len()
            )));
        }
        Self::derive(
            hasher,
            from_le(&preimage[..SECRET_SIZE]),
            from_le(&preimage[SECRET_SIZE..]),
        )
    }

    /// Commitment as the `bytes32` hex the contract expects.
    pub fn commitment_hex(&self) -> String {
        fr_to_hex(&self.commitment)
    }

    /// Nullifier hash as the `bytes32` hex the contract expects.
    pub fn nullifier_hash_hex(&self) -> String {
        fr_to_hex(&self.nullifier_hash)
    }
}

impl fmt::Debug for Deposit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Deposit")
            .field("nullifier", &"<redacted>")
            .field("secret", &"<redacted>")
            .field("commitment", &self.commitment_hex())
            .field("nullifier_hash", &self.nullifier_hash_hex())
            .finish()
    }
}

impl fmt::Display for Deposit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Deposit(commitment: {})", self.commitment_hex())
    }
}
