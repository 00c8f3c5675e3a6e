//! Hash primitive used by the commitment scheme and the deposit tree.
//!
//! The protocol only needs two operations from its hash: compress a byte
//! string into a field element (commitments, nullifier hashes) and compress
//! two field elements into one (tree nodes). [`Hasher`] captures exactly
//! that, so the rest of the crate never depends on a concrete primitive.

use alloy_primitives::keccak256;
use ark_bn254::Fr;
use ark_ff::PrimeField;
use light_poseidon::{Poseidon, PoseidonHasher as _};

use crate::error::{Error, Result};
use crate::field::SECRET_SIZE;

/// Seed whose Keccak-256 digest (reduced mod p) is the empty-leaf value.
///
/// Must match the `ZERO_VALUE` the pool contract was deployed with.
pub const ZERO_VALUE_SEED: &[u8] = b"tornado";

/// Largest number of field inputs a single circom Poseidon permutation takes.
const MAX_POSEIDON_INPUTS: usize = 12;

/// Hash primitive shared by the commitment deriver and the merkle tree.
pub trait Hasher {
    /// Hash an arbitrary byte string into a field element.
    fn hash_bytes(&self, data: &[u8]) -> Result<Fr>;

    /// Two-to-one compression for internal tree nodes.
    fn hash_pair(&self, left: &Fr, right: &Fr) -> Result<Fr>;
}

impl<H: Hasher + ?Sized> Hasher for &H {
    fn hash_bytes(&self, data: &[u8]) -> Result<Fr> {
        (**self).hash_bytes(data)
    }

    fn hash_pair(&self, left: &Fr, right: &Fr) -> Result<Fr> {
        (**self).hash_pair(left, right)
    }
}

/// Circom-compatible Poseidon over BN254.
///
/// Byte strings are split into 31-byte little-endian limbs, one field input
/// per limb, so a 62-byte preimage hashes as `Poseidon(nullifier, secret)`
/// and a 31-byte nullifier as `Poseidon(nullifier)`.
#[derive(Debug, Default, Clone, Copy)]
pub struct PoseidonHasher;

impl PoseidonHasher {
    fn hash_inputs(inputs: &[Fr]) -> Result<Fr> {
        let mut poseidon =
            Poseidon::<Fr>::new_circom(inputs.len()).map_err(|e| Error::HashFailed(e.to_string()))?;
        poseidon
            .hash(inputs)
            .map_err(|e| Error::HashFailed(e.to_string()))
    }
}

impl Hasher for PoseidonHasher {
    fn hash_bytes(&self, data: &[u8]) -> Result<Fr> {
        let limbs: Vec<Fr> = if data.is_empty() {
            vec![Fr::from(0u64)]
        } else {
            data.chunks(SECRET_SIZE)
                .map(Fr::from_le_bytes_mod_order)
                .collect()
        };
        if limbs.len() > MAX_POSEIDON_INPUTS {
            return Err(Error::HashFailed(format!(
                "{} bytes exceed the {} limb poseidon width",
                data.len(),
                MAX_POSEIDON_INPUTS
            )));
        }
        Self::hash_inputs(&limbs)
    }

    fn hash_pair(&self, left: &Fr, right: &Fr) -> Result<Fr> {
        Self::hash_inputs(&[*left, *right])
    }
}

/// The empty-leaf placeholder: `keccak256(ZERO_VALUE_SEED) mod p`.
pub fn zero_value() -> Fr {
    Fr::from_be_bytes_mod_order(keccak256(ZERO_VALUE_SEED).as_slice())
}
