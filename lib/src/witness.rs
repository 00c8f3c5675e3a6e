//! Withdrawal witness: the exact inputs the membership circuit consumes, and
//! the conversion of a finished proof into `withdraw(...)` call arguments.

use alloy_primitives::{Address, Bytes, B256, U256};
use alloy_sol_types::SolCall;
use ark_bn254::Fr;
use serde::{Deserialize, Serialize};

use crate::crypto::Hasher;
use crate::deposit::Deposit;
use crate::error::{Error, Result};
use crate::field::{field_modulus, fr_to_b256, fr_to_u256, to_hex, ADDRESS_SIZE, WORD_SIZE};
use crate::merkle_tree::MerkleProof;
use crate::ISmashnado;

/// Public circuit inputs, in the order the verifier contract checks them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicInputs {
    pub root: Fr,
    pub nullifier_hash: Fr,
    pub recipient: Address,
    pub relayer: Address,
    pub fee: U256,
    pub refund: U256,
}

impl PublicInputs {
    /// The six public signals as integers.
    pub fn signals(&self) -> [U256; 6] {
        [
            fr_to_u256(&self.root),
            fr_to_u256(&self.nullifier_hash),
            U256::from_be_slice(self.recipient.as_slice()),
            U256::from_be_slice(self.relayer.as_slice()),
            self.fee,
            self.refund,
        ]
    }
}

/// Private circuit inputs. Never leaves the process except in the prover's
/// input file.
#[derive(Clone, PartialEq, Eq)]
pub struct PrivateInputs {
    pub nullifier: Fr,
    pub secret: Fr,
    pub path_elements: Vec<Fr>,
    pub path_indices: Vec<u8>,
}

impl std::fmt::Debug for PrivateInputs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrivateInputs")
            .field("nullifier", &"<redacted>")
            .field("secret", &"<redacted>")
            .field("depth", &self.path_elements.len())
            .finish()
    }
}

/// Circuit input file layout: every field element as a decimal string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CircuitInput {
    pub root: String,
    pub nullifier_hash: String,
    pub recipient: String,
    pub relayer: String,
    pub fee: String,
    pub refund: String,
    pub nullifier: String,
    pub secret: String,
    pub path_elements: Vec<String>,
    pub path_indices: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WithdrawalWitness {
    pub public: PublicInputs,
    pub private: PrivateInputs,
}

impl WithdrawalWitness {
    /// Combine a deposit, its membership proof and the withdrawal parameters.
    ///
    /// # Arguments
    /// * `hasher` - Hash primitive the tree was built with
    /// * `deposit` - Deposit being withdrawn
    /// * `proof` - Membership proof for `deposit.commitment`
    /// * `recipient` - Address receiving the funds
    /// * `relayer` - Relayer address, zero for direct withdrawals
    /// * `fee` - Relayer fee in smallest units
    /// * `refund` - Native refund forwarded to the recipient
    ///
    /// # Returns
    /// * The witness, or an error if the path does not lead from the
    ///   deposit's commitment to `proof.root`
    pub fn assemble<H: Hasher>(
        hasher: &H,
        deposit: &Deposit,
        proof: &MerkleProof,
        recipient: Address,
        relayer: Address,
        fee: U256,
        refund: U256,
    ) -> Result<Self> {
        if proof.path_elements.is_empty() || proof.path_elements.len() != proof.path_indices.len() {
            return Err(Error::ProofGenerationFailed(format!(
                "path has {} elements and {} indices",
                proof.path_elements.len(),
                proof.path_indices.len()
            )));
        }
        if let Some(bit) = proof.path_indices.iter().find(|bit| **bit > 1) {
            return Err(Error::ProofGenerationFailed(format!(
                "path index {bit} is not a bit"
            )));
        }
        let modulus = field_modulus();
        if fee >= modulus || refund >= modulus {
            return Err(Error::EncodingOverflow {
                max_bytes: WORD_SIZE,
            });
        }
        if proof.compute_root(hasher, &deposit.commitment)? != proof.root {
            return Err(Error::StaleOrCorruptTree {
                root: to_hex(&fr_to_u256(&proof.root), WORD_SIZE),
            });
        }

        Ok(Self {
            public: PublicInputs {
                root: proof.root,
                nullifier_hash: deposit.nullifier_hash,
                recipient,
                relayer,
                fee,
                refund,
            },
            private: PrivateInputs {
                nullifier: deposit.nullifier,
                secret: deposit.secret,
                path_elements: proof.path_elements.clone(),
                path_indices: proof.path_indices.clone(),
            },
        })
    }

    pub fn to_circuit_input(&self) -> CircuitInput {
        let [root, nullifier_hash, recipient, relayer, fee, refund] =
            self.public.signals().map(|signal| signal.to_string());
        CircuitInput {
            root,
            nullifier_hash,
            recipient,
            relayer,
            fee,
            refund,
            nullifier: fr_to_u256(&self.private.nullifier).to_string(),
            secret: fr_to_u256(&self.private.secret).to_string(),
            path_elements: self
                .private
                .path_elements
                .iter()
                .map(|e| fr_to_u256(e).to_string())
                .collect(),
            path_indices: self.private.path_indices.clone(),
        }
    }
}

/// Proof as returned by the proving backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProofBlob {
    pub proof: Bytes,
    /// Empty when the backend does not report them.
    pub public_signals: Vec<U256>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawProof {
    proof: String,
    #[serde(default)]
    public_signals: Vec<String>,
}

impl ProofBlob {
    /// Parse `{ "proof": "0x…", "publicSignals": [...] }`. Signals may be hex
    /// (`0x` prefixed) or decimal.
    pub fn from_json(json: &str) -> Result<Self> {
        let raw: RawProof = serde_json::from_str(json)
            .map_err(|e| Error::ProofGenerationFailed(format!("unreadable proof output: {e}")))?;

        let proof_hex = raw.proof.strip_prefix("0x").unwrap_or(&raw.proof);
        let proof = hex::decode(proof_hex)
            .map_err(|e| Error::ProofGenerationFailed(format!("proof is not hex: {e}")))?;

        let public_signals = raw
            .public_signals
            .iter()
            .map(|signal| parse_signal(signal))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            proof: proof.into(),
            public_signals,
        })
    }
}

fn parse_signal(signal: &str) -> Result<U256> {
    let parsed = match signal.strip_prefix("0x") {
        Some(hex) => U256::from_str_radix(hex, 16),
        None => U256::from_str_radix(signal, 10),
    };
    parsed.map_err(|e| Error::ProofGenerationFailed(format!("bad public signal {signal:?}: {e}")))
}

/// Arguments of `withdraw(proof, root, nullifierHash, recipient, relayer, fee, refund)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallArguments {
    pub proof: Bytes,
    pub root: B256,
    pub nullifier_hash: B256,
    pub recipient: Address,
    pub relayer: Address,
    pub fee: U256,
    pub refund: U256,
}

impl CallArguments {
    /// Fixed-width hex words as the relayer's `args` array expects them.
    pub fn to_hex_args(&self) -> [String; 6] {
        [
            to_hex(&U256::from_be_bytes(self.root.0), WORD_SIZE),
            to_hex(&U256::from_be_bytes(self.nullifier_hash.0), WORD_SIZE),
            to_hex(&U256::from_be_slice(self.recipient.as_slice()), ADDRESS_SIZE),
            to_hex(&U256::from_be_slice(self.relayer.as_slice()), ADDRESS_SIZE),
            to_hex(&self.fee, WORD_SIZE),
            to_hex(&self.refund, WORD_SIZE),
        ]
    }

    /// ABI-encoded `withdraw` calldata for direct submission.
    pub fn withdraw_calldata(&self) -> Bytes {
        ISmashnado::withdrawCall {
            proof: self.proof.clone(),
            root: self.root,
            nullifierHash: self.nullifier_hash,
            recipient: self.recipient,
            relayer: self.relayer,
            fee: self.fee,
            refund: self.refund,
        }
        .abi_encode()
        .into()
    }
}

/// Turn a proof into call arguments, checking any reported public signals
/// against the witness they were supposed to prove.
pub fn encode_for_submission(blob: &ProofBlob, public: &PublicInputs) -> Result<CallArguments> {
    if blob.proof.is_empty() {
        return Err(Error::ProofGenerationFailed("backend returned an empty proof".into()));
    }
    if !blob.public_signals.is_empty() && blob.public_signals != public.signals() {
        return Err(Error::ProofGenerationFailed(
            "public signals in the proof do not match the witness".into(),
        ));
    }

    Ok(CallArguments {
        proof: blob.proof.clone(),
        root: fr_to_b256(&public.root),
        nullifier_hash: fr_to_b256(&public.nullifier_hash),
        recipient: public.recipient,
        relayer: public.relayer,
        fee: public.fee,
        refund: public.refund,
    })
}
