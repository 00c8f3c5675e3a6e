//! Error taxonomy for the withdrawal protocol.
//!
//! Every failure the core can produce is one variant of [`Error`]. Adapters
//! (ledger, relayer, prover) translate their transport errors into this enum
//! once, at the boundary, so callers only ever match on these kinds.

use alloy_primitives::{B256, U256};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("value does not fit in {max_bytes} bytes")]
    EncodingOverflow { max_bytes: usize },

    #[error("malformed note: {0}")]
    MalformedNote(String),

    #[error("commitment {commitment} not found among {deposits} deposit events")]
    CommitmentNotFound { commitment: String, deposits: usize },

    #[error("leaf index {leaf_index} does not fit in a tree of {capacity} leaves")]
    TreeOverflow { leaf_index: u64, capacity: u64 },

    #[error("unsupported merkle tree height {0}")]
    InvalidTreeHeight(usize),

    #[error("deposit events contain leaf index {0} more than once")]
    DuplicateLeafIndex(u32),

    #[error("deposit events are not contiguous: expected leaf index {expected}, found {found}")]
    LeafIndexGap { expected: u32, found: u32 },

    #[error("merkle root {root} is not known to the contract")]
    StaleOrCorruptTree { root: String },

    #[error("note with nullifier hash {nullifier_hash} is already spent")]
    NoteSpent { nullifier_hash: String },

    #[error("proof generation failed: {0}")]
    ProofGenerationFailed(String),

    #[error("fee {fee} exceeds withdrawal amount {amount}")]
    FeeExceedsAmount { fee: U256, amount: U256 },

    #[error("note is for network {expected} but the {reporter} is on network {actual}")]
    WrongNetwork {
        expected: u64,
        actual: String,
        reporter: &'static str,
    },

    #[error("invalid recipient address: {0}")]
    InvalidRecipient(String),

    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error("no pool instance for {amount} {currency} on network {net_id}")]
    UnknownInstance {
        currency: String,
        amount: String,
        net_id: u64,
    },

    #[error("transaction {tx_hash} was not mined after {attempts} attempts")]
    NotMinedTimeout { tx_hash: B256, attempts: u32 },

    #[error("withdrawal was cancelled")]
    Cancelled,

    #[error("relayer rejected the request: {0}")]
    RelayerRejected(String),

    #[error("ledger call `{call}` failed: {reason}")]
    LedgerCallFailed { call: &'static str, reason: String },

    #[error("hash primitive failed: {0}")]
    HashFailed(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
    /// Shorthand for wrapping any displayable ledger-side failure.
    pub fn ledger(call: &'static str, reason: impl std::fmt::Display) -> Self {
        Error::LedgerCallFailed {
            call,
            reason: reason.to_string(),
        }
    }

    /// Operational failures where retrying the whole withdrawal is safe.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Error::NotMinedTimeout { .. } | Error::RelayerRejected(_) | Error::LedgerCallFailed { .. }
        )
    }

    /// Failures the user has to act on (fix the note, the recipient, the fee).
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            Error::MalformedNote(_)
                | Error::CommitmentNotFound { .. }
                | Error::FeeExceedsAmount { .. }
                | Error::InvalidRecipient(_)
                | Error::InvalidAmount(_)
                | Error::UnknownInstance { .. }
                | Error::NoteSpent { .. }
                | Error::WrongNetwork { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(Error::ledger("isKnownRoot", "connection reset").is_transient());
        assert!(Error::RelayerRejected("busy".into()).is_transient());
        assert!(Error::NotMinedTimeout {
            tx_hash: B256::ZERO,
            attempts: 60
        }
        .is_transient());

        // A root the ledger disagrees with must never look retryable.
        let stale = Error::StaleOrCorruptTree { root: "0x01".into() };
        assert!(!stale.is_transient());
        assert!(!stale.is_user_error());
    }

    #[test]
    fn test_user_error_classification() {
        assert!(Error::MalformedNote("bad prefix".into()).is_user_error());
        assert!(Error::FeeExceedsAmount {
            fee: U256::from(2),
            amount: U256::from(1)
        }
        .is_user_error());
        assert!(!Error::Cancelled.is_user_error());
    }

    #[test]
    fn test_error_messages_carry_context() {
        let err = Error::LeafIndexGap {
            expected: 3,
            found: 5,
        };
        assert_eq!(
            err.to_string(),
            "deposit events are not contiguous: expected leaf index 3, found 5"
        );
    }
}
