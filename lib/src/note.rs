use std::fmt;

use crate::crypto::Hasher;
use crate::deposit::{Deposit, PREIMAGE_SIZE};
use crate::error::{Error, Result};
use crate::field::bytes_to_hex;

/// Scheme tag every note starts with.
pub const NOTE_PREFIX: &str = "smashcash";

const PAYLOAD_HEX_LEN: usize = PREIMAGE_SIZE * 2;

/// A deposit together with the pool instance it belongs to.
///
/// The encoded string is the only thing a user has to keep to withdraw;
/// whoever holds it can spend the deposit, so `Display` never prints the
/// payload. Use [`Note::encode`] to get the real string.
#[derive(Clone, PartialEq, Eq)]
pub struct Note {
    pub currency: String,
    pub amount: String,
    pub net_id: u64,
    pub deposit: Deposit,
}

impl Note {
    pub fn new(
        deposit: Deposit,
        currency: impl Into<String>,
        amount: impl Into<String>,
        net_id: u64,
    ) -> Self {
        Self {
            currency: currency.into(),
            amount: amount.into(),
            net_id,
            deposit,
        }
    }

    /// `smashcash-<currency>-<amount>-<netId>-0x<124 hex chars>`
    pub fn encode(&self) -> String {
        format!(
            "{NOTE_PREFIX}-{}-{}-{}-{}",
            self.currency,
            self.amount,
            self.net_id,
            bytes_to_hex(&self.deposit.preimage)
        )
    }

    /// Parse a note string.
    ///
    /// The commitment and nullifier hash are always recomputed from the
    /// preimage, so a corrupted payload shows up later as a missing leaf
    /// rather than as a commitment the note merely claims.
    pub fn decode<H: Hasher>(hasher: &H, note: &str) -> Result<Self> {
        let note = note.trim();
        let body = note
            .strip_prefix(NOTE_PREFIX)
            .and_then(|rest| rest.strip_prefix('-'))
            .ok_or_else(|| malformed(format!("missing `{NOTE_PREFIX}-` prefix")))?;

        let parts: Vec<&str> = body.split('-').collect();
        let [currency, amount, net_id, payload] = parts.as_slice() else {
            return Err(malformed(format!(
                "expected 4 fields after the prefix, found {}",
                parts.len()
            )));
        };

        if currency.is_empty()
            || !currency
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Err(malformed(format!("invalid currency {currency:?}")));
        }
        if !is_decimal(amount) {
            return Err(malformed(format!("invalid amount {amount:?}")));
        }
        if net_id.is_empty() || !net_id.bytes().all(|b| b.is_ascii_digit()) {
            return Err(malformed(format!("invalid network id {net_id:?}")));
        }
        let net_id: u64 = net_id
            .parse()
            .map_err(|_| malformed(format!("network id {net_id:?} out of range")))?;

        let hex_payload = payload
            .strip_prefix("0x")
            .ok_or_else(|| malformed("payload must start with 0x".into()))?;
        if hex_payload.len() != PAYLOAD_HEX_LEN {
            return Err(malformed(format!(
                "payload has {} hex characters, expected {PAYLOAD_HEX_LEN}",
                hex_payload.len()
            )));
        }
        let preimage =
            hex::decode(hex_payload).map_err(|e| malformed(format!("payload is not hex: {e}")))?;

        let deposit = Deposit::from_preimage(hasher, &preimage)?;
        Ok(Self::new(deposit, *currency, *amount, net_id))
    }
}

fn malformed(reason: String) -> Error {
    Error::MalformedNote(reason)
}

/// Digits with at most one `.` and at least one digit.
fn is_decimal(s: &str) -> bool {
    let dots = s.bytes().filter(|b| *b == b'.').count();
    let digits = s.bytes().filter(|b| b.is_ascii_digit()).count();
    dots <= 1 && digits > 0 && dots + digits == s.len()
}

impl fmt::Display for Note {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{NOTE_PREFIX}-{}-{}-{}-0x<redacted>",
            self.currency, self.amount, self.net_id
        )
    }
}

impl fmt::Debug for Note {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Note")
            .field("currency", &self.currency)
            .field("amount", &self.amount)
            .field("net_id", &self.net_id)
            .field("deposit", &self.deposit)
            .finish()
    }
}
