//! Deposit flow: generate a note, persist it, then fund the pool.

use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use alloy::primitives::{B256, U256};
use anyhow::{bail, Context, Result};
use smashcash_lib::{field::fr_to_b256, Deposit, Note, PoseidonHasher};
use tracing::info;

use crate::config::PoolInstance;
use crate::ledger::Ledger;
use crate::withdraw::{wait_for_receipt, CancelToken, PollConfig};

/// `secret_key_<currency>_<amount>.txt`
pub fn note_file_name(currency: &str, amount: &str) -> String {
    format!("secret_key_{currency}_{amount}.txt")
}

/// Write the note into `dir`, refusing to overwrite an existing one.
///
/// Each candidate name is created exclusively, so a file that appears
/// between attempts moves the note to the next `_N` suffix.
pub fn save_note(dir: &Path, note: &Note) -> Result<PathBuf> {
    let base = note_file_name(&note.currency, &note.amount);
    let stem = base.trim_end_matches(".txt");
    let mut path = dir.join(&base);
    let mut counter = 1;
    loop {
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(mut file) => {
                file.write_all(note.encode().as_bytes())
                    .and_then(|_| file.sync_all())
                    .with_context(|| format!("failed to save note to {}", path.display()))?;
                return Ok(path);
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                path = dir.join(format!("{stem}_{counter}.txt"));
                counter += 1;
            }
            Err(e) => {
                return Err(e).with_context(|| format!("failed to save note to {}", path.display()));
            }
        }
    }
}

#[derive(Debug)]
pub struct DepositOutcome {
    pub note: Note,
    pub note_path: PathBuf,
    pub tx_hash: B256,
    pub block_number: Option<u64>,
}

/// Create and submit one deposit into `instance`.
///
/// The note is written to `note_dir` before anything is sent, so a failed
/// or interrupted submission never loses the secret.
pub async fn make_deposit(
    ledger: &dyn Ledger,
    instance: &PoolInstance,
    note_dir: &Path,
    poll: &PollConfig,
    cancel: &mut CancelToken,
) -> Result<DepositOutcome> {
    let deposit = Deposit::random(&PoseidonHasher)?;
    let note = Note::new(deposit, &instance.currency, &instance.amount, instance.net_id);
    let note_path = save_note(note_dir, &note)?;
    info!(path = %note_path.display(), commitment = %note.deposit.commitment_hex(), "note saved");

    let amount = instance.amount_units()?;
    let sender = ledger
        .sender()
        .context("a private key is required to deposit")?;

    let value = if instance.is_native() {
        let balance = ledger.native_balance(sender).await?;
        if balance < amount {
            bail!(
                "insufficient {} balance: have {balance}, need {amount}",
                instance.symbol
            );
        }
        amount
    } else {
        let token = instance
            .token_address
            .with_context(|| format!("no token address configured for {}", instance.currency))?;
        let allowance = ledger.allowance(token, sender, instance.address).await?;
        if allowance < amount {
            info!(%allowance, %amount, "approving pool to spend tokens");
            let approval = ledger.approve(token, instance.address, amount).await?;
            wait_for_receipt(ledger, approval, poll, cancel).await?;
        }
        U256::ZERO
    };

    let commitment = fr_to_b256(&note.deposit.commitment);
    let tx_hash = ledger
        .submit_deposit(instance.address, commitment, value)
        .await?;
    let receipt = wait_for_receipt(ledger, tx_hash, poll, cancel).await?;
    info!(%tx_hash, block = ?receipt.block_number, "deposit confirmed");

    Ok(DepositOutcome {
        note,
        note_path,
        tx_hash,
        block_number: receipt.block_number,
    })
}
