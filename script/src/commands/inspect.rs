use anyhow::{anyhow, Result};
use clap::Args;
use colored::*;
use smashcash_lib::field::fr_to_b256;
use smashcash_lib::{Note, PoseidonHasher};

use super::{expand_env_vars, print_header, spinner, ConnectionArgs};
use crate::config::resolve_instance;
use crate::ledger::Ledger;

/// Look up the deposit behind a note and whether it has been withdrawn
#[derive(Args, Debug)]
pub struct InspectCommand {
    /// Note string (accepts $VAR)
    #[arg(long, short = 'n')]
    pub note: String,

    /// First block to scan for deposit events
    #[arg(long, default_value_t = 0)]
    pub from_block: u64,

    #[command(flatten)]
    pub connection: ConnectionArgs,
}

impl InspectCommand {
    pub async fn execute(&self) -> Result<()> {
        print_header("🔍 Smashcash - Inspect Note");

        let note = Note::decode(&PoseidonHasher, &expand_env_vars(&self.note)?)?;
        let instance = resolve_instance(
            note.net_id,
            &note.currency,
            &note.amount,
            self.connection.contract_address()?,
        )?;

        println!("{} {}", "Note:".bright_white(), note.to_string().bright_yellow());
        println!("{} {}", "Commitment:".bright_white(), note.deposit.commitment_hex().bright_cyan());
        println!(
            "{} {}",
            "Nullifier hash:".bright_white(),
            note.deposit.nullifier_hash_hex().bright_cyan()
        );

        let ledger = self.connection.connect(None).await?;
        let pb = spinner("cyan", "Fetching deposit events...");
        let events = ledger
            .deposit_events(instance.address, self.from_block)
            .await;
        pb.finish_and_clear();
        let events = events?;

        let event = events
            .iter()
            .find(|event| event.commitment == note.deposit.commitment)
            .ok_or_else(|| {
                anyhow!(
                    "Commitment not found among {} deposits of {} {}",
                    events.len(),
                    instance.amount,
                    instance.symbol
                )
            })?;

        println!();
        println!("{}", "📋 Deposit".bright_green().bold());
        println!("{}", "─".repeat(30).bright_black());
        println!("{} {} of {}", "Leaf index:".bright_white(), event.leaf_index, events.len());
        if let Some(block) = event.block.block_number {
            println!("{} {}", "Block:".bright_white(), block);
        }
        if let Some(tx) = event.block.transaction_hash {
            println!("{} {}", "Transaction:".bright_white(), tx.to_string().bright_cyan());
        }
        if let Some(timestamp) = event.block.timestamp {
            println!("{} {} (unix)", "Timestamp:".bright_white(), timestamp);
        }

        let spent = ledger
            .is_spent(instance.address, fr_to_b256(&note.deposit.nullifier_hash))
            .await?;
        let status = if spent {
            "withdrawn".bright_red()
        } else {
            "not withdrawn".bright_green()
        };
        println!("{} {}", "Status:".bright_white(), status);
        Ok(())
    }
}
