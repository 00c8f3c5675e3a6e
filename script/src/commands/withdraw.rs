use std::path::PathBuf;

use alloy::primitives::U256;
use anyhow::{anyhow, Result};
use clap::Args;
use colored::*;
use dialoguer::{Confirm, Input};
use smashcash_lib::units::{from_decimals, to_decimals};
use smashcash_lib::{Note, PoseidonHasher};
use tracing::warn;

use super::{expand_env_vars, print_header, spinner, ConnectionArgs};
use crate::config::resolve_instance;
use crate::prover::CommandProver;
use crate::relayer::RelayerClient;
use crate::withdraw::{cancellation, parse_recipient, PollConfig, Withdrawal};

/// Withdraw a deposit to a fresh address using its note
#[derive(Args, Debug)]
pub struct WithdrawCommand {
    /// Note string from the deposit (will prompt if not provided, accepts $VAR)
    #[arg(long, short = 'n')]
    pub note: Option<String>,

    /// Address receiving the funds
    #[arg(long, short = 't')]
    pub recipient: Option<String>,

    /// Relayer URL; omit to submit the withdrawal yourself
    #[arg(long, env = "RELAYER_URL")]
    pub relayer: Option<String>,

    /// Native currency refund forwarded to the recipient (token pools only)
    #[arg(long, default_value = "0")]
    pub refund: String,

    /// Merkle tree height of the pool
    #[arg(long, env = "MERKLE_TREE_HEIGHT", default_value_t = 20)]
    pub tree_height: usize,

    /// First block to scan for deposit events
    #[arg(long, default_value_t = 0)]
    pub from_block: u64,

    /// Prover command; receives input, circuit, proving key and output paths
    #[arg(long, env = "PROVER_CMD", default_value = "snarkjs-prove")]
    pub prover: String,

    /// Circuit file handed to the prover
    #[arg(long, env = "CIRCUIT_PATH", default_value = "build/circuits/withdraw.json")]
    pub circuit: PathBuf,

    /// Proving key handed to the prover
    #[arg(long, env = "PROVING_KEY_PATH", default_value = "build/circuits/withdraw_proving_key.bin")]
    pub proving_key: PathBuf,

    #[command(flatten)]
    pub connection: ConnectionArgs,

    /// Skip confirmation prompts
    #[arg(long, short = 'y')]
    pub yes: bool,
}

impl WithdrawCommand {
    pub async fn execute(&self) -> Result<()> {
        print_header("🕶️ Smashcash - Withdraw");

        let raw_note = match &self.note {
            Some(note) => expand_env_vars(note)?,
            None => Input::new()
                .with_prompt(format!("{} Note", "🔑".bright_yellow()))
                .interact_text()?,
        };
        let note = Note::decode(&PoseidonHasher, &raw_note)?;

        let recipient = match &self.recipient {
            Some(recipient) => recipient.clone(),
            None => Input::new()
                .with_prompt(format!("{} Recipient address", "🎯".bright_green()))
                .validate_with(|input: &String| -> Result<(), &str> {
                    parse_recipient(input)
                        .map(|_| ())
                        .map_err(|_| "Please enter a valid address (0x + 40 hex characters)")
                })
                .interact_text()?,
        };
        parse_recipient(&recipient)?;

        let instance = resolve_instance(
            note.net_id,
            &note.currency,
            &note.amount,
            self.connection.contract_address()?,
        )?;
        let refund = from_decimals(&self.refund, 18)?;

        let private_key = self.connection.signing_key()?;
        if self.relayer.is_none() && private_key.is_none() {
            return Err(anyhow!(
                "Without a relayer a private key is required to submit the withdrawal"
            ));
        }
        let ledger = self.connection.connect(private_key.as_deref()).await?;
        let prover = CommandProver::from_command_line(&self.prover, &self.circuit, &self.proving_key)?;
        let relayer = self
            .relayer
            .as_deref()
            .map(expand_env_vars)
            .transpose()?
            .map(|url| RelayerClient::new(&url))
            .transpose()?;

        println!();
        println!("{}", "📋 Withdrawal Details".bright_green().bold());
        println!("{}", "─".repeat(30).bright_black());
        println!("{} {}", "Note:".bright_white(), note.to_string().bright_yellow());
        println!("{} {}", "Recipient:".bright_white(), recipient.bright_cyan());
        println!("{} {}", "Pool:".bright_white(), instance.address.to_string().bright_cyan());
        match &relayer {
            Some(client) => println!("{} {}", "Relayer:".bright_white(), client.base_url().bright_cyan()),
            None => println!("{} {}", "Relayer:".bright_white(), "none, submitting directly".bright_yellow()),
        }
        if refund > U256::ZERO {
            println!("{} {}", "Refund:".bright_white(), to_decimals(&refund, 18, 10));
        }

        if !self.yes {
            println!();
            let confirmed = Confirm::new()
                .with_prompt(format!(
                    "{} Withdraw {} {} to {}?",
                    "⚠️".bright_yellow(),
                    note.amount.bright_red().bold(),
                    instance.symbol,
                    recipient
                ))
                .default(false)
                .interact()?;
            if !confirmed {
                println!("{} Operation cancelled by user", "🚫".bright_red());
                return Ok(());
            }
        }

        let (handle, cancel) = cancellation();
        let ctrl_c = tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupt received, cancelling withdrawal");
                handle.cancel();
            }
        });

        let mut withdrawal = Withdrawal::new(&ledger, &prover, instance.clone())
            .with_tree_height(self.tree_height)
            .with_from_block(self.from_block)
            .with_poll(PollConfig::default())
            .with_cancel(cancel);
        if let Some(client) = &relayer {
            withdrawal = withdrawal.with_relayer(client);
        }

        let pb = spinner("magenta", "Rebuilding tree, proving and submitting...");
        let result = withdrawal.run(&note, &recipient, refund).await;
        pb.finish_and_clear();
        ctrl_c.abort();
        let outcome = result?;

        println!();
        println!("{} {}", "🎉".bright_green(), "Withdrawal confirmed!".bright_green().bold());
        println!("{} {}", "Transaction:".bright_white(), outcome.tx_hash.to_string().bright_cyan());
        if let Some(block) = outcome.block_number {
            println!("{} {}", "Block:".bright_white(), block);
        }
        println!("{} {}", "Leaf index:".bright_white(), outcome.leaf_index);
        if outcome.relayer.is_some() {
            println!(
                "{} {} {}",
                "Relayer fee:".bright_white(),
                to_decimals(&outcome.fee, instance.decimals, 10),
                instance.symbol
            );
        }
        Ok(())
    }
}
