use std::path::PathBuf;

use anyhow::{anyhow, Result};
use clap::Args;
use colored::*;
use dialoguer::{Confirm, Select};
use smashcash_lib::units::to_decimals;

use super::{masked, print_header, spinner, ConnectionArgs};
use crate::config::{denominations, resolve_instance, DEFAULT_NET_ID};
use crate::deposit::make_deposit;
use crate::ledger::Ledger;
use crate::withdraw::{cancellation, PollConfig};

/// Deposit into a pool and receive a note
#[derive(Args, Debug)]
pub struct DepositCommand {
    /// Currency of the pool
    #[arg(long, short = 'c', default_value = "xdai")]
    pub currency: String,

    /// Pool denomination (will prompt if not provided)
    #[arg(long, short = 'a')]
    pub amount: Option<String>,

    /// Directory the note file is written to
    #[arg(long, default_value = ".")]
    pub note_dir: PathBuf,

    #[command(flatten)]
    pub connection: ConnectionArgs,

    /// Skip confirmation prompts
    #[arg(long, short = 'y')]
    pub yes: bool,
}

impl DepositCommand {
    pub async fn execute(&self) -> Result<()> {
        print_header("💰 Smashcash - Deposit");

        let private_key = self
            .connection
            .signing_key()?
            .ok_or_else(|| anyhow!("A private key is required to deposit (--private-key or PRIVATE_KEY)"))?;

        let ledger = self.connection.connect(Some(&private_key)).await?;
        let net_id = ledger.network_id().await?;
        if net_id != DEFAULT_NET_ID {
            println!(
                "{} Connected to network {}, not the public deployment on {}",
                "⚠️".bright_yellow(),
                net_id,
                DEFAULT_NET_ID
            );
        }

        let amount = match &self.amount {
            Some(amount) => amount.clone(),
            None => {
                let options = denominations(net_id, &self.currency);
                if options.is_empty() {
                    return Err(anyhow!("No {} pools known on network {}", self.currency, net_id));
                }
                let picked = Select::new()
                    .with_prompt(format!("{} Pool denomination", "🪙".bright_yellow()))
                    .items(&options)
                    .default(0)
                    .interact()?;
                options[picked].to_string()
            }
        };

        let instance = resolve_instance(
            net_id,
            &self.currency,
            &amount,
            self.connection.contract_address()?,
        )?;

        println!();
        println!("{}", "📋 Deposit Details".bright_green().bold());
        println!("{}", "─".repeat(30).bright_black());
        println!("{} {} {}", "Amount:".bright_white(), instance.amount, instance.symbol);
        println!("{} {}", "Pool:".bright_white(), instance.address.to_string().bright_cyan());
        println!("{} {}", "Network:".bright_white(), net_id);
        println!("{} {}", "Signer:".bright_white(), masked(&private_key).bright_yellow());

        if !self.yes {
            println!();
            let confirmed = Confirm::new()
                .with_prompt(format!(
                    "{} Deposit {} {}?",
                    "⚠️".bright_yellow(),
                    instance.amount.bright_red().bold(),
                    instance.symbol
                ))
                .default(false)
                .interact()?;
            if !confirmed {
                println!("{} Operation cancelled by user", "🚫".bright_red());
                return Ok(());
            }
        }

        let (_handle, mut cancel) = cancellation();
        let pb = spinner("green", "Saving note and submitting deposit...");
        let outcome = make_deposit(
            &ledger,
            &instance,
            &self.note_dir,
            &PollConfig::default(),
            &mut cancel,
        )
        .await;
        pb.finish_and_clear();
        let outcome = outcome?;

        println!();
        println!("{} {}", "🎉".bright_green(), "Deposit confirmed!".bright_green().bold());
        println!("{} {}", "Transaction:".bright_white(), outcome.tx_hash.to_string().bright_cyan());
        if let Some(block) = outcome.block_number {
            println!("{} {}", "Block:".bright_white(), block);
        }
        println!();
        println!("{} {}", "🔑".bright_yellow(), "Your note (keep it secret, keep it safe):".bright_yellow().bold());
        println!("   {}", outcome.note.encode().bright_white());
        println!(
            "{} Saved to {}",
            "💾".bright_blue(),
            outcome.note_path.display().to_string().bright_blue()
        );

        if let Some(sender) = ledger.sender() {
            let balance = ledger.native_balance(sender).await?;
            println!(
                "{} Sender balance: {} {}",
                "ℹ️".bright_blue(),
                to_decimals(&balance, instance.decimals, 10),
                instance.symbol
            );
        }
        Ok(())
    }
}
