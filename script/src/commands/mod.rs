pub mod deposit;
pub mod inspect;
pub mod withdraw;

pub use deposit::DepositCommand;
pub use inspect::InspectCommand;
pub use withdraw::WithdrawCommand;

use std::env;
use std::time::Duration;

use alloy::primitives::Address;
use anyhow::{anyhow, Context, Result};
use clap::Args;
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};

use crate::ledger::LedgerClient;
use crate::withdraw::parse_recipient;

/// Expand environment variables in a string (e.g., "$PRIVATE_KEY" -> actual value)
pub fn expand_env_vars(input: &str) -> Result<String> {
    match input.strip_prefix('$') {
        Some(var_name) => match env::var(var_name) {
            Ok(value) => {
                println!(
                    "{} Expanded {} to environment variable value",
                    "🔧".bright_green(),
                    input
                );
                Ok(value)
            }
            Err(_) => {
                eprintln!(
                    "{} Environment variable {} not found",
                    "❌".bright_red(),
                    var_name
                );
                Err(anyhow!("Environment variable {} not found", var_name))
            }
        },
        None => Ok(input.to_string()),
    }
}

/// RPC endpoint, signing key and contract override shared by every command.
#[derive(Args, Debug, Clone)]
pub struct ConnectionArgs {
    /// RPC provider URL
    #[arg(long, short = 'r', env = "RPC_URL", default_value = "https://rpc.gnosischain.com")]
    pub rpc_url: String,

    /// Private key used to sign transactions (accepts $VAR)
    #[arg(long, short = 'k', env = "PRIVATE_KEY", hide_env_values = true)]
    pub private_key: Option<String>,

    /// Pool contract address, required while the deployment table has none
    #[arg(long, env = "SMASHCASH_CONTRACT")]
    pub contract: Option<String>,
}

impl ConnectionArgs {
    pub fn contract_address(&self) -> Result<Option<Address>> {
        self.contract
            .as_deref()
            .map(|raw| {
                let expanded = expand_env_vars(raw)?;
                parse_recipient(&expanded).context("invalid --contract address")
            })
            .transpose()
    }

    pub fn signing_key(&self) -> Result<Option<String>> {
        let Some(raw) = &self.private_key else {
            return Ok(None);
        };
        let key = expand_env_vars(raw)?;
        if !key.starts_with("0x") || key.len() != 66 {
            eprintln!(
                "{} Private key must be a valid hex string starting with 0x",
                "❌".bright_red()
            );
            return Err(anyhow!("Invalid private key format"));
        }
        Ok(Some(key))
    }

    pub async fn connect(&self, signing_key: Option<&str>) -> Result<LedgerClient> {
        let rpc_url = expand_env_vars(&self.rpc_url)?;
        LedgerClient::connect(&rpc_url, signing_key)
            .await
            .with_context(|| format!("failed to connect to {rpc_url}"))
    }
}

pub(crate) fn spinner(color: &str, message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    let template = format!("{{spinner:.{color}}} {{msg}}");
    let style = ProgressStyle::default_spinner()
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"])
        .template(&template)
        .unwrap_or_else(|_| ProgressStyle::default_spinner());
    pb.set_style(style);
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

pub(crate) fn print_header(title: &str) {
    println!("{}", title.bright_magenta().bold());
    println!("{}", "═".repeat(50).bright_black());
    println!();
}

pub(crate) fn masked(secret: &str) -> String {
    if secret.len() <= 14 {
        return "<hidden>".to_string();
    }
    format!("{}...{}", &secret[..8], &secret[secret.len() - 6..])
}
