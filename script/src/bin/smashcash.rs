//! Smashcash CLI - deposits and anonymous withdrawals for the Smashcash pools
//!
//! Usage:
//! ```shell
//! # Deposit 1 xDAI and save the note
//! cargo run --bin smashcash -- deposit --amount 1 --private-key $PRIVATE_KEY
//!
//! # Withdraw through a relayer
//! cargo run --bin smashcash -- withdraw --note $NOTE --recipient 0x... --relayer https://relayer.example
//!
//! # Check whether a note has been withdrawn
//! cargo run --bin smashcash -- inspect --note $NOTE
//! ```

use clap::{Parser, Subcommand};
use colored::*;
use console::Term;
use std::process;
use tracing_subscriber::EnvFilter;

use smashcash_script::commands::{DepositCommand, InspectCommand, WithdrawCommand};

#[derive(Parser)]
#[command(
    name = "smashcash",
    about = "🕶️ Smashcash - Private xDAI transfers through a shielded pool",
    long_about = "Smashcash deposits fixed denominations into a pool and withdraws them to an unlinked address with a zero-knowledge proof.\n\nFeatures:\n• Deposit and receive a secret note\n• Withdraw directly or through a relayer\n• Inspect the deposit behind a note",
    version = "1.0.0"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    /// Skip the banner
    #[arg(long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// 💰 Deposit into a pool and receive a note
    Deposit(DepositCommand),
    /// 🕶️ Withdraw a deposit using its note
    Withdraw(WithdrawCommand),
    /// 🔍 Show the deposit behind a note
    Inspect(InspectCommand),
}

fn print_banner() {
    let term = Term::stdout();
    let _ = term.clear_screen();

    println!(
        "{}",
        r#"
   ___ _ __ ___   __ _ ___| |__   ___ __ _ ___| |__
  / __| '_ ` _ \ / _` / __| '_ \ / __/ _` / __| '_ \
  \__ \ | | | | | (_| \__ \ | | | (_| (_| \__ \ | | |
  |___/_| |_| |_|\__,_|___/_| |_|\___\__,_|___/_| |_|
    "#
        .bright_magenta()
        .bold()
    );
    println!("{}", "    Shielded pool deposits and withdrawals".bright_cyan().italic());
    println!("{}", "    ══════════════════════════════════════════".bright_black());
    println!();
}

fn setup_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

#[tokio::main]
async fn main() {
    // Load environment variables
    dotenv::dotenv().ok();

    let cli = Cli::parse();
    setup_logging(cli.verbose);

    if !cli.quiet {
        print_banner();
    }

    let result = match cli.command {
        Commands::Deposit(cmd) => cmd.execute().await,
        Commands::Withdraw(cmd) => cmd.execute().await,
        Commands::Inspect(cmd) => cmd.execute().await,
    };

    match result {
        Ok(_) => {
            println!();
            println!(
                "{} {}",
                "✨".bright_green(),
                "Operation completed successfully!".bright_green().bold()
            );
        }
        Err(e) => {
            println!();
            eprintln!("{} {}", "💥".bright_red(), "Operation failed!".bright_red().bold());
            eprintln!("{} {}", "📋".bright_yellow(), "Error details:".bright_yellow());
            eprintln!("   {}", format!("{e:#}").bright_red());

            let core = e.downcast_ref::<smashcash_lib::Error>();
            println!();
            eprintln!("{} {}", "💡".bright_blue(), "Tips:".bright_blue().bold());
            match core {
                Some(err) if err.is_transient() => {
                    eprintln!("   • This looks temporary; running the command again is safe");
                }
                Some(err) if err.is_user_error() => {
                    eprintln!("   • Check the note, recipient and pool you provided");
                }
                _ => {
                    eprintln!("   • Ensure your RPC provider is accessible");
                    eprintln!("   • Run with --verbose for detailed logs");
                }
            }

            process::exit(1);
        }
    }
}
