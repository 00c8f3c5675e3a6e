//! Smashcash client library
//!
//! Adapters and orchestration on top of `smashcash-lib`:
//!
//! - Ledger access over an alloy provider
//! - Relayer HTTP client
//! - External proving backend
//! - Deposit and withdrawal flows
//! - CLI commands for the `smashcash` binary

pub mod commands;
pub mod config;
pub mod deposit;
pub mod ledger;
pub mod prover;
pub mod relayer;
pub mod withdraw;

#[cfg(test)]
mod testing;

pub use config::{resolve_instance, PoolInstance};
pub use ledger::{Ledger, LedgerClient, Receipt};
pub use prover::{CommandProver, ProvingBackend};
pub use relayer::{Relayer, RelayerClient, RelayerStatus};
pub use withdraw::{cancellation, CancelHandle, CancelToken, PollConfig, Withdrawal, WithdrawalState};
