//! Withdrawal orchestration.
//!
//! A [`Withdrawal`] walks one attempt through
//! `Init -> ProofBuilding -> Submitting -> Pending -> Confirmed`, dropping to
//! `Failed` on the first error. It never loops back; a retry is a new
//! instance.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use alloy::primitives::{Address, B256, U256};
use smashcash_lib::{
    compute_fee, encode_for_submission,
    error::{Error, Result},
    field::{fr_to_b256, fr_to_hex},
    merkle_tree::{reconstruct, DEFAULT_TREE_HEIGHT},
    FeeParams, Note, PoseidonHasher, WithdrawalWitness,
};
use tokio::sync::watch;
use tracing::{info, warn};

use crate::config::PoolInstance;
use crate::ledger::{Ledger, Receipt};
use crate::prover::ProvingBackend;
use crate::relayer::{RelayRequest, Relayer, RelayerStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WithdrawalState {
    Init,
    ProofBuilding,
    Submitting,
    Pending,
    Confirmed,
    Failed,
}

impl fmt::Display for WithdrawalState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WithdrawalState::Init => "init",
            WithdrawalState::ProofBuilding => "proof_building",
            WithdrawalState::Submitting => "submitting",
            WithdrawalState::Pending => "pending",
            WithdrawalState::Confirmed => "confirmed",
            WithdrawalState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Receipt polling: fixed delay, bounded attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    pub interval: Duration,
    pub attempts: u32,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            attempts: 60,
        }
    }
}

/// Cancels every [`CancelToken`] created from it.
#[derive(Debug)]
pub struct CancelHandle(watch::Sender<bool>);

#[derive(Debug, Clone)]
pub struct CancelToken(watch::Receiver<bool>);

pub fn cancellation() -> (CancelHandle, CancelToken) {
    let (tx, rx) = watch::channel(false);
    (CancelHandle(tx), CancelToken(rx))
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.0.send_replace(true);
    }
}

impl CancelToken {
    pub fn is_cancelled(&self) -> bool {
        *self.0.borrow()
    }

    /// Resolves once cancelled. Never resolves if the handle was dropped
    /// without cancelling.
    pub async fn cancelled(&mut self) {
        if self.0.wait_for(|cancelled| *cancelled).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

/// Poll `tx_hash` until it is mined, the attempt budget runs out, or
/// `cancel` fires.
pub async fn wait_for_receipt(
    ledger: &dyn Ledger,
    tx_hash: B256,
    poll: &PollConfig,
    cancel: &mut CancelToken,
) -> Result<Receipt> {
    for attempt in 1..=poll.attempts {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        if let Some(receipt) = ledger.transaction_receipt(tx_hash).await? {
            if receipt.block_number.is_some() {
                if !receipt.success {
                    return Err(Error::ledger("transaction", format!("{tx_hash} reverted")));
                }
                return Ok(receipt);
            }
        }
        if attempt == poll.attempts {
            break;
        }
        tokio::select! {
            _ = tokio::time::sleep(poll.interval) => {}
            _ = cancel.cancelled() => return Err(Error::Cancelled),
        }
    }
    Err(Error::NotMinedTimeout {
        tx_hash,
        attempts: poll.attempts,
    })
}

/// Parse a `0x`-prefixed 20-byte hex address.
pub fn parse_recipient(recipient: &str) -> Result<Address> {
    let trimmed = recipient.trim();
    let hex = trimmed
        .strip_prefix("0x")
        .ok_or_else(|| Error::InvalidRecipient(recipient.to_string()))?;
    if hex.len() != 40 || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(Error::InvalidRecipient(recipient.to_string()));
    }
    Address::from_str(trimmed).map_err(|_| Error::InvalidRecipient(recipient.to_string()))
}

/// What a confirmed withdrawal did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WithdrawalOutcome {
    pub tx_hash: B256,
    pub block_number: Option<u64>,
    pub root: B256,
    pub leaf_index: u32,
    pub fee: U256,
    pub relayer: Option<Address>,
}

pub struct Withdrawal<'a> {
    ledger: &'a dyn Ledger,
    prover: &'a dyn ProvingBackend,
    relayer: Option<&'a dyn Relayer>,
    instance: PoolInstance,
    tree_height: usize,
    from_block: u64,
    poll: PollConfig,
    cancel: CancelToken,
    state: WithdrawalState,
    hasher: PoseidonHasher,
}

impl<'a> Withdrawal<'a> {
    pub fn new(ledger: &'a dyn Ledger, prover: &'a dyn ProvingBackend, instance: PoolInstance) -> Self {
        let (_, cancel) = cancellation();
        Self {
            ledger,
            prover,
            relayer: None,
            instance,
            tree_height: DEFAULT_TREE_HEIGHT,
            from_block: 0,
            poll: PollConfig::default(),
            cancel,
            state: WithdrawalState::Init,
            hasher: PoseidonHasher,
        }
    }

    /// Submit through `relayer` instead of signing locally.
    pub fn with_relayer(mut self, relayer: &'a dyn Relayer) -> Self {
        self.relayer = Some(relayer);
        self
    }

    pub fn with_tree_height(mut self, height: usize) -> Self {
        self.tree_height = height;
        self
    }

    /// First block to scan for deposit events.
    pub fn with_from_block(mut self, block: u64) -> Self {
        self.from_block = block;
        self
    }

    pub fn with_poll(mut self, poll: PollConfig) -> Self {
        self.poll = poll;
        self
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn state(&self) -> WithdrawalState {
        self.state
    }

    fn transition(&mut self, next: WithdrawalState) {
        info!(from = %self.state, to = %next, "withdrawal state");
        self.state = next;
    }

    /// Run the attempt to completion.
    pub async fn run(&mut self, note: &Note, recipient: &str, refund: U256) -> Result<WithdrawalOutcome> {
        match self.execute(note, recipient, refund).await {
            Ok(outcome) => Ok(outcome),
            Err(err) => {
                warn!(state = %self.state, error = %err, "withdrawal failed");
                self.transition(WithdrawalState::Failed);
                Err(err)
            }
        }
    }

    async fn execute(&mut self, note: &Note, recipient: &str, refund: U256) -> Result<WithdrawalOutcome> {
        let (recipient, relayer_status) = self.validate(note, recipient, refund).await?;

        self.transition(WithdrawalState::ProofBuilding);
        let contract = self.instance.address;
        let events = self.ledger.deposit_events(contract, self.from_block).await?;
        let (merkle_proof, leaf_index) =
            reconstruct(&self.hasher, &events, self.tree_height, &note.deposit.commitment)?;
        let root = fr_to_b256(&merkle_proof.root);
        info!(leaf_index, deposits = events.len(), %root, "rebuilt deposit tree");

        self.ensure_known_root(root).await?;
        let nullifier_hash = fr_to_b256(&note.deposit.nullifier_hash);
        if self.ledger.is_spent(contract, nullifier_hash).await? {
            return Err(Error::NoteSpent {
                nullifier_hash: fr_to_hex(&note.deposit.nullifier_hash),
            });
        }

        let (relayer_address, fee) = match &relayer_status {
            Some(status) => (status.relayer_address, self.relayer_fee(status, refund)?),
            None => (Address::ZERO, U256::ZERO),
        };

        let witness = WithdrawalWitness::assemble(
            &self.hasher,
            &note.deposit,
            &merkle_proof,
            recipient,
            relayer_address,
            fee,
            refund,
        )?;
        let blob = self.prover.prove(&witness).await?;
        let args = encode_for_submission(&blob, &witness.public)?;

        self.transition(WithdrawalState::Submitting);
        self.ensure_known_root(root).await?;
        let tx_hash = match self.relayer {
            Some(relayer) => relayer.relay(&RelayRequest::new(contract, &args)).await?,
            None => self.ledger.submit_withdraw(contract, &args).await?,
        };

        self.transition(WithdrawalState::Pending);
        let receipt = wait_for_receipt(self.ledger, tx_hash, &self.poll, &mut self.cancel).await?;

        self.transition(WithdrawalState::Confirmed);
        Ok(WithdrawalOutcome {
            tx_hash,
            block_number: receipt.block_number,
            root,
            leaf_index,
            fee,
            relayer: relayer_status.map(|status| status.relayer_address),
        })
    }

    async fn validate(
        &self,
        note: &Note,
        recipient: &str,
        refund: U256,
    ) -> Result<(Address, Option<RelayerStatus>)> {
        let recipient = parse_recipient(recipient)?;

        let instance = &self.instance;
        if !note.currency.eq_ignore_ascii_case(&instance.currency)
            || note.amount != instance.amount
            || note.net_id != instance.net_id
        {
            return Err(Error::UnknownInstance {
                currency: note.currency.clone(),
                amount: note.amount.clone(),
                net_id: note.net_id,
            });
        }
        if instance.is_native() && !refund.is_zero() {
            return Err(Error::InvalidAmount(format!(
                "refund must be zero for {}",
                instance.currency
            )));
        }

        let ledger_net_id = self.ledger.network_id().await?;
        if ledger_net_id != note.net_id {
            return Err(Error::WrongNetwork {
                expected: note.net_id,
                actual: ledger_net_id.to_string(),
                reporter: "ledger",
            });
        }

        let status = match self.relayer {
            Some(relayer) => {
                let status = relayer.status().await?;
                if !status.net_id.matches(note.net_id) {
                    return Err(Error::WrongNetwork {
                        expected: note.net_id,
                        actual: status.net_id.to_string(),
                        reporter: "relayer",
                    });
                }
                Some(status)
            }
            None => None,
        };
        Ok((recipient, status))
    }

    async fn ensure_known_root(&self, root: B256) -> Result<()> {
        if self.ledger.is_known_root(self.instance.address, root).await? {
            Ok(())
        } else {
            Err(Error::StaleOrCorruptTree {
                root: root.to_string(),
            })
        }
    }

    fn relayer_fee(&self, status: &RelayerStatus, refund: U256) -> Result<U256> {
        let amount = self.instance.amount_units()?;
        let fee = compute_fee(&FeeParams {
            gas_price_fast: status.gas_prices.fast.to_string(),
            service_fee_percent: status.relayer_service_fee.to_string(),
            refund,
            exchange_rate: status.exchange_rate(&self.instance.currency)?,
            decimals: self.instance.decimals,
            currency: self.instance.currency.clone(),
            amount,
        })?;
        if fee > amount {
            return Err(Error::FeeExceedsAmount { fee, amount });
        }
        info!(%fee, relayer = %status.relayer_address, "relayer fee");
        Ok(fee)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{instance, note_with_events, MockLedger, MockProver, MockRelayer};
    use std::sync::atomic::Ordering;

    fn fast_poll() -> PollConfig {
        PollConfig {
            interval: Duration::from_millis(1),
            attempts: 5,
        }
    }

    const RECIPIENT: &str = "0x00000000000000000000000000000000000000aa";

    #[tokio::test]
    async fn test_direct_withdrawal_confirms() {
        let (note, events) = note_with_events(3, 1);
        let ledger = MockLedger::new(events);
        let prover = MockProver::default();

        let mut withdrawal = Withdrawal::new(&ledger, &prover, instance())
            .with_tree_height(4)
            .with_poll(fast_poll());
        let outcome = withdrawal.run(&note, RECIPIENT, U256::ZERO).await.unwrap();

        assert_eq!(withdrawal.state(), WithdrawalState::Confirmed);
        assert_eq!(outcome.leaf_index, 1);
        assert_eq!(outcome.fee, U256::ZERO);
        assert_eq!(outcome.relayer, None);
        assert_eq!(outcome.block_number, Some(42));

        let submitted = ledger.submitted.lock().unwrap();
        assert_eq!(submitted.len(), 1);
        assert_eq!(submitted[0].relayer, Address::ZERO);
        assert_eq!(submitted[0].root, outcome.root);
        // Root is checked after reconstruction and again before submission.
        assert_eq!(ledger.root_checks.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_relayed_withdrawal_charges_fee() {
        let (note, events) = note_with_events(2, 0);
        let ledger = MockLedger::new(events);
        let prover = MockProver::default();
        let relayer = MockRelayer::new(100, "20", "0.05");

        let mut withdrawal = Withdrawal::new(&ledger, &prover, instance())
            .with_relayer(&relayer)
            .with_tree_height(4)
            .with_poll(fast_poll());
        let outcome = withdrawal.run(&note, RECIPIENT, U256::ZERO).await.unwrap();

        assert_eq!(outcome.fee, U256::from(10_500_000_000_000_000u64));
        assert_eq!(outcome.relayer, Some(relayer.address));
        assert_eq!(outcome.tx_hash, relayer.tx_hash);

        let relayed = relayer.relayed.lock().unwrap();
        assert_eq!(relayed.len(), 1);
        assert_eq!(relayed[0].contract, instance().address);
        assert!(ledger.submitted.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_root_aborts_before_proving() {
        let (note, events) = note_with_events(2, 1);
        let ledger = MockLedger::new(events);
        ledger.root_known.store(false, Ordering::SeqCst);
        let prover = MockProver::default();

        let mut withdrawal = Withdrawal::new(&ledger, &prover, instance()).with_tree_height(4);
        let err = withdrawal.run(&note, RECIPIENT, U256::ZERO).await.unwrap_err();

        assert!(matches!(err, Error::StaleOrCorruptTree { .. }));
        assert_eq!(withdrawal.state(), WithdrawalState::Failed);
        assert_eq!(prover.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_spent_note_rejected() {
        let (note, events) = note_with_events(1, 0);
        let ledger = MockLedger::new(events);
        ledger.spent.store(true, Ordering::SeqCst);
        let prover = MockProver::default();

        let err = Withdrawal::new(&ledger, &prover, instance())
            .with_tree_height(4)
            .run(&note, RECIPIENT, U256::ZERO)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NoteSpent { .. }));
    }

    #[tokio::test]
    async fn test_network_mismatches() {
        let (note, events) = note_with_events(1, 0);
        let ledger = MockLedger::new(events.clone()).with_chain_id(1);
        let prover = MockProver::default();
        let err = Withdrawal::new(&ledger, &prover, instance())
            .run(&note, RECIPIENT, U256::ZERO)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::WrongNetwork {
                expected: 100,
                reporter: "ledger",
                ..
            }
        ));

        let ledger = MockLedger::new(events);
        let relayer = MockRelayer::new(5, "20", "0.05");
        let err = Withdrawal::new(&ledger, &prover, instance())
            .with_relayer(&relayer)
            .run(&note, RECIPIENT, U256::ZERO)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::WrongNetwork { reporter: "relayer", .. }));
    }

    #[tokio::test]
    async fn test_fee_above_amount_rejected() {
        let (note, events) = note_with_events(1, 0);
        let ledger = MockLedger::new(events);
        let prover = MockProver::default();
        // 5000 gwei * 500k gas = 2.5 xdai against a 1 xdai note.
        let relayer = MockRelayer::new(100, "5000", "0");

        let err = Withdrawal::new(&ledger, &prover, instance())
            .with_relayer(&relayer)
            .with_tree_height(4)
            .run(&note, RECIPIENT, U256::ZERO)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::FeeExceedsAmount { .. }));
        assert_eq!(prover.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_init_validation() {
        let (note, events) = note_with_events(1, 0);
        let ledger = MockLedger::new(events);
        let prover = MockProver::default();

        let err = Withdrawal::new(&ledger, &prover, instance())
            .run(&note, "0x1234", U256::ZERO)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidRecipient(_)));

        let err = Withdrawal::new(&ledger, &prover, instance())
            .run(&note, RECIPIENT, U256::from(1u8))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidAmount(_)));

        let mut other = instance();
        other.amount = "1000".into();
        let err = Withdrawal::new(&ledger, &prover, other)
            .run(&note, RECIPIENT, U256::ZERO)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::UnknownInstance { .. }));
    }

    #[tokio::test]
    async fn test_missing_commitment_reported() {
        let (note, mut events) = note_with_events(3, 2);
        events.truncate(2);
        let ledger = MockLedger::new(events);
        let prover = MockProver::default();

        let err = Withdrawal::new(&ledger, &prover, instance())
            .with_tree_height(4)
            .run(&note, RECIPIENT, U256::ZERO)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::CommitmentNotFound { deposits: 2, .. }));
    }

    #[tokio::test]
    async fn test_unmined_transaction_times_out() {
        let (note, events) = note_with_events(1, 0);
        let ledger = MockLedger::new(events).never_mined();
        let prover = MockProver::default();

        let mut withdrawal = Withdrawal::new(&ledger, &prover, instance())
            .with_tree_height(4)
            .with_poll(fast_poll());
        let err = withdrawal.run(&note, RECIPIENT, U256::ZERO).await.unwrap_err();
        assert!(matches!(err, Error::NotMinedTimeout { attempts: 5, .. }));
        assert!(err.is_transient());
        assert_eq!(ledger.receipt_polls.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn test_polling_is_cancellable() {
        let (note, events) = note_with_events(1, 0);
        let ledger = MockLedger::new(events).never_mined();
        let prover = MockProver::default();
        let (handle, token) = cancellation();

        let canceller = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            handle.cancel();
        });

        let mut withdrawal = Withdrawal::new(&ledger, &prover, instance())
            .with_tree_height(4)
            .with_cancel(token)
            .with_poll(PollConfig {
                interval: Duration::from_millis(5),
                attempts: 10_000,
            });
        let err = withdrawal.run(&note, RECIPIENT, U256::ZERO).await.unwrap_err();
        canceller.await.unwrap();

        assert!(matches!(err, Error::Cancelled));
        assert_eq!(withdrawal.state(), WithdrawalState::Failed);
    }

    #[tokio::test]
    async fn test_reverted_transaction_is_failure() {
        let (note, events) = note_with_events(1, 0);
        let ledger = MockLedger::new(events);
        ledger.revert.store(true, Ordering::SeqCst);
        let prover = MockProver::default();

        let err = Withdrawal::new(&ledger, &prover, instance())
            .with_tree_height(4)
            .with_poll(fast_poll())
            .run(&note, RECIPIENT, U256::ZERO)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::LedgerCallFailed { .. }));
    }

    #[test]
    fn test_parse_recipient() {
        assert!(parse_recipient(RECIPIENT).is_ok());
        assert!(parse_recipient("00000000000000000000000000000000000000aa").is_err());
        assert!(parse_recipient("0x00000000000000000000000000000000000000zz").is_err());
    }
}
