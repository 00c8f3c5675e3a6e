//! In-memory ledger, relayer and prover used by the orchestrator tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Mutex;

use alloy::primitives::{Address, Bytes, B256, U256};
use ark_bn254::Fr;
use async_trait::async_trait;
use smashcash_lib::{
    error::{Error, Result},
    witness::{CallArguments, ProofBlob, WithdrawalWitness},
    Deposit, DepositEvent, Note, PoseidonHasher,
};

use crate::config::PoolInstance;
use crate::ledger::{Ledger, Receipt};
use crate::prover::ProvingBackend;
use crate::relayer::{GasPrices, NetId, Quoted, RelayRequest, Relayer, RelayerStatus};

pub fn instance() -> PoolInstance {
    PoolInstance {
        net_id: 100,
        currency: "xdai".into(),
        symbol: "XDAI".into(),
        amount: "1".into(),
        decimals: 18,
        address: Address::repeat_byte(0x11),
        token_address: None,
    }
}

/// A fresh 1 xdai note whose commitment sits at `position` among `count`
/// deposit events.
pub fn note_with_events(count: u32, position: u32) -> (Note, Vec<DepositEvent>) {
    let deposit = Deposit::random(&PoseidonHasher).unwrap();
    let events = (0..count)
        .map(|i| {
            let commitment = if i == position {
                deposit.commitment
            } else {
                Fr::from(1_000 + i as u64)
            };
            DepositEvent::new(commitment, i)
        })
        .collect();
    (Note::new(deposit, "xdai", "1", 100), events)
}

pub struct MockLedger {
    events: Vec<DepositEvent>,
    chain_id: u64,
    mined: bool,
    pub root_known: AtomicBool,
    pub spent: AtomicBool,
    pub revert: AtomicBool,
    pub fail_deposit: AtomicBool,
    pub allowance: Mutex<U256>,
    pub root_checks: AtomicU32,
    pub receipt_polls: AtomicU32,
    pub submitted: Mutex<Vec<CallArguments>>,
    pub deposits: Mutex<Vec<(B256, U256)>>,
    pub approvals: Mutex<Vec<(Address, U256)>>,
}

impl MockLedger {
    pub fn new(events: Vec<DepositEvent>) -> Self {
        Self {
            events,
            chain_id: 100,
            mined: true,
            root_known: AtomicBool::new(true),
            spent: AtomicBool::new(false),
            revert: AtomicBool::new(false),
            fail_deposit: AtomicBool::new(false),
            allowance: Mutex::new(U256::ZERO),
            root_checks: AtomicU32::new(0),
            receipt_polls: AtomicU32::new(0),
            submitted: Mutex::new(Vec::new()),
            deposits: Mutex::new(Vec::new()),
            approvals: Mutex::new(Vec::new()),
        }
    }

    pub fn with_chain_id(mut self, chain_id: u64) -> Self {
        self.chain_id = chain_id;
        self
    }

    pub fn never_mined(mut self) -> Self {
        self.mined = false;
        self
    }
}

#[async_trait]
impl Ledger for MockLedger {
    async fn network_id(&self) -> Result<u64> {
        Ok(self.chain_id)
    }

    fn sender(&self) -> Option<Address> {
        Some(Address::repeat_byte(0x55))
    }

    async fn deposit_events(&self, _contract: Address, _from_block: u64) -> Result<Vec<DepositEvent>> {
        Ok(self.events.clone())
    }

    async fn is_known_root(&self, _contract: Address, _root: B256) -> Result<bool> {
        self.root_checks.fetch_add(1, Ordering::SeqCst);
        Ok(self.root_known.load(Ordering::SeqCst))
    }

    async fn is_spent(&self, _contract: Address, _nullifier_hash: B256) -> Result<bool> {
        Ok(self.spent.load(Ordering::SeqCst))
    }

    async fn submit_withdraw(&self, _contract: Address, args: &CallArguments) -> Result<B256> {
        self.submitted.lock().unwrap().push(args.clone());
        Ok(B256::repeat_byte(0xee))
    }

    async fn submit_deposit(&self, _contract: Address, commitment: B256, value: U256) -> Result<B256> {
        if self.fail_deposit.load(Ordering::SeqCst) {
            return Err(Error::ledger("deposit", "request rejected by the user"));
        }
        self.deposits.lock().unwrap().push((commitment, value));
        Ok(B256::repeat_byte(0xdd))
    }

    async fn transaction_receipt(&self, tx_hash: B256) -> Result<Option<Receipt>> {
        self.receipt_polls.fetch_add(1, Ordering::SeqCst);
        if !self.mined {
            return Ok(None);
        }
        Ok(Some(Receipt {
            transaction_hash: tx_hash,
            block_number: Some(42),
            success: !self.revert.load(Ordering::SeqCst),
        }))
    }

    async fn native_balance(&self, _owner: Address) -> Result<U256> {
        Ok(U256::from(5u8) * U256::from(10u8).pow(U256::from(18u8)))
    }

    async fn token_balance(&self, _token: Address, _owner: Address) -> Result<U256> {
        Ok(U256::ZERO)
    }

    async fn allowance(&self, _token: Address, _owner: Address, _spender: Address) -> Result<U256> {
        Ok(*self.allowance.lock().unwrap())
    }

    async fn approve(&self, _token: Address, spender: Address, amount: U256) -> Result<B256> {
        self.approvals.lock().unwrap().push((spender, amount));
        *self.allowance.lock().unwrap() = amount;
        Ok(B256::repeat_byte(0xaa))
    }
}

/// Returns a fixed proof carrying the witness' own public signals.
#[derive(Default)]
pub struct MockProver {
    pub calls: AtomicU32,
}

#[async_trait]
impl ProvingBackend for MockProver {
    async fn prove(&self, witness: &WithdrawalWitness) -> Result<ProofBlob> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(ProofBlob {
            proof: Bytes::from(vec![0x01, 0x02, 0x03]),
            public_signals: witness.public.signals().to_vec(),
        })
    }
}

pub struct MockRelayer {
    pub address: Address,
    pub tx_hash: B256,
    net_id: u64,
    gas_price: String,
    service_fee: String,
    pub relayed: Mutex<Vec<RelayRequest>>,
}

impl MockRelayer {
    pub fn new(net_id: u64, gas_price: &str, service_fee: &str) -> Self {
        Self {
            address: Address::repeat_byte(0x77),
            tx_hash: B256::repeat_byte(0x99),
            net_id,
            gas_price: gas_price.into(),
            service_fee: service_fee.into(),
            relayed: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl Relayer for MockRelayer {
    async fn status(&self) -> Result<RelayerStatus> {
        Ok(RelayerStatus {
            relayer_address: self.address,
            net_id: NetId::Id(self.net_id),
            gas_prices: GasPrices {
                fast: Quoted::Text(self.gas_price.clone()),
            },
            eth_prices: HashMap::new(),
            relayer_service_fee: Quoted::Text(self.service_fee.clone()),
        })
    }

    async fn relay(&self, request: &RelayRequest) -> Result<B256> {
        self.relayed.lock().unwrap().push(request.clone());
        Ok(self.tx_hash)
    }
}
