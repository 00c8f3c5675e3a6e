//! Ledger adapter: everything the client reads from or sends to the chain.
//!
//! [`Ledger`] is the seam the orchestrators are written against;
//! [`LedgerClient`] implements it over an alloy provider. Transport and RPC
//! failures are translated into [`Error::LedgerCallFailed`] here and nowhere
//! else.

use alloy::{
    network::ReceiptResponse,
    primitives::{Address, Bytes, B256, U256},
    providers::{DynProvider, Provider, ProviderBuilder},
    rpc::types::{Filter, TransactionRequest},
    signers::local::PrivateKeySigner,
    transports::TransportError,
};
use alloy_sol_types::{SolCall, SolEvent};
use async_trait::async_trait;
use smashcash_lib::{
    error::{Error, Result},
    field::fr_from_b256,
    witness::CallArguments,
    BlockContext, DepositEvent, ISmashnado, IERC20,
};
use tracing::{debug, info};

use crate::config::DEFAULT_EVENT_PAGE_SIZE;

/// Gas limit for a direct `withdraw` call.
pub const WITHDRAW_GAS_LIMIT: u64 = 1_000_000;

/// Gas limit for `deposit`.
pub const DEPOSIT_GAS_LIMIT: u64 = 2_000_000;

/// Gas limit for an ERC-20 `approve`.
pub const APPROVE_GAS_LIMIT: u64 = 1_000_000;

/// The parts of a transaction receipt the client acts on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Receipt {
    pub transaction_hash: B256,
    pub block_number: Option<u64>,
    pub success: bool,
}

#[async_trait]
pub trait Ledger: Send + Sync {
    /// Chain id the ledger reports.
    async fn network_id(&self) -> Result<u64>;

    /// Account that signs transactions, if a key was configured.
    fn sender(&self) -> Option<Address>;

    /// Every `Deposit` event the pool emitted since `from_block`.
    async fn deposit_events(&self, contract: Address, from_block: u64) -> Result<Vec<DepositEvent>>;

    async fn is_known_root(&self, contract: Address, root: B256) -> Result<bool>;

    async fn is_spent(&self, contract: Address, nullifier_hash: B256) -> Result<bool>;

    /// Send `withdraw(...)` with `args.refund` attached as value.
    async fn submit_withdraw(&self, contract: Address, args: &CallArguments) -> Result<B256>;

    /// Send `deposit(commitment)` with `value` attached.
    async fn submit_deposit(&self, contract: Address, commitment: B256, value: U256) -> Result<B256>;

    async fn transaction_receipt(&self, tx_hash: B256) -> Result<Option<Receipt>>;

    async fn native_balance(&self, owner: Address) -> Result<U256>;

    async fn token_balance(&self, token: Address, owner: Address) -> Result<U256>;

    async fn allowance(&self, token: Address, owner: Address, spender: Address) -> Result<U256>;

    async fn approve(&self, token: Address, spender: Address, amount: U256) -> Result<B256>;
}

/// Map transport and wallet RPC failures to a ledger error.
///
/// Wallet error codes follow EIP-1193 and JSON-RPC 2.0.
pub(crate) fn rpc_failure(call: &'static str, err: TransportError) -> Error {
    let reason = match err.as_error_resp() {
        Some(payload) => match payload.code {
            4001 => "request rejected by the user".to_string(),
            -32602 => format!("invalid parameters: {}", payload.message),
            -32603 => format!("request not processed: {}", payload.message),
            code => format!("rpc error {code}: {}", payload.message),
        },
        None => err.to_string(),
    };
    Error::ledger(call, reason)
}

/// Block ranges `[from, to]` of at most `page_size` blocks covering
/// `from_block..=latest`.
pub fn block_pages(from_block: u64, latest: u64, page_size: u64) -> Vec<(u64, u64)> {
    let page_size = page_size.max(1);
    let mut pages = Vec::new();
    let mut start = from_block;
    while start <= latest {
        let end = start.saturating_add(page_size - 1).min(latest);
        pages.push((start, end));
        if end == u64::MAX {
            break;
        }
        start = end + 1;
    }
    pages
}

/// Convert a decoded `Deposit` log into a tree event.
///
/// Commitments outside the scalar field are a bad ledger response.
pub(crate) fn deposit_event(event: &ISmashnado::Deposit, block: BlockContext) -> Result<DepositEvent> {
    let commitment = fr_from_b256(&event.commitment).map_err(|_| {
        Error::ledger(
            "eth_getLogs",
            format!(
                "deposit {} carries commitment {} outside the field",
                event.leafIndex, event.commitment
            ),
        )
    })?;
    Ok(DepositEvent {
        commitment,
        leaf_index: event.leafIndex,
        block,
    })
}

/// Alloy-backed ledger connection, reused across every call of a session.
pub struct LedgerClient {
    provider: DynProvider,
    sender: Option<Address>,
    page_size: u64,
}

impl LedgerClient {
    /// Connect to `rpc_url`, signing with `private_key` when given.
    pub async fn connect(rpc_url: &str, private_key: Option<&str>) -> Result<Self> {
        match private_key {
            Some(key) => {
                let signer: PrivateKeySigner = key
                    .parse()
                    .map_err(|e| Error::ledger("connect", format!("invalid private key: {e}")))?;
                let sender = signer.address();
                let provider = ProviderBuilder::new()
                    .wallet(signer)
                    .connect(rpc_url)
                    .await
                    .map_err(|e| rpc_failure("connect", e))?
                    .erased();
                Ok(Self::from_provider(provider, Some(sender)))
            }
            None => {
                let provider = ProviderBuilder::new()
                    .connect(rpc_url)
                    .await
                    .map_err(|e| rpc_failure("connect", e))?
                    .erased();
                Ok(Self::from_provider(provider, None))
            }
        }
    }

    pub fn from_provider(provider: DynProvider, sender: Option<Address>) -> Self {
        Self {
            provider,
            sender,
            page_size: DEFAULT_EVENT_PAGE_SIZE,
        }
    }

    pub fn with_page_size(mut self, page_size: u64) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    async fn view<C: SolCall>(&self, call_name: &'static str, to: Address, call: C) -> Result<C::Return> {
        let tx = TransactionRequest::default()
            .to(to)
            .input(Bytes::from(call.abi_encode()).into());
        let output = self
            .provider
            .call(tx)
            .await
            .map_err(|e| rpc_failure(call_name, e))?;
        C::abi_decode_returns(&output).map_err(|e| Error::ledger(call_name, e))
    }

    async fn send(
        &self,
        call_name: &'static str,
        to: Address,
        input: Bytes,
        value: U256,
        gas_limit: u64,
    ) -> Result<B256> {
        let from = self
            .sender
            .ok_or_else(|| Error::ledger(call_name, "no signing key configured"))?;
        let tx = TransactionRequest::default()
            .from(from)
            .to(to)
            .input(input.into())
            .value(value)
            .gas_limit(gas_limit);
        let pending = self
            .provider
            .send_transaction(tx)
            .await
            .map_err(|e| rpc_failure(call_name, e))?;
        let tx_hash = *pending.tx_hash();
        info!(call = call_name, %tx_hash, "transaction sent");
        Ok(tx_hash)
    }
}

#[async_trait]
impl Ledger for LedgerClient {
    async fn network_id(&self) -> Result<u64> {
        self.provider
            .get_chain_id()
            .await
            .map_err(|e| rpc_failure("eth_chainId", e))
    }

    fn sender(&self) -> Option<Address> {
        self.sender
    }

    async fn deposit_events(&self, contract: Address, from_block: u64) -> Result<Vec<DepositEvent>> {
        let latest = self
            .provider
            .get_block_number()
            .await
            .map_err(|e| rpc_failure("eth_blockNumber", e))?;

        let mut events = Vec::new();
        for (start, end) in block_pages(from_block, latest, self.page_size) {
            let filter = Filter::new()
                .address(contract)
                .event_signature(ISmashnado::Deposit::SIGNATURE_HASH)
                .from_block(start)
                .to_block(end);
            let logs = self
                .provider
                .get_logs(&filter)
                .await
                .map_err(|e| rpc_failure("eth_getLogs", e))?;
            debug!(start, end, logs = logs.len(), "fetched deposit page");

            for log in logs {
                let decoded = log
                    .log_decode::<ISmashnado::Deposit>()
                    .map_err(|e| Error::ledger("eth_getLogs", e))?;
                let block = BlockContext {
                    block_number: log.block_number,
                    transaction_hash: log.transaction_hash,
                    timestamp: u64::try_from(decoded.inner.data.timestamp).ok(),
                };
                events.push(deposit_event(&decoded.inner.data, block)?);
            }
        }
        info!(count = events.len(), %contract, "loaded deposit events");
        Ok(events)
    }

    async fn is_known_root(&self, contract: Address, root: B256) -> Result<bool> {
        self.view("isKnownRoot", contract, ISmashnado::isKnownRootCall { root })
            .await
    }

    async fn is_spent(&self, contract: Address, nullifier_hash: B256) -> Result<bool> {
        self.view(
            "isSpent",
            contract,
            ISmashnado::isSpentCall {
                nullifierHash: nullifier_hash,
            },
        )
        .await
    }

    async fn submit_withdraw(&self, contract: Address, args: &CallArguments) -> Result<B256> {
        self.send(
            "withdraw",
            contract,
            args.withdraw_calldata(),
            args.refund,
            WITHDRAW_GAS_LIMIT,
        )
        .await
    }

    async fn submit_deposit(&self, contract: Address, commitment: B256, value: U256) -> Result<B256> {
        let input = ISmashnado::depositCall { commitment }.abi_encode();
        self.send("deposit", contract, input.into(), value, DEPOSIT_GAS_LIMIT)
            .await
    }

    async fn transaction_receipt(&self, tx_hash: B256) -> Result<Option<Receipt>> {
        let receipt = self
            .provider
            .get_transaction_receipt(tx_hash)
            .await
            .map_err(|e| rpc_failure("eth_getTransactionReceipt", e))?;
        Ok(receipt.map(|r| Receipt {
            transaction_hash: r.transaction_hash,
            block_number: r.block_number,
            success: r.status(),
        }))
    }

    async fn native_balance(&self, owner: Address) -> Result<U256> {
        self.provider
            .get_balance(owner)
            .await
            .map_err(|e| rpc_failure("eth_getBalance", e))
    }

    async fn token_balance(&self, token: Address, owner: Address) -> Result<U256> {
        self.view("balanceOf", token, IERC20::balanceOfCall { owner })
            .await
    }

    async fn allowance(&self, token: Address, owner: Address, spender: Address) -> Result<U256> {
        self.view("allowance", token, IERC20::allowanceCall { owner, spender })
            .await
    }

    async fn approve(&self, token: Address, spender: Address, amount: U256) -> Result<B256> {
        let input = IERC20::approveCall { spender, amount }.abi_encode();
        self.send("approve", token, input.into(), U256::ZERO, APPROVE_GAS_LIMIT)
            .await
    }
}
