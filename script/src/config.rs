//! Known pool deployments and resolution of a (network, currency, amount)
//! triple to a concrete contract.

use alloy::primitives::{Address, U256};
use smashcash_lib::error::{Error, Result};
use smashcash_lib::fee::NATIVE_CURRENCY;
use smashcash_lib::units::from_decimals;

/// Network the public deployment lives on.
pub const DEFAULT_NET_ID: u64 = 100;

/// Blocks requested per `eth_getLogs` page.
pub const DEFAULT_EVENT_PAGE_SIZE: u64 = 10_000;

#[derive(Debug, Clone, Copy)]
pub struct CurrencyDeployment {
    pub currency: &'static str,
    pub symbol: &'static str,
    pub decimals: u8,
    pub token_address: Option<Address>,
    /// `(amount, instance address)`; `None` means not deployed yet.
    pub instances: &'static [(&'static str, Option<Address>)],
}

#[derive(Debug, Clone, Copy)]
pub struct NetworkDeployment {
    pub net_id: u64,
    pub currencies: &'static [CurrencyDeployment],
}

pub const DEPLOYMENTS: &[NetworkDeployment] = &[NetworkDeployment {
    net_id: 100,
    currencies: &[CurrencyDeployment {
        currency: "xdai",
        symbol: "XDAI",
        decimals: 18,
        token_address: None,
        instances: &[
            ("1", None),
            ("1000", None),
            ("10000", None),
            ("100000", None),
        ],
    }],
}];

/// One denomination of the pool, ready to transact against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolInstance {
    pub net_id: u64,
    pub currency: String,
    pub symbol: String,
    pub amount: String,
    pub decimals: u8,
    pub address: Address,
    pub token_address: Option<Address>,
}

impl PoolInstance {
    pub fn is_native(&self) -> bool {
        self.currency.eq_ignore_ascii_case(NATIVE_CURRENCY)
    }

    /// Denomination in smallest units.
    pub fn amount_units(&self) -> Result<U256> {
        from_decimals(&self.amount, self.decimals)
    }
}

fn find_currency(
    deployments: &'static [NetworkDeployment],
    net_id: u64,
    currency: &str,
) -> Option<&'static CurrencyDeployment> {
    deployments
        .iter()
        .find(|network| network.net_id == net_id)?
        .currencies
        .iter()
        .find(|c| c.currency.eq_ignore_ascii_case(currency))
}

/// Resolve a pool instance from a deployments table.
///
/// `contract` overrides the table's address, and is required for
/// denominations that have no address configured.
pub fn resolve_instance_in(
    deployments: &'static [NetworkDeployment],
    net_id: u64,
    currency: &str,
    amount: &str,
    contract: Option<Address>,
) -> Result<PoolInstance> {
    let unknown = || Error::UnknownInstance {
        currency: currency.to_string(),
        amount: amount.to_string(),
        net_id,
    };

    let deployment = find_currency(deployments, net_id, currency).ok_or_else(unknown)?;
    let configured = deployment
        .instances
        .iter()
        .find(|(denomination, _)| *denomination == amount)
        .ok_or_else(unknown)?
        .1;
    let address = contract.or(configured).ok_or_else(unknown)?;

    Ok(PoolInstance {
        net_id,
        currency: deployment.currency.to_string(),
        symbol: deployment.symbol.to_string(),
        amount: amount.to_string(),
        decimals: deployment.decimals,
        address,
        token_address: deployment.token_address,
    })
}

/// Resolve against the built-in [`DEPLOYMENTS`].
pub fn resolve_instance(
    net_id: u64,
    currency: &str,
    amount: &str,
    contract: Option<Address>,
) -> Result<PoolInstance> {
    resolve_instance_in(DEPLOYMENTS, net_id, currency, amount, contract)
}

/// Denominations available for a currency, for prompts and help text.
pub fn denominations(net_id: u64, currency: &str) -> Vec<&'static str> {
    find_currency(DEPLOYMENTS, net_id, currency)
        .map(|c| c.instances.iter().map(|(amount, _)| *amount).collect())
        .unwrap_or_default()
}
