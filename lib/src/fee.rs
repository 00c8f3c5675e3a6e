//! Relayer fee: gas cost at the relayer's quoted price plus its percentage
//! service fee, in the withdrawn currency's smallest unit.

use alloy_primitives::U256;

use crate::error::{Error, Result};
use crate::units::{from_decimals, pow10};

/// Gas the relayer budgets for one `withdraw` transaction.
pub const GAS_ESTIMATE: u64 = 500_000;

/// The chain's native currency; every other currency is an ERC-20 token.
pub const NATIVE_CURRENCY: &str = "xdai";

/// Gas prices are quoted in gwei.
const GWEI_DECIMALS: u8 = 9;

/// Everything the fee depends on, as quoted by the relayer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeeParams {
    /// `gasPrices.fast`, decimal gwei.
    pub gas_price_fast: String,
    /// Decimal percentage, e.g. `"0.05"`.
    pub service_fee_percent: String,
    pub refund: U256,
    /// Smallest units of native currency per whole token. Required for tokens.
    pub exchange_rate: Option<U256>,
    pub decimals: u8,
    pub currency: String,
    pub amount: U256,
}

impl FeeParams {
    pub fn is_native(&self) -> bool {
        self.currency.eq_ignore_ascii_case(NATIVE_CURRENCY)
    }
}

/// `amount * pct / 100`, with `pct` scaled by its own count of fractional
/// digits so the division happens once, at the end.
pub fn service_fee(amount: &U256, percent: &str) -> Result<U256> {
    let percent = percent.trim();
    let scale = percent
        .split_once('.')
        .map(|(_, fraction)| fraction.len())
        .unwrap_or(0);
    let scale = u8::try_from(scale)
        .map_err(|_| Error::InvalidAmount(format!("service fee {percent:?} is too precise")))?;
    let scaled = from_decimals(percent, scale)?;

    let numerator = amount
        .checked_mul(scaled)
        .ok_or_else(|| Error::InvalidAmount("service fee overflows 256 bits".into()))?;
    Ok(numerator / (pow10(scale) * U256::from(100u8)))
}

/// Gas cost of one withdrawal at `gas_price_fast` gwei, in wei.
pub fn gas_expense(gas_price_fast: &str) -> Result<U256> {
    let gas_price = from_decimals(gas_price_fast, GWEI_DECIMALS)?;
    gas_price
        .checked_mul(U256::from(GAS_ESTIMATE))
        .ok_or_else(|| Error::InvalidAmount("gas expense overflows 256 bits".into()))
}

/// Total relayer fee for a withdrawal.
///
/// # Arguments
/// * `params` - Relayer quote and the pool instance being withdrawn from
///
/// # Returns
/// * The fee in smallest units, floored
pub fn compute_fee(params: &FeeParams) -> Result<U256> {
    let expense = gas_expense(&params.gas_price_fast)?;
    let service = service_fee(&params.amount, &params.service_fee_percent)?;

    let gas_part = if params.is_native() {
        expense
    } else {
        let rate = params
            .exchange_rate
            .filter(|rate| !rate.is_zero())
            .ok_or_else(|| {
                Error::InvalidAmount(format!("no exchange rate quoted for {}", params.currency))
            })?;
        expense
            .checked_add(params.refund)
            .and_then(|total| total.checked_mul(pow10(params.decimals)))
            .map(|total| total / rate)
            .ok_or_else(|| Error::InvalidAmount("token fee overflows 256 bits".into()))?
    };

    gas_part
        .checked_add(service)
        .ok_or_else(|| Error::InvalidAmount("fee overflows 256 bits".into()))
}
