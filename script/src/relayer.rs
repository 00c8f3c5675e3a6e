//! HTTP client for withdrawal relayers.

use std::collections::HashMap;
use std::fmt;

use alloy::primitives::{Address, B256, U256};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use smashcash_lib::error::{Error, Result};
use smashcash_lib::witness::CallArguments;
use tracing::{debug, info};

/// A number the relayer may send either as a JSON number or a string.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum Quoted {
    Text(String),
    Number(serde_json::Number),
}

impl fmt::Display for Quoted {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Quoted::Text(text) => f.write_str(text.trim()),
            Quoted::Number(number) => write!(f, "{number}"),
        }
    }
}

/// Network a relayer serves: a chain id or `"*"` for any.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum NetId {
    Id(u64),
    Text(String),
}

impl NetId {
    pub fn matches(&self, net_id: u64) -> bool {
        match self {
            NetId::Id(id) => *id == net_id,
            NetId::Text(text) => {
                let text = text.trim();
                text == "*" || text.parse::<u64>().map_or(false, |id| id == net_id)
            }
        }
    }
}

impl fmt::Display for NetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NetId::Id(id) => write!(f, "{id}"),
            NetId::Text(text) => f.write_str(text),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GasPrices {
    /// Gwei.
    pub fast: Quoted,
}

/// `GET /status` response.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayerStatus {
    pub relayer_address: Address,
    pub net_id: NetId,
    pub gas_prices: GasPrices,
    /// Price of one whole token in the native currency's smallest unit.
    #[serde(default, alias = "exchangeRates")]
    pub eth_prices: HashMap<String, Quoted>,
    #[serde(alias = "serviceFeePercent")]
    pub relayer_service_fee: Quoted,
}

impl RelayerStatus {
    /// Exchange rate quoted for `currency`, if any.
    pub fn exchange_rate(&self, currency: &str) -> Result<Option<U256>> {
        let quote = self
            .eth_prices
            .iter()
            .find(|(symbol, _)| symbol.eq_ignore_ascii_case(currency))
            .map(|(_, quote)| quote.to_string());
        quote
            .map(|rate| {
                U256::from_str_radix(&rate, 10).map_err(|e| {
                    Error::RelayerRejected(format!("unusable exchange rate {rate:?}: {e}"))
                })
            })
            .transpose()
    }
}

/// `POST /relay` body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RelayRequest {
    pub contract: Address,
    pub proof: String,
    pub args: [String; 6],
}

impl RelayRequest {
    pub fn new(contract: Address, args: &CallArguments) -> Self {
        Self {
            contract,
            proof: format!("0x{}", hex::encode(&args.proof)),
            args: args.to_hex_args(),
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RelayResponse {
    tx_hash: B256,
}

#[derive(Deserialize)]
struct RelayerErrorBody {
    error: String,
}

#[async_trait]
pub trait Relayer: Send + Sync {
    async fn status(&self) -> Result<RelayerStatus>;

    /// Hand a withdrawal to the relayer; returns the hash it broadcast.
    async fn relay(&self, request: &RelayRequest) -> Result<B256>;
}

pub struct RelayerClient {
    base_url: String,
    http: reqwest::Client,
}

impl RelayerClient {
    pub fn new(base_url: &str) -> Result<Self> {
        let base_url = base_url.trim().trim_end_matches('/').to_string();
        if base_url.ends_with(".eth") {
            return Err(Error::RelayerRejected(
                "ENS relayer names are not supported, use the relayer's URL".into(),
            ));
        }
        Ok(Self {
            base_url,
            http: reqwest::Client::new(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn rejected(response: reqwest::Response) -> Error {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<RelayerErrorBody>(&body)
            .map(|b| b.error)
            .unwrap_or(body);
        Error::RelayerRejected(format!("{status}: {message}"))
    }
}

fn transport(err: reqwest::Error) -> Error {
    Error::RelayerRejected(err.to_string())
}

#[async_trait]
impl Relayer for RelayerClient {
    async fn status(&self) -> Result<RelayerStatus> {
        let url = format!("{}/status", self.base_url);
        debug!(%url, "querying relayer status");
        let response = self.http.get(&url).send().await.map_err(transport)?;
        if !response.status().is_success() {
            return Err(Self::rejected(response).await);
        }
        let status: RelayerStatus = response.json().await.map_err(transport)?;
        info!(relayer = %status.relayer_address, net_id = %status.net_id, "relayer status");
        Ok(status)
    }

    async fn relay(&self, request: &RelayRequest) -> Result<B256> {
        let url = format!("{}/relay", self.base_url);
        let response = self
            .http
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(transport)?;
        if !response.status().is_success() {
            return Err(Self::rejected(response).await);
        }
        let relayed: RelayResponse = response.json().await.map_err(transport)?;
        info!(tx_hash = %relayed.tx_hash, "withdrawal accepted by relayer");
        Ok(relayed.tx_hash)
    }
}
