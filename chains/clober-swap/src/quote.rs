//! Swap quotes from the OpenOcean aggregator.

use anyhow::{Context, Result};
use async_trait::async_trait;
use core_logic::NetworkError;
use ethers::types::{Address, Bytes, H160, U256};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

/// The native asset as addressed by the aggregator and the router.
pub const NATIVE_TOKEN: Address = H160([0u8; 20]);

#[derive(Debug, Clone, PartialEq)]
pub struct QuoteRequest {
    pub in_token: Address,
    pub out_token: Address,
    /// Human-readable input amount, e.g. `"0.250000"`.
    pub amount: String,
    pub gas_price: String,
    pub slippage_bps: u32,
    pub account: Address,
    pub referrer: Address,
}

/// Routing payload returned for a request.
#[derive(Debug, Clone, PartialEq)]
pub struct SwapQuote {
    pub out_amount: U256,
    /// Recipient argument for the router call.
    pub to: Address,
    /// Opaque calldata forwarded to the router.
    pub data: Bytes,
    /// Native value to attach, zero when the aggregator omits it.
    pub value: U256,
}

#[derive(Debug, Error, PartialEq)]
pub enum QuoteError {
    #[error("Quote rejected (code {code}): {message}")]
    Rejected { code: i64, message: String },

    #[error("Quote response has no data")]
    MissingData,

    #[error("Invalid amount in quote response: {0}")]
    InvalidAmount(String),
}

#[async_trait]
pub trait QuoteSource: Send + Sync {
    async fn quote(&self, request: &QuoteRequest) -> Result<SwapQuote>;
}

#[derive(Debug, Deserialize)]
struct QuoteEnvelope {
    code: i64,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    data: Option<QuoteData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuoteData {
    out_amount: Value,
    to: Address,
    data: Bytes,
    #[serde(default)]
    value: Option<Value>,
}

fn parse_amount(value: &Value) -> Result<U256, QuoteError> {
    let invalid = || QuoteError::InvalidAmount(value.to_string());
    match value {
        Value::String(s) => {
            let s = s.trim();
            if let Some(hex) = s.strip_prefix("0x") {
                U256::from_str_radix(hex, 16).map_err(|_| invalid())
            } else if s.is_empty() {
                Ok(U256::zero())
            } else {
                U256::from_dec_str(s).map_err(|_| invalid())
            }
        }
        Value::Number(n) => n.as_u64().map(U256::from).ok_or_else(invalid),
        Value::Null => Ok(U256::zero()),
        _ => Err(invalid()),
    }
}

/// Turns a decoded response body into a quote, rejecting any code but 200.
pub fn interpret_response(body: Value) -> Result<SwapQuote> {
    let envelope: QuoteEnvelope =
        serde_json::from_value(body).context("Malformed quote response")?;

    if envelope.code != 200 {
        return Err(QuoteError::Rejected {
            code: envelope.code,
            message: envelope
                .message
                .unwrap_or_else(|| "Unknown error".to_string()),
        }
        .into());
    }

    let data = envelope.data.ok_or(QuoteError::MissingData)?;
    let value = match &data.value {
        Some(v) => parse_amount(v)?,
        None => U256::zero(),
    };

    Ok(SwapQuote {
        out_amount: parse_amount(&data.out_amount)?,
        to: data.to,
        data: data.data,
        value,
    })
}

/// Slippage in the aggregator's percent notation.
pub fn slippage_percent(bps: u32) -> String {
    (bps as f64 / 100.0).to_string()
}

/// Turns a failed send into `NetworkError::Timeout` when the client gave up
/// waiting, otherwise keeps the transport error with `what` as context.
pub(crate) fn send_error(
    e: reqwest::Error,
    endpoint: &str,
    timeout: Duration,
    what: &str,
) -> anyhow::Error {
    if e.is_timeout() {
        NetworkError::Timeout {
            timeout_ms: timeout.as_millis() as u64,
            endpoint: endpoint.to_string(),
        }
        .into()
    } else {
        anyhow::Error::new(e).context(what.to_string())
    }
}

pub struct OpenOceanClient {
    http: reqwest::Client,
    endpoint: String,
    timeout: Duration,
}

impl OpenOceanClient {
    pub fn new(endpoint: &str) -> Result<Self> {
        Self::with_timeout(endpoint, Duration::from_secs(30))
    }

    pub fn with_timeout(endpoint: &str, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            http,
            endpoint: endpoint.to_string(),
            timeout,
        })
    }
}

#[async_trait]
impl QuoteSource for OpenOceanClient {
    async fn quote(&self, request: &QuoteRequest) -> Result<SwapQuote> {
        let params = [
            ("inTokenAddress", format!("{:?}", request.in_token)),
            ("outTokenAddress", format!("{:?}", request.out_token)),
            ("amount", request.amount.clone()),
            ("gasPrice", request.gas_price.clone()),
            ("slippage", slippage_percent(request.slippage_bps)),
            ("account", format!("{:?}", request.account)),
            ("referrer", format!("{:?}", request.referrer)),
        ];

        let response = self
            .http
            .get(&self.endpoint)
            .query(&params)
            .send()
            .await
            .map_err(|e| {
                send_error(e, &self.endpoint, self.timeout, "Failed to call OpenOcean API")
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(NetworkError::HttpError {
                status_code: status.as_u16(),
                endpoint: self.endpoint.clone(),
            }
            .into());
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| NetworkError::InvalidResponse {
                endpoint: self.endpoint.clone(),
                reason: e.to_string(),
            })?;
        interpret_response(body)
    }
}
