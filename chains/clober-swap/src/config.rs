use anyhow::Result;
use config::{Config, Environment, File};
use core_logic::config::{ChainConfig, PacingConfig};
use core_logic::{ConfigError, GasPolicy};
use ethers::types::Address;
use serde::Deserialize;
use std::time::Duration;

use crate::swap::SwapSettings;

fn default_chain_id() -> u64 {
    10143
}

fn default_network_name() -> String {
    "CLOBER TESTNET".to_string()
}

fn default_keys_file() -> String {
    "keys.txt".to_string()
}

fn default_openocean_api() -> String {
    "https://open-api.openocean.finance/v4/10143/swap".to_string()
}

fn default_referrer() -> String {
    "0x331fa4a4f7b906491f37bdc8b042b894234e101f".to_string()
}

fn default_leaderboard_api() -> String {
    "https://alpha.clober.io/api/chains/10143/leaderboard/user-address".to_string()
}

fn default_slippage_bps() -> u32 {
    100
}

fn default_gas_price_hint() -> String {
    "52000000000".to_string()
}

fn default_quote_throttle_ms() -> u64 {
    3000
}

fn default_gas_margin_percent() -> u64 {
    20
}

#[derive(Debug, Deserialize, Clone)]
pub struct CloberConfig {
    pub rpc_url: String,
    #[serde(default = "default_chain_id")]
    pub chain_id: u64,
    #[serde(default = "default_network_name")]
    pub network_name: String,
    #[serde(default = "default_keys_file")]
    pub keys_file: String,

    pub wmon_address: String,
    pub usdc_address: String,
    pub smon_address: String,
    pub dak_address: String,
    pub wmon_swap_address: String,
    pub router_address: String,

    #[serde(default = "default_openocean_api")]
    pub openocean_api: String,
    #[serde(default = "default_referrer")]
    pub referrer: String,
    #[serde(default = "default_leaderboard_api")]
    pub leaderboard_api: String,
    #[serde(default = "default_slippage_bps")]
    pub slippage_bps: u32,
    #[serde(default = "default_gas_price_hint")]
    pub gas_price_hint: String,
    #[serde(default = "default_quote_throttle_ms")]
    pub quote_throttle_ms: u64,
    #[serde(default = "default_gas_margin_percent")]
    pub gas_margin_percent: u64,

    #[serde(default)]
    pub pacing: PacingConfig,
    #[serde(default)]
    pub debug_mode: bool,
}

/// Contract addresses, parsed once at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContractBook {
    pub wmon: Address,
    pub usdc: Address,
    pub smon: Address,
    pub dak: Address,
    pub wmon_swap: Address,
    pub router: Address,
}

fn parse_address(field: &str, value: &str) -> Result<Address, ConfigError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::MissingField {
            field: field.to_string(),
        });
    }
    trimmed
        .parse::<Address>()
        .map_err(|e| ConfigError::InvalidValue {
            field: field.to_string(),
            reason: e.to_string(),
        })
}

fn check_url(field: &str, value: &str) -> Result<(), ConfigError> {
    url::Url::parse(value)
        .map(|_| ())
        .map_err(|e| ConfigError::InvalidValue {
            field: field.to_string(),
            reason: e.to_string(),
        })
}

impl CloberConfig {
    /// Loads the TOML file (optional) and overlays environment variables,
    /// e.g. `RPC_URL` or `ROUTER_ADDRESS` from `.env`.
    pub fn load(path: &str) -> Result<Self> {
        let settings = Config::builder()
            .add_source(File::with_name(path).required(false))
            .add_source(Environment::default().try_parsing(true))
            .build()?;

        let config: Self = settings.try_deserialize().map_err(|e| anyhow::anyhow!(e))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        check_url("rpc_url", &self.rpc_url)?;
        check_url("openocean_api", &self.openocean_api)?;
        check_url("leaderboard_api", &self.leaderboard_api)?;
        if self.slippage_bps == 0 || self.slippage_bps > 10_000 {
            return Err(ConfigError::InvalidValue {
                field: "slippage_bps".to_string(),
                reason: format!("{} is outside 1..=10000", self.slippage_bps),
            });
        }
        for (field, range) in [
            ("pacing.iteration", self.pacing.iteration),
            ("pacing.wallet", self.pacing.wallet),
        ] {
            if range.min_ms > range.max_ms {
                return Err(ConfigError::InvalidValue {
                    field: field.to_string(),
                    reason: format!("min_ms {} > max_ms {}", range.min_ms, range.max_ms),
                });
            }
        }
        self.contracts()?;
        self.referrer_address()?;
        Ok(())
    }

    pub fn contracts(&self) -> Result<ContractBook, ConfigError> {
        Ok(ContractBook {
            wmon: parse_address("wmon_address", &self.wmon_address)?,
            usdc: parse_address("usdc_address", &self.usdc_address)?,
            smon: parse_address("smon_address", &self.smon_address)?,
            dak: parse_address("dak_address", &self.dak_address)?,
            wmon_swap: parse_address("wmon_swap_address", &self.wmon_swap_address)?,
            router: parse_address("router_address", &self.router_address)?,
        })
    }

    pub fn referrer_address(&self) -> Result<Address, ConfigError> {
        parse_address("referrer", &self.referrer)
    }

    pub fn chain(&self) -> ChainConfig {
        ChainConfig {
            name: self.network_name.clone(),
            rpc_endpoint: self.rpc_url.clone(),
            chain_id: self.chain_id,
        }
    }

    pub fn swap_settings(&self) -> Result<SwapSettings, ConfigError> {
        Ok(SwapSettings {
            gas: GasPolicy::new(self.gas_margin_percent),
            slippage_bps: self.slippage_bps,
            gas_price_hint: self.gas_price_hint.clone(),
            referrer: self.referrer_address()?,
            quote_throttle: Duration::from_millis(self.quote_throttle_ms),
        })
    }
}
