//! Read-only balance, decimals and allowance lookups for the active wallet.
//!
//! Reads have no side effects, so calling them repeatedly without an
//! intervening transaction returns the same values.

use crate::chain::ChainClient;
use anyhow::Result;
use ethers::types::{Address, U256};
use ethers::utils::format_units;

/// Native asset decimals.
pub const NATIVE_DECIMALS: u8 = 18;

pub struct BalanceOracle<'a> {
    chain: &'a dyn ChainClient,
}

impl<'a> BalanceOracle<'a> {
    pub fn new(chain: &'a dyn ChainClient) -> Self {
        Self { chain }
    }

    pub fn owner(&self) -> Address {
        self.chain.address()
    }

    pub async fn native_balance(&self) -> Result<U256> {
        self.chain.native_balance().await
    }

    pub async fn token_balance(&self, token: Address) -> Result<U256> {
        self.chain.token_balance(token).await
    }

    pub async fn decimals(&self, token: Address) -> Result<u8> {
        self.chain.token_decimals(token).await
    }

    pub async fn allowance(&self, token: Address, spender: Address) -> Result<U256> {
        self.chain.allowance(token, spender).await
    }

    /// Token balance rendered in whole units.
    pub async fn token_balance_display(&self, token: Address) -> Result<String> {
        let balance = self.token_balance(token).await?;
        let decimals = self.decimals(token).await?;
        Ok(format_amount(balance, decimals))
    }

    pub async fn native_balance_display(&self) -> Result<String> {
        let balance = self.native_balance().await?;
        Ok(format_amount(balance, NATIVE_DECIMALS))
    }
}

/// Base units to a decimal string, trimmed of trailing zeros.
pub fn format_amount(amount: U256, decimals: u8) -> String {
    match format_units(amount, decimals as u32) {
        Ok(text) => {
            if text.contains('.') {
                let trimmed = text.trim_end_matches('0').trim_end_matches('.');
                trimmed.to_string()
            } else {
                text
            }
        }
        Err(_) => amount.to_string(),
    }
}
