//! Chain access for one signing wallet.
//!
//! [`ChainClient`] is the seam between the swap logic and the RPC node; the
//! production implementation wraps an ethers `SignerMiddleware`.

use crate::contracts::Erc20;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use core_logic::WalletKey;
use ethers::prelude::*;
use ethers::types::transaction::eip2718::TypedTransaction;
use std::sync::Arc;
use std::time::Duration;

pub type SignerClient = SignerMiddleware<Provider<Http>, LocalWallet>;

/// Unsigned transaction body. Nonce and fees are filled at submission.
#[derive(Debug, Clone, PartialEq)]
pub struct TxRequest {
    pub to: Address,
    pub data: Bytes,
    pub value: U256,
    pub gas: Option<u64>,
}

impl TxRequest {
    pub fn new(to: Address, data: impl Into<Bytes>) -> Self {
        Self {
            to,
            data: data.into(),
            value: U256::zero(),
            gas: None,
        }
    }

    pub fn with_value(mut self, value: U256) -> Self {
        self.value = value;
        self
    }

    pub fn with_gas(mut self, gas: u64) -> Self {
        self.gas = Some(gas);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxReceipt {
    pub hash: H256,
    pub success: bool,
}

#[async_trait]
pub trait ChainClient: Send + Sync {
    fn address(&self) -> Address;

    async fn native_balance(&self) -> Result<U256>;

    async fn token_balance(&self, token: Address) -> Result<U256>;

    async fn token_decimals(&self, token: Address) -> Result<u8>;

    async fn allowance(&self, token: Address, spender: Address) -> Result<U256>;

    /// Transaction count including pending transactions.
    async fn pending_nonce(&self) -> Result<U256>;

    async fn estimate_gas(&self, tx: &TxRequest) -> Result<u64>;

    async fn send_transaction(&self, tx: TxRequest, nonce: U256) -> Result<H256>;

    /// Waits for one confirmation. A dropped transaction is an error.
    async fn wait_for_receipt(&self, hash: H256) -> Result<TxReceipt>;
}

pub struct EthersChainClient {
    client: Arc<SignerClient>,
    address: Address,
}

impl EthersChainClient {
    pub fn new(provider: Provider<Http>, key: &WalletKey, chain_id: u64) -> Result<Self> {
        let wallet = LocalWallet::from_bytes(&key.to_bytes()?)
            .context("Invalid private key")?
            .with_chain_id(chain_id);
        let address = wallet.address();
        let client = Arc::new(SignerMiddleware::new(provider, wallet));
        Ok(Self { client, address })
    }

    fn typed(&self, tx: &TxRequest) -> TypedTransaction {
        let mut req = Eip1559TransactionRequest::new()
            .from(self.address)
            .to(tx.to)
            .data(tx.data.clone())
            .value(tx.value);
        if let Some(gas) = tx.gas {
            req = req.gas(gas);
        }
        req.into()
    }
}

#[async_trait]
impl ChainClient for EthersChainClient {
    fn address(&self) -> Address {
        self.address
    }

    async fn native_balance(&self) -> Result<U256> {
        self.client
            .get_balance(self.address, None)
            .await
            .context("Failed to fetch MON balance")
    }

    async fn token_balance(&self, token: Address) -> Result<U256> {
        Erc20::new(token, self.client.clone())
            .balance_of(self.address)
            .call()
            .await
            .with_context(|| format!("Failed to fetch balance of token {:?}", token))
    }

    async fn token_decimals(&self, token: Address) -> Result<u8> {
        Erc20::new(token, self.client.clone())
            .decimals()
            .call()
            .await
            .with_context(|| format!("Failed to fetch decimals of token {:?}", token))
    }

    async fn allowance(&self, token: Address, spender: Address) -> Result<U256> {
        Erc20::new(token, self.client.clone())
            .allowance(self.address, spender)
            .call()
            .await
            .with_context(|| format!("Failed to fetch allowance of token {:?}", token))
    }

    async fn pending_nonce(&self) -> Result<U256> {
        self.client
            .get_transaction_count(self.address, Some(BlockNumber::Pending.into()))
            .await
            .context("Failed to fetch pending nonce")
    }

    async fn estimate_gas(&self, tx: &TxRequest) -> Result<u64> {
        let gas = self
            .client
            .estimate_gas(&self.typed(tx), None)
            .await
            .context("Gas estimation failed")?;
        if gas > U256::from(u64::MAX) {
            return Err(anyhow!("Gas estimate out of range: {}", gas));
        }
        Ok(gas.as_u64())
    }

    async fn send_transaction(&self, tx: TxRequest, nonce: U256) -> Result<H256> {
        let mut typed = self.typed(&tx);
        typed.set_nonce(nonce);
        let pending = self
            .client
            .send_transaction(typed, None)
            .await
            .context("Failed to send transaction")?;
        Ok(pending.tx_hash())
    }

    async fn wait_for_receipt(&self, hash: H256) -> Result<TxReceipt> {
        let receipt = PendingTransaction::new(hash, self.client.provider())
            .interval(Duration::from_millis(1_000))
            .await
            .context("Failed to fetch receipt")?
            .ok_or_else(|| anyhow!("Transaction {:?} dropped before inclusion", hash))?;

        Ok(TxReceipt {
            hash: receipt.transaction_hash,
            success: receipt.status == Some(U64::from(1)),
        })
    }
}

/// Binds a wallet key to a chain client.
pub trait WalletConnector: Send + Sync {
    fn connect(&self, key: &WalletKey) -> Result<Arc<dyn ChainClient>>;
}

/// Shares one HTTP provider across all wallets.
#[derive(Clone)]
pub struct EthersConnector {
    provider: Provider<Http>,
    chain_id: u64,
}

impl EthersConnector {
    pub fn new(rpc_url: &str, chain_id: u64) -> Result<Self> {
        let url = url::Url::parse(rpc_url).with_context(|| format!("Invalid RPC URL: {}", rpc_url))?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to build HTTP client")?;
        let provider = Provider::new(Http::new_with_client(url, client));
        Ok(Self { provider, chain_id })
    }
}

impl WalletConnector for EthersConnector {
    fn connect(&self, key: &WalletKey) -> Result<Arc<dyn ChainClient>> {
        let client = EthersChainClient::new(self.provider.clone(), key, self.chain_id)?;
        Ok(Arc::new(client))
    }
}

/// First and last four hex digits of a hash or address.
pub fn short_hex(value: impl std::fmt::LowerHex) -> String {
    let full = format!("{:#x}", value);
    if full.len() <= 12 {
        return full;
    }
    format!("{}...{}", &full[..6], &full[full.len() - 4..])
}
