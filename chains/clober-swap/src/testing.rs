//! Scripted stand-ins for the chain, quote and leaderboard collaborators.

use crate::chain::{ChainClient, TxReceipt, TxRequest, WalletConnector};
use crate::leaderboard::{LeaderboardEntry, LeaderboardSource};
use crate::quote::{QuoteRequest, QuoteSource, SwapQuote};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use core_logic::WalletKey;
use ethers::types::{Address, Bytes, H256, U256};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// What happens to the next submitted transaction.
#[derive(Debug, Clone)]
pub enum Scripted {
    Success,
    Revert,
    SendError(String),
    ReceiptError(String),
}

#[derive(Default)]
struct MockState {
    native: U256,
    tokens: HashMap<Address, (U256, u8)>,
    allowances: HashMap<(Address, Address), U256>,
    pending_nonce: U256,
    nonce_fetches: usize,
    gas_estimate: Option<u64>,
    script: VecDeque<Scripted>,
    sent: Vec<(TxRequest, U256)>,
    receipts: HashMap<H256, Result<bool, String>>,
}

pub struct MockChain {
    address: Address,
    state: Mutex<MockState>,
}

impl MockChain {
    pub fn new() -> Self {
        Self {
            address: Address::repeat_byte(0xaa),
            state: Mutex::new(MockState::default()),
        }
    }

    pub fn with_address(mut self, address: Address) -> Self {
        self.address = address;
        self
    }

    pub fn with_native(self, amount: U256) -> Self {
        self.state.lock().unwrap().native = amount;
        self
    }

    pub fn with_token(self, token: Address, balance: U256, decimals: u8) -> Self {
        self.state
            .lock()
            .unwrap()
            .tokens
            .insert(token, (balance, decimals));
        self
    }

    pub fn with_allowance(self, token: Address, spender: Address, amount: U256) -> Self {
        self.state
            .lock()
            .unwrap()
            .allowances
            .insert((token, spender), amount);
        self
    }

    pub fn with_pending_nonce(self, nonce: u64) -> Self {
        self.set_pending_nonce(nonce);
        self
    }

    pub fn with_gas_estimate(self, gas: Option<u64>) -> Self {
        self.state.lock().unwrap().gas_estimate = gas;
        self
    }

    pub fn with_script(self, script: Vec<Scripted>) -> Self {
        self.state.lock().unwrap().script = script.into();
        self
    }

    pub fn set_pending_nonce(&self, nonce: u64) {
        self.state.lock().unwrap().pending_nonce = U256::from(nonce);
    }

    pub fn sent(&self) -> Vec<(TxRequest, U256)> {
        self.state.lock().unwrap().sent.clone()
    }

    pub fn sent_nonces(&self) -> Vec<u64> {
        self.sent().iter().map(|(_, n)| n.as_u64()).collect()
    }

    pub fn nonce_fetches(&self) -> usize {
        self.state.lock().unwrap().nonce_fetches
    }
}

#[async_trait]
impl ChainClient for MockChain {
    fn address(&self) -> Address {
        self.address
    }

    async fn native_balance(&self) -> Result<U256> {
        Ok(self.state.lock().unwrap().native)
    }

    async fn token_balance(&self, token: Address) -> Result<U256> {
        let state = self.state.lock().unwrap();
        state
            .tokens
            .get(&token)
            .map(|(balance, _)| *balance)
            .ok_or_else(|| anyhow!("call reverted: unknown token"))
    }

    async fn token_decimals(&self, token: Address) -> Result<u8> {
        let state = self.state.lock().unwrap();
        state
            .tokens
            .get(&token)
            .map(|(_, decimals)| *decimals)
            .ok_or_else(|| anyhow!("call reverted: unknown token"))
    }

    async fn allowance(&self, token: Address, spender: Address) -> Result<U256> {
        let state = self.state.lock().unwrap();
        Ok(state
            .allowances
            .get(&(token, spender))
            .copied()
            .unwrap_or_default())
    }

    async fn pending_nonce(&self) -> Result<U256> {
        let mut state = self.state.lock().unwrap();
        state.nonce_fetches += 1;
        Ok(state.pending_nonce)
    }

    async fn estimate_gas(&self, _tx: &TxRequest) -> Result<u64> {
        self.state
            .lock()
            .unwrap()
            .gas_estimate
            .ok_or_else(|| anyhow!("execution reverted"))
    }

    async fn send_transaction(&self, tx: TxRequest, nonce: U256) -> Result<H256> {
        let mut state = self.state.lock().unwrap();
        let step = state.script.pop_front().unwrap_or(Scripted::Success);
        let outcome = match step {
            Scripted::SendError(msg) => return Err(anyhow!(msg)),
            Scripted::Success => Ok(true),
            Scripted::Revert => Ok(false),
            Scripted::ReceiptError(msg) => Err(msg),
        };
        state.sent.push((tx, nonce));
        let hash = H256::from_low_u64_be(state.sent.len() as u64);
        state.receipts.insert(hash, outcome);
        Ok(hash)
    }

    async fn wait_for_receipt(&self, hash: H256) -> Result<TxReceipt> {
        let state = self.state.lock().unwrap();
        match state.receipts.get(&hash) {
            Some(Ok(success)) => Ok(TxReceipt {
                hash,
                success: *success,
            }),
            Some(Err(msg)) => Err(anyhow!(msg.clone())),
            None => Err(anyhow!("unknown transaction {:?}", hash)),
        }
    }
}

/// Hands out the given chains in order, one per `connect` call. Slots marked
/// unavailable fail to connect.
pub struct MockConnector {
    slots: Vec<Option<Arc<MockChain>>>,
    next: AtomicUsize,
}

impl MockConnector {
    pub fn new(chains: Vec<Arc<MockChain>>) -> Self {
        Self {
            slots: chains.into_iter().map(Some).collect(),
            next: AtomicUsize::new(0),
        }
    }

    /// Inserts a failing slot at `slot`, shifting later chains back.
    pub fn with_unavailable(mut self, slot: usize) -> Self {
        let at = slot.min(self.slots.len());
        self.slots.insert(at, None);
        self
    }

    pub fn connections(&self) -> usize {
        self.next.load(Ordering::SeqCst)
    }
}

impl WalletConnector for MockConnector {
    fn connect(&self, _key: &WalletKey) -> Result<Arc<dyn ChainClient>> {
        let idx = self.next.fetch_add(1, Ordering::SeqCst);
        match self.slots.get(idx) {
            Some(Some(chain)) => Ok(chain.clone()),
            Some(None) => Err(anyhow!("wallet #{} is unavailable", idx)),
            None => Err(anyhow!("no chain scripted for wallet #{}", idx)),
        }
    }
}

pub struct MockQuotes {
    response: Result<SwapQuote, String>,
    requests: Mutex<Vec<QuoteRequest>>,
}

impl MockQuotes {
    pub fn ok(quote: SwapQuote) -> Self {
        Self {
            response: Ok(quote),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn rejected(message: &str) -> Self {
        Self {
            response: Err(message.to_string()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<QuoteRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl QuoteSource for MockQuotes {
    async fn quote(&self, request: &QuoteRequest) -> Result<SwapQuote> {
        self.requests.lock().unwrap().push(request.clone());
        self.response.clone().map_err(|msg| anyhow!(msg))
    }
}

pub fn sample_quote(value: u64) -> SwapQuote {
    SwapQuote {
        out_amount: U256::from(1_234_567u64),
        to: Address::repeat_byte(0x77),
        data: Bytes::from(vec![0xde, 0xad, 0xbe, 0xef]),
        value: U256::from(value),
    }
}

pub struct StaticLeaderboard(pub Option<LeaderboardEntry>);

#[async_trait]
impl LeaderboardSource for StaticLeaderboard {
    async fn fetch(&self, _address: Address) -> Result<LeaderboardEntry> {
        self.0
            .clone()
            .ok_or_else(|| anyhow!("Invalid leaderboard response"))
    }
}

pub const TEST_KEY: &str = "4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318";

pub fn test_keys(count: usize) -> Vec<WalletKey> {
    (0..count)
        .map(|i| WalletKey::parse(TEST_KEY, i + 1).unwrap())
        .collect()
}
