//! Swap protocol driver.
//!
//! One call to [`SwapDriver::swap`] runs a single leg of a pair:
//! direction toggle, amount draw, balance check, quote (routed pairs),
//! approval (token legs) and execution, each transaction going through the
//! sequencer. Every failure ends the attempt with a `TaskResult` and one log
//! line; nothing is retried.

use crate::chain::{short_hex, ChainClient, TxRequest};
use crate::contracts::{ApproveCall, DepositCall, SwapCall, WithdrawCall};
use crate::dashboard::{ActivityLog, LogKind};
use crate::oracle::{format_amount, BalanceOracle, NATIVE_DECIMALS};
use crate::pairs::{
    DirectionBook, ExecutionMode, Leg, PairCatalog, PairDescriptor, PairId, RangeBook,
    NATIVE_SYMBOL,
};
use crate::quote::{QuoteRequest, QuoteSource, SwapQuote, NATIVE_TOKEN};
use crate::sequencer::{TxOutcome, TxSequencer};
use anyhow::Result;
use async_trait::async_trait;
use core_logic::{GasPolicy, Task, TaskResult};
use ethers::abi::AbiEncode;
use ethers::types::{Address, U256};
use ethers::utils::parse_units;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SwapError {
    #[error("Insufficient {symbol} balance: {available} < {required}")]
    InsufficientBalance {
        symbol: String,
        available: String,
        required: String,
    },

    #[error("Failed to fetch swap data: {0}")]
    Quote(String),

    #[error("Approval failed for {symbol}, swap cancelled: {reason}")]
    ApprovalFailed { symbol: String, reason: String },

    #[error("{description} failed: {reason}")]
    ExecutionFailed { description: String, reason: String },

    #[error(transparent)]
    Chain(#[from] anyhow::Error),
}

impl SwapError {
    pub fn kind(&self) -> LogKind {
        match self {
            SwapError::InsufficientBalance { .. } => LogKind::Warning,
            _ => LogKind::Error,
        }
    }
}

/// Knobs shared by every swap.
#[derive(Debug, Clone)]
pub struct SwapSettings {
    pub gas: GasPolicy,
    pub slippage_bps: u32,
    pub gas_price_hint: String,
    pub referrer: Address,
    /// Pause before every aggregator call.
    pub quote_throttle: Duration,
}

/// Everything a swap needs from the outside, bound to one wallet.
#[derive(Clone)]
pub struct SwapContext {
    pub chain: Arc<dyn ChainClient>,
    pub sequencer: TxSequencer,
    pub quotes: Arc<dyn QuoteSource>,
    pub log: ActivityLog,
    pub settings: Arc<SwapSettings>,
}

impl SwapContext {
    pub fn with_chain(&self, chain: Arc<dyn ChainClient>) -> Self {
        Self {
            chain,
            ..self.clone()
        }
    }
}

pub struct SwapDriver {
    catalog: PairCatalog,
    ranges: Arc<RangeBook>,
    directions: DirectionBook,
}

impl SwapDriver {
    pub fn new(catalog: PairCatalog, ranges: Arc<RangeBook>) -> Self {
        Self {
            catalog,
            ranges,
            directions: DirectionBook::default(),
        }
    }

    pub fn ranges(&self) -> &Arc<RangeBook> {
        &self.ranges
    }

    pub fn directions(&self) -> &DirectionBook {
        &self.directions
    }

    /// Runs the next leg of `pair`. The direction flips even when the attempt
    /// fails.
    pub async fn swap(&self, pair: PairId, ctx: &SwapContext) -> TaskResult {
        let leg = self.directions.advance(pair);
        let desc = self.catalog.get(pair);

        match self.execute(desc, leg, ctx).await {
            Ok(result) => result,
            Err(e) => {
                let message = e.to_string();
                ctx.log.emit(e.kind(), message.clone());
                TaskResult::failed(message)
            }
        }
    }

    async fn execute(
        &self,
        desc: &PairDescriptor,
        leg: Leg,
        ctx: &SwapContext,
    ) -> Result<TaskResult, SwapError> {
        let oracle = BalanceOracle::new(ctx.chain.as_ref());
        let symbol = desc.symbol();
        let (in_symbol, out_symbol) = match leg {
            Leg::NativeToToken => (NATIVE_SYMBOL, symbol),
            Leg::TokenToNative => (symbol, NATIVE_SYMBOL),
        };

        let token_decimals = oracle.decimals(desc.token).await?;
        let in_decimals = match (desc.mode, leg) {
            (ExecutionMode::Wrap { .. }, _) => token_decimals,
            (ExecutionMode::Routed { .. }, Leg::NativeToToken) => NATIVE_DECIMALS,
            (ExecutionMode::Routed { .. }, Leg::TokenToNative) => token_decimals,
        };
        let out_decimals = match leg {
            Leg::NativeToToken => token_decimals,
            Leg::TokenToNative => NATIVE_DECIMALS,
        };

        let range = self.ranges.get(desc.id, leg.input()).ok_or_else(|| {
            SwapError::Chain(anyhow::anyhow!("No amount range for {} {}", desc.id, in_symbol))
        })?;
        let amount_text = range.sample_amount();
        let amount: U256 = parse_units(&amount_text, in_decimals as u32)
            .map_err(|e| SwapError::Chain(anyhow::anyhow!("Invalid amount {}: {}", amount_text, e)))?
            .into();

        let balance = match leg {
            Leg::NativeToToken => oracle.native_balance().await?,
            Leg::TokenToNative => oracle.token_balance(desc.token).await?,
        };
        if balance < amount {
            return Err(SwapError::InsufficientBalance {
                symbol: in_symbol.to_string(),
                available: format_amount(balance, in_decimals),
                required: amount_text,
            });
        }

        ctx.log.swap(format!(
            "Swapping {} {} -> {}",
            amount_text, in_symbol, out_symbol
        ));

        let quote = if desc.is_routed() {
            let quote = self.quote(desc, leg, &amount_text, ctx).await?;
            ctx.log.debug(format!(
                "Quote: {} {} for {} {}",
                format_amount(quote.out_amount, out_decimals),
                out_symbol,
                amount_text,
                in_symbol
            ));
            Some(quote)
        } else {
            None
        };

        if leg == Leg::TokenToNative {
            self.ensure_allowance(desc, amount, &amount_text, ctx).await?;
        }

        let fallback = desc.gas.for_leg(leg);
        let tx = build_execution(desc, leg, amount, quote.as_ref())?;
        let gas = gas_limit(ctx, &tx, fallback).await;

        let description = format!("Swap {} {} to {}", amount_text, in_symbol, out_symbol);
        let outcome = ctx
            .sequencer
            .submit(description.clone(), tx.with_gas(gas))
            .outcome()
            .await;

        let received = match &quote {
            Some(q) => format_amount(q.out_amount, out_decimals),
            None => amount_text.clone(),
        };
        match outcome {
            TxOutcome::Completed(receipt) => {
                let message = format!(
                    "Swap successful {} {} -> {} {}, hash: {}",
                    amount_text,
                    in_symbol,
                    received,
                    out_symbol,
                    short_hex(receipt.hash)
                );
                ctx.log.success(message.clone());
                Ok(TaskResult::ok(message, Some(format!("{:?}", receipt.hash))))
            }
            other => Err(SwapError::ExecutionFailed {
                description,
                reason: other.to_string(),
            }),
        }
    }

    async fn quote(
        &self,
        desc: &PairDescriptor,
        leg: Leg,
        amount_text: &str,
        ctx: &SwapContext,
    ) -> Result<SwapQuote, SwapError> {
        let (in_token, out_token) = match leg {
            Leg::NativeToToken => (NATIVE_TOKEN, desc.token),
            Leg::TokenToNative => (desc.token, NATIVE_TOKEN),
        };
        let request = QuoteRequest {
            in_token,
            out_token,
            amount: amount_text.to_string(),
            gas_price: ctx.settings.gas_price_hint.clone(),
            slippage_bps: ctx.settings.slippage_bps,
            account: ctx.chain.address(),
            referrer: ctx.settings.referrer,
        };

        if !ctx.settings.quote_throttle.is_zero() {
            tokio::time::sleep(ctx.settings.quote_throttle).await;
        }
        ctx.quotes
            .quote(&request)
            .await
            .map_err(|e| SwapError::Quote(format!("{:#}", e)))
    }

    /// Approves exactly `amount` when the current allowance is short. The swap
    /// only proceeds once the approval has completed.
    async fn ensure_allowance(
        &self,
        desc: &PairDescriptor,
        amount: U256,
        amount_text: &str,
        ctx: &SwapContext,
    ) -> Result<(), SwapError> {
        let spender = desc.spender();
        let allowance = BalanceOracle::new(ctx.chain.as_ref())
            .allowance(desc.token, spender)
            .await?;
        if allowance >= amount {
            return Ok(());
        }

        let symbol = desc.symbol();
        ctx.log
            .swap(format!("Requesting approval for {} {}", amount_text, symbol));

        let calldata = ApproveCall { spender, amount }.encode();
        let tx = TxRequest::new(desc.token, calldata);
        let gas = gas_limit(ctx, &tx, desc.gas.approve).await;

        let outcome = ctx
            .sequencer
            .submit(format!("Approve {} {}", amount_text, symbol), tx.with_gas(gas))
            .outcome()
            .await;

        if !outcome.is_completed() {
            return Err(SwapError::ApprovalFailed {
                symbol: symbol.to_string(),
                reason: outcome.to_string(),
            });
        }
        ctx.log
            .swap(format!("Approval successful for {} {}", amount_text, symbol));
        Ok(())
    }
}

fn build_execution(
    desc: &PairDescriptor,
    leg: Leg,
    amount: U256,
    quote: Option<&SwapQuote>,
) -> Result<TxRequest, SwapError> {
    match desc.mode {
        ExecutionMode::Wrap { venue } => Ok(match leg {
            Leg::NativeToToken => TxRequest::new(venue, DepositCall.encode()).with_value(amount),
            Leg::TokenToNative => TxRequest::new(venue, WithdrawCall { wad: amount }.encode()),
        }),
        ExecutionMode::Routed { router } => {
            let quote =
                quote.ok_or_else(|| SwapError::Quote("no quote for routed swap".to_string()))?;
            let (in_token, out_token, value) = match leg {
                Leg::NativeToToken => (NATIVE_TOKEN, desc.token, amount),
                Leg::TokenToNative => (desc.token, NATIVE_TOKEN, quote.value),
            };
            let call = SwapCall {
                in_token,
                out_token,
                in_amount: amount,
                recipient: quote.to,
                data: quote.data.clone(),
            };
            Ok(TxRequest::new(router, call.encode()).with_value(value))
        }
    }
}

/// Margined estimate, or the fallback limit when the node cannot estimate.
async fn gas_limit(ctx: &SwapContext, tx: &TxRequest, fallback: u64) -> u64 {
    let estimate = ctx.chain.estimate_gas(tx).await;
    if let Err(e) = &estimate {
        ctx.log.debug(format!(
            "Gas estimation failed: {:#}. Using default {}",
            e, fallback
        ));
    }
    let limit = ctx.settings.gas.limit_or(estimate, fallback);
    ctx.log.debug(format!("Gas limit: {}", limit));
    limit
}

/// Campaign task running one leg of a fixed pair per call.
pub struct PairSwapTask {
    pair: PairId,
    driver: Arc<SwapDriver>,
    name: String,
}

impl PairSwapTask {
    pub fn new(pair: PairId, driver: Arc<SwapDriver>) -> Self {
        Self {
            pair,
            driver,
            name: pair.to_string(),
        }
    }
}

#[async_trait]
impl Task<SwapContext> for PairSwapTask {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, ctx: SwapContext) -> Result<TaskResult> {
        Ok(self.driver.swap(self.pair, &ctx).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ContractBook;
    use crate::testing::{sample_quote, MockChain, MockQuotes, Scripted};
    use ethers::abi::AbiDecode;

    const WMON: u8 = 0x01;
    const USDC: u8 = 0x02;
    const VENUE: u8 = 0x05;
    const ROUTER: u8 = 0x06;

    fn contracts() -> ContractBook {
        ContractBook {
            wmon: Address::repeat_byte(WMON),
            usdc: Address::repeat_byte(USDC),
            smon: Address::repeat_byte(0x03),
            dak: Address::repeat_byte(0x04),
            wmon_swap: Address::repeat_byte(VENUE),
            router: Address::repeat_byte(ROUTER),
        }
    }

    fn driver() -> SwapDriver {
        SwapDriver::new(PairCatalog::new(&contracts()), Arc::new(RangeBook::default()))
    }

    fn context(chain: Arc<MockChain>, quotes: Arc<MockQuotes>) -> SwapContext {
        let (sequencer, _worker) = TxSequencer::spawn(ActivityLog::detached());
        sequencer.switch_signer(chain.clone());
        SwapContext {
            chain,
            sequencer,
            quotes,
            log: ActivityLog::detached(),
            settings: Arc::new(SwapSettings {
                gas: GasPolicy::default(),
                slippage_bps: 100,
                gas_price_hint: "52000000000".to_string(),
                referrer: Address::repeat_byte(0x33),
                quote_throttle: Duration::ZERO,
            }),
        }
    }

    fn rich_chain() -> MockChain {
        MockChain::new()
            .with_native(U256::exp10(21))
            .with_token(Address::repeat_byte(WMON), U256::exp10(21), 18)
            .with_token(Address::repeat_byte(USDC), U256::from(10_000_000_000u64), 6)
            .with_pending_nonce(9)
    }

    #[tokio::test]
    async fn test_wrap_pair_alternates_and_sequences_nonces() {
        let chain = Arc::new(rich_chain().with_allowance(
            Address::repeat_byte(WMON),
            Address::repeat_byte(VENUE),
            U256::MAX,
        ));
        let ctx = context(chain.clone(), Arc::new(MockQuotes::rejected("unused")));
        let driver = driver();

        for _ in 0..3 {
            assert!(driver.swap(PairId::MonWmon, &ctx).await.success);
        }

        let sent = chain.sent();
        assert_eq!(chain.sent_nonces(), vec![9, 10, 11]);
        assert!(sent.iter().all(|(tx, _)| tx.to == Address::repeat_byte(VENUE)));
        // deposit, withdraw, deposit
        assert!(!sent[0].0.value.is_zero());
        assert!(sent[1].0.value.is_zero());
        assert!(!sent[2].0.value.is_zero());
        assert_eq!(&sent[0].0.data[..4], &[0xd0, 0xe3, 0x0d, 0xb0]);
        assert_eq!(&sent[1].0.data[..4], &[0x2e, 0x1a, 0x7d, 0x4d]);
    }

    #[tokio::test]
    async fn test_alternation_survives_failures() {
        // No native balance: the first (native) leg fails before anything is sent.
        let chain = Arc::new(
            MockChain::new()
                .with_token(Address::repeat_byte(WMON), U256::exp10(21), 18)
                .with_allowance(Address::repeat_byte(WMON), Address::repeat_byte(VENUE), U256::MAX),
        );
        let ctx = context(chain.clone(), Arc::new(MockQuotes::rejected("unused")));
        let driver = driver();

        let first = driver.swap(PairId::MonWmon, &ctx).await;
        assert!(!first.success);
        assert!(first.message.contains("Insufficient MON balance"));
        assert!(chain.sent().is_empty());

        let second = driver.swap(PairId::MonWmon, &ctx).await;
        assert!(second.success);
        assert_eq!(chain.sent().len(), 1);
        assert!(chain.sent()[0].0.value.is_zero());

        assert_eq!(driver.directions().peek(PairId::MonWmon), Leg::NativeToToken);
    }

    #[tokio::test]
    async fn test_rejected_quote_sends_nothing_but_toggles() {
        let chain = Arc::new(rich_chain());
        let quotes = Arc::new(MockQuotes::rejected("Quote rejected (code 500): no route"));
        let ctx = context(chain.clone(), quotes.clone());
        let driver = driver();

        let result = driver.swap(PairId::MonUsdc, &ctx).await;
        assert!(!result.success);
        assert!(result.message.contains("no route"));
        assert!(chain.sent().is_empty());
        assert_eq!(quotes.requests().len(), 1);
        assert_eq!(driver.directions().peek(PairId::MonUsdc), Leg::TokenToNative);
    }

    #[tokio::test]
    async fn test_short_token_balance_skips_quote_and_send() {
        let chain = Arc::new(
            MockChain::new()
                .with_native(U256::exp10(21))
                .with_token(Address::repeat_byte(USDC), U256::from(1_000u64), 6)
                .with_pending_nonce(9),
        );
        let quotes = Arc::new(MockQuotes::ok(sample_quote(0)));
        let ctx = context(chain.clone(), quotes.clone());
        let driver = driver();
        driver.directions().advance(PairId::MonUsdc);

        let result = driver.swap(PairId::MonUsdc, &ctx).await;

        assert!(!result.success);
        assert!(result.message.contains("Insufficient USDC balance"));
        assert!(quotes.requests().is_empty());
        assert!(chain.sent().is_empty());
        assert!(ctx.sequencer.queue().is_empty());
        assert_eq!(driver.directions().peek(PairId::MonUsdc), Leg::NativeToToken);
    }

    #[tokio::test]
    async fn test_routed_native_leg_uses_quote_and_amount_value() {
        let chain = Arc::new(rich_chain().with_gas_estimate(Some(100_000)));
        let quotes = Arc::new(MockQuotes::ok(sample_quote(0)));
        let ctx = context(chain.clone(), quotes.clone());

        let result = driver().swap(PairId::MonUsdc, &ctx).await;
        assert!(result.success, "{}", result.message);

        let request = &quotes.requests()[0];
        assert_eq!(request.in_token, NATIVE_TOKEN);
        assert_eq!(request.out_token, Address::repeat_byte(USDC));
        assert_eq!(request.amount.split_once('.').unwrap().1.len(), 6);

        let (tx, nonce) = &chain.sent()[0];
        assert_eq!(*nonce, U256::from(9));
        assert_eq!(tx.to, Address::repeat_byte(ROUTER));
        assert_eq!(tx.gas, Some(120_000));
        let expected: U256 = parse_units(&request.amount, 18u32).unwrap().into();
        assert_eq!(tx.value, expected);

        let call = SwapCall::decode(tx.data.as_ref()).unwrap();
        assert_eq!(call.in_token, NATIVE_TOKEN);
        assert_eq!(call.in_amount, expected);
        assert_eq!(call.recipient, Address::repeat_byte(0x77));
        assert_eq!(call.data.as_ref(), &[0xde, 0xad, 0xbe, 0xef]);
    }

    #[tokio::test]
    async fn test_token_leg_approves_before_swap() {
        let chain = Arc::new(rich_chain());
        let quotes = Arc::new(MockQuotes::ok(sample_quote(0)));
        let ctx = context(chain.clone(), quotes);
        let driver = driver();
        driver.directions().advance(PairId::MonUsdc);

        let result = driver.swap(PairId::MonUsdc, &ctx).await;
        assert!(result.success, "{}", result.message);

        let sent = chain.sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].0.to, Address::repeat_byte(USDC));
        assert_eq!(sent[0].0.gas, Some(100_000));
        assert_eq!(sent[1].0.to, Address::repeat_byte(ROUTER));
        assert_eq!(sent[1].0.gas, Some(50_000));
        assert_eq!(chain.sent_nonces(), vec![9, 10]);

        let approve = ApproveCall::decode(sent[0].0.data.as_ref()).unwrap();
        assert_eq!(approve.spender, Address::repeat_byte(ROUTER));
        let call = SwapCall::decode(sent[1].0.data.as_ref()).unwrap();
        assert_eq!(call.in_token, Address::repeat_byte(USDC));
        assert_eq!(call.out_token, NATIVE_TOKEN);
        assert_eq!(call.in_amount, approve.amount);
    }

    #[tokio::test]
    async fn test_failed_approval_skips_swap() {
        let chain = Arc::new(rich_chain().with_script(vec![Scripted::Revert]));
        let quotes = Arc::new(MockQuotes::ok(sample_quote(0)));
        let ctx = context(chain.clone(), quotes);
        let driver = driver();
        driver.directions().advance(PairId::MonUsdc);

        let result = driver.swap(PairId::MonUsdc, &ctx).await;
        assert!(!result.success);
        assert!(result.message.contains("Approval failed for USDC"));
        assert_eq!(chain.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_routed_token_leg_uses_quote_value() {
        let chain = Arc::new(rich_chain().with_allowance(
            Address::repeat_byte(USDC),
            Address::repeat_byte(ROUTER),
            U256::MAX,
        ));
        let quotes = Arc::new(MockQuotes::ok(sample_quote(123)));
        let ctx = context(chain.clone(), quotes);
        let driver = driver();
        driver.directions().advance(PairId::MonUsdc);

        assert!(driver.swap(PairId::MonUsdc, &ctx).await.success);
        let sent = chain.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0.value, U256::from(123));
    }

    #[tokio::test]
    async fn test_reverted_swap_is_a_failure() {
        let chain = Arc::new(rich_chain().with_script(vec![Scripted::Revert]));
        let ctx = context(chain.clone(), Arc::new(MockQuotes::ok(sample_quote(0))));

        let result = driver().swap(PairId::MonDak, &ctx).await;
        // DAK is not in the mock chain: decimals read fails before sending.
        assert!(!result.success);
        assert!(chain.sent().is_empty());

        let result = driver().swap(PairId::MonUsdc, &ctx).await;
        assert!(!result.success);
        assert!(result.message.contains("reverted"));
        assert_eq!(chain.sent().len(), 1);
    }
}
