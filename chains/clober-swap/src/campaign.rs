//! Campaign runner: N swaps per wallet over the whole key list.
//!
//! Wallets run strictly one after another. Randomized pauses separate swaps of
//! one wallet and consecutive wallets; every pause and every loop boundary
//! observes the cancellation token.

use crate::chain::{ChainClient, WalletConnector};
use crate::status::StatusReporter;
use crate::swap::SwapContext;
use core_logic::{
    cancellable_sleep, format_delay, MetricsCollector, PacingConfig, Task, TaskResult, WalletKey,
};
use std::sync::{Arc, RwLock};
use std::time::Instant;
use tokio_util::sync::CancellationToken;

/// The wallet currently bound to the sequencer and the wallet panel.
#[derive(Clone, Default)]
pub struct WalletSession {
    active: Arc<RwLock<Option<Arc<dyn ChainClient>>>>,
}

impl WalletSession {
    pub fn activate(&self, chain: Arc<dyn ChainClient>) {
        *self.active.write().unwrap_or_else(|e| e.into_inner()) = Some(chain);
    }

    pub fn current(&self) -> Option<Arc<dyn ChainClient>> {
        self.active
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CampaignReport {
    pub wallets_visited: usize,
    pub attempts: u32,
    pub successes: u32,
    pub iteration_waits: u32,
    pub wallet_waits: u32,
    pub cancelled: bool,
}

pub struct CampaignRunner {
    keys: Arc<Vec<WalletKey>>,
    connector: Arc<dyn WalletConnector>,
    base: SwapContext,
    session: WalletSession,
    reporter: Arc<StatusReporter>,
    pacing: PacingConfig,
}

impl CampaignRunner {
    pub fn new(
        keys: Vec<WalletKey>,
        connector: Arc<dyn WalletConnector>,
        base: SwapContext,
        session: WalletSession,
        reporter: Arc<StatusReporter>,
        pacing: PacingConfig,
    ) -> Self {
        Self {
            keys: Arc::new(keys),
            connector,
            base,
            session,
            reporter,
            pacing,
        }
    }

    /// Binds `chain` everywhere: session, sequencer (resets the nonce) and
    /// wallet panel.
    pub async fn activate(&self, chain: Arc<dyn ChainClient>) {
        self.session.activate(chain.clone());
        self.base.sequencer.switch_signer(chain.clone());
        self.reporter.refresh(chain.as_ref()).await;
    }

    pub async fn run(
        &self,
        task: &dyn Task<SwapContext>,
        iterations: u32,
        cancel: CancellationToken,
    ) -> CampaignReport {
        let log = &self.base.log;
        let label = task.name().to_string();
        let mut report = CampaignReport::default();

        log.swap(format!(
            "Auto swap {}: starting {} iterations on {} wallet(s)",
            label,
            iterations,
            self.keys.len()
        ));

        for (index, key) in self.keys.iter().enumerate() {
            if cancel.is_cancelled() {
                report.cancelled = true;
                break;
            }

            let chain = match self.connector.connect(key) {
                Ok(chain) => chain,
                Err(e) => {
                    log.error(format!("Wallet #{} unavailable: {:#}", index + 1, e));
                    continue;
                }
            };

            // Pause only between wallets that actually run.
            if report.wallets_visited > 0 {
                let delay = self.pacing.wallet.sample();
                log.system(format!(
                    "Preparing next wallet. Waiting {}.",
                    format_delay(delay)
                ));
                report.wallet_waits += 1;
                if !cancellable_sleep(&cancel, delay).await {
                    log.swap("Stopped during waiting period");
                    report.cancelled = true;
                    break;
                }
            }
            report.wallets_visited += 1;
            self.activate(chain.clone()).await;
            let ctx = self.base.with_chain(chain.clone());

            for i in 1..=iterations {
                if cancel.is_cancelled() {
                    log.swap(format!("Auto swap {} stopped at cycle {}", label, i));
                    report.cancelled = true;
                    break;
                }

                log.swap(format!("Starting swap #{}", i));
                let started = Instant::now();
                let result = match task.run(ctx.clone()).await {
                    Ok(result) => result,
                    Err(e) => TaskResult::failed(format!("{:#}", e)),
                };
                MetricsCollector::global().record_swap(&label, started.elapsed(), result.success);

                report.attempts += 1;
                if result.success {
                    report.successes += 1;
                    self.reporter.refresh(chain.as_ref()).await;
                }

                if i < iterations {
                    let delay = self.pacing.iteration.sample();
                    log.swap(format!(
                        "Swap #{} done. Waiting {}.",
                        i,
                        format_delay(delay)
                    ));
                    report.iteration_waits += 1;
                    if !cancellable_sleep(&cancel, delay).await {
                        log.swap("Stopped during waiting period");
                        report.cancelled = true;
                        break;
                    }
                }
            }

            if report.cancelled {
                break;
            }
        }

        log.swap(format!(
            "Auto swap {} finished: {}/{} successful",
            label, report.successes, report.attempts
        ));
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ContractBook;
    use crate::dashboard::ActivityLog;
    use crate::pairs::{PairCatalog, PairId, RangeBook};
    use crate::sequencer::TxSequencer;
    use crate::swap::{PairSwapTask, SwapDriver, SwapSettings};
    use crate::testing::{test_keys, MockChain, MockConnector, MockQuotes, StaticLeaderboard};
    use core_logic::{DelayRange, GasPolicy};
    use ethers::types::{Address, U256};
    use std::time::Duration;

    const WMON: u8 = 0x01;
    const VENUE: u8 = 0x05;

    fn contracts() -> ContractBook {
        ContractBook {
            wmon: Address::repeat_byte(WMON),
            usdc: Address::repeat_byte(0x02),
            smon: Address::repeat_byte(0x03),
            dak: Address::repeat_byte(0x04),
            wmon_swap: Address::repeat_byte(VENUE),
            router: Address::repeat_byte(0x06),
        }
    }

    fn wallet(byte: u8, nonce: u64) -> Arc<MockChain> {
        Arc::new(
            MockChain::new()
                .with_address(Address::repeat_byte(byte))
                .with_native(U256::exp10(21))
                .with_token(Address::repeat_byte(WMON), U256::exp10(21), 18)
                .with_allowance(Address::repeat_byte(WMON), Address::repeat_byte(VENUE), U256::MAX)
                .with_pending_nonce(nonce),
        )
    }

    fn fast_pacing() -> PacingConfig {
        PacingConfig {
            iteration: DelayRange::new(1, 2),
            wallet: DelayRange::new(1, 2),
        }
    }

    fn runner(chains: Vec<Arc<MockChain>>, pacing: PacingConfig) -> (CampaignRunner, PairSwapTask) {
        let count = chains.len();
        let first = chains[0].clone();
        runner_with(Arc::new(MockConnector::new(chains)), count, first, pacing)
    }

    fn runner_with(
        connector: Arc<MockConnector>,
        key_count: usize,
        first: Arc<MockChain>,
        pacing: PacingConfig,
    ) -> (CampaignRunner, PairSwapTask) {
        let log = ActivityLog::detached();
        let (sequencer, _worker) = TxSequencer::spawn(log.clone());
        let reporter = Arc::new(StatusReporter::new(
            &contracts(),
            Arc::new(StaticLeaderboard(None)),
            "CLOBER TESTNET".to_string(),
            log.clone(),
        ));
        let base = SwapContext {
            chain: first,
            sequencer,
            quotes: Arc::new(MockQuotes::rejected("unused")),
            log,
            settings: Arc::new(SwapSettings {
                gas: GasPolicy::default(),
                slippage_bps: 100,
                gas_price_hint: "52000000000".to_string(),
                referrer: Address::zero(),
                quote_throttle: Duration::ZERO,
            }),
        };
        let runner = CampaignRunner::new(
            test_keys(key_count),
            connector,
            base,
            WalletSession::default(),
            reporter,
            pacing,
        );
        let driver = Arc::new(SwapDriver::new(
            PairCatalog::new(&contracts()),
            Arc::new(RangeBook::default()),
        ));
        (runner, PairSwapTask::new(PairId::MonWmon, driver))
    }

    #[tokio::test]
    async fn test_single_wallet_three_iterations() {
        let chain = wallet(0xa1, 0);
        let (runner, task) = runner(vec![chain.clone()], fast_pacing());

        let report = runner.run(&task, 3, CancellationToken::new()).await;

        assert_eq!(
            report,
            CampaignReport {
                wallets_visited: 1,
                attempts: 3,
                successes: 3,
                iteration_waits: 2,
                wallet_waits: 0,
                cancelled: false,
            }
        );
        assert_eq!(chain.sent_nonces(), vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn test_wallets_run_in_order_with_fresh_nonces() {
        let first = wallet(0xa1, 5);
        let second = wallet(0xb2, 40);
        let (runner, task) = runner(vec![first.clone(), second.clone()], fast_pacing());

        let report = runner.run(&task, 2, CancellationToken::new()).await;

        assert_eq!(report.wallets_visited, 2);
        assert_eq!(report.attempts, 4);
        assert_eq!(report.iteration_waits, 2);
        assert_eq!(report.wallet_waits, 1);
        assert_eq!(first.sent_nonces(), vec![5, 6]);
        assert_eq!(second.sent_nonces(), vec![40, 41]);
        assert_eq!(second.nonce_fetches(), 1);

        let active = runner.session.current().unwrap();
        assert_eq!(active.address(), Address::repeat_byte(0xb2));
    }

    #[tokio::test]
    async fn test_unavailable_wallets_cost_no_wait() {
        let first = wallet(0xa1, 0);
        let third = wallet(0xc3, 7);
        let connector = Arc::new(
            MockConnector::new(vec![first.clone(), third.clone()]).with_unavailable(1),
        );
        let (runner, task) = runner_with(connector.clone(), 3, first.clone(), fast_pacing());

        let report = runner.run(&task, 1, CancellationToken::new()).await;

        assert_eq!(connector.connections(), 3);
        assert_eq!(report.wallets_visited, 2);
        assert_eq!(report.wallet_waits, 1);
        assert_eq!(first.sent_nonces(), vec![0]);
        assert_eq!(third.sent_nonces(), vec![7]);
    }

    #[tokio::test]
    async fn test_unavailable_last_wallet_is_not_waited_for() {
        let first = wallet(0xa1, 0);
        let connector = Arc::new(MockConnector::new(vec![first.clone()]).with_unavailable(1));
        let slow_wallets = PacingConfig {
            iteration: DelayRange::new(1, 2),
            wallet: DelayRange::new(60_000, 60_000),
        };
        let (runner, task) = runner_with(connector.clone(), 2, first.clone(), slow_wallets);

        let report = tokio::time::timeout(
            Duration::from_secs(5),
            runner.run(&task, 1, CancellationToken::new()),
        )
        .await
        .expect("campaign waited for a wallet that never connected");

        assert_eq!(connector.connections(), 2);
        assert_eq!(report.wallets_visited, 1);
        assert_eq!(report.wallet_waits, 0);
        assert!(!report.cancelled);
    }

    #[tokio::test]
    async fn test_cancel_during_wait_stops_promptly() {
        let first = wallet(0xa1, 0);
        let second = wallet(0xb2, 0);
        let slow = PacingConfig {
            iteration: DelayRange::new(60_000, 60_000),
            wallet: DelayRange::new(60_000, 60_000),
        };
        let (runner, task) = runner(vec![first.clone(), second.clone()], slow);

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let report = tokio::time::timeout(Duration::from_secs(5), runner.run(&task, 3, cancel))
            .await
            .expect("campaign did not stop after cancellation");

        assert!(report.cancelled);
        assert_eq!(report.attempts, 1);
        assert_eq!(report.wallets_visited, 1);
        assert_eq!(report.wallet_waits, 0);
        assert!(second.sent().is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_before_start_does_nothing() {
        let chain = wallet(0xa1, 0);
        let (runner, task) = runner(vec![chain.clone()], fast_pacing());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let report = runner.run(&task, 5, cancel).await;
        assert!(report.cancelled);
        assert_eq!(report.attempts, 0);
        assert!(chain.sent().is_empty());
    }
}
