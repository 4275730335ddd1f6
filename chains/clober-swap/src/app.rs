//! Command surface used by the console and headless mode.

use crate::campaign::{CampaignReport, CampaignRunner, WalletSession};
use crate::dashboard::ActivityLog;
use crate::pairs::{Asset, PairId};
use crate::sequencer::{QueuedTx, TxSequencer};
use crate::status::{StatusReporter, WalletSnapshot};
use crate::swap::{PairSwapTask, SwapDriver};
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

struct ActiveCampaign {
    pair: PairId,
    cancel: CancellationToken,
    /// Fired by the campaign task when it returns.
    done: CancellationToken,
    /// Taken by whoever joins the campaign.
    handle: Option<JoinHandle<CampaignReport>>,
}

impl ActiveCampaign {
    fn is_running(&self) -> bool {
        !self.done.is_cancelled()
    }
}

pub struct Controller {
    runner: Arc<CampaignRunner>,
    driver: Arc<SwapDriver>,
    session: WalletSession,
    reporter: Arc<StatusReporter>,
    sequencer: TxSequencer,
    log: ActivityLog,
    active: Mutex<Option<ActiveCampaign>>,
}

impl Controller {
    pub fn new(
        runner: Arc<CampaignRunner>,
        driver: Arc<SwapDriver>,
        session: WalletSession,
        reporter: Arc<StatusReporter>,
        sequencer: TxSequencer,
        log: ActivityLog,
    ) -> Self {
        Self {
            runner,
            driver,
            session,
            reporter,
            sequencer,
            log,
            active: Mutex::new(None),
        }
    }

    fn active(&self) -> std::sync::MutexGuard<'_, Option<ActiveCampaign>> {
        self.active.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn running_pair(&self) -> Option<PairId> {
        self.active()
            .as_ref()
            .filter(|c| c.is_running())
            .map(|c| c.pair)
    }

    pub fn is_running(&self) -> bool {
        self.running_pair().is_some()
    }

    /// Starts a campaign in the background. Rejected while another one runs.
    pub fn start_campaign(&self, pair: PairId, iterations: u32) -> bool {
        if iterations == 0 {
            self.log.error("Auto swap: iteration count must be a positive number");
            return false;
        }

        let mut active = self.active();
        if let Some(current) = active.as_ref() {
            if current.is_running() {
                self.log.warning(format!(
                    "Auto swap {} is already running. Stop it first.",
                    current.pair
                ));
                return false;
            }
        }

        let cancel = CancellationToken::new();
        let runner = self.runner.clone();
        let task = PairSwapTask::new(pair, self.driver.clone());
        let token = cancel.clone();
        let done = CancellationToken::new();
        let finished = done.clone();
        let handle = tokio::spawn(async move {
            let _finished = finished.drop_guard();
            runner.run(&task, iterations, token).await
        });

        *active = Some(ActiveCampaign {
            pair,
            cancel,
            done,
            handle: Some(handle),
        });
        true
    }

    /// Requests cancellation; the campaign stops at its next check.
    pub fn stop_campaign(&self) -> bool {
        let active = self.active();
        match active.as_ref() {
            Some(current) if current.is_running() => {
                current.cancel.cancel();
                self.log
                    .swap(format!("Stopping auto swap {}", current.pair));
                true
            }
            _ => {
                self.log.warning("No auto swap is running");
                false
            }
        }
    }

    /// Waits for the current campaign, if any, and returns its report.
    /// The campaign stays stoppable while this waits.
    pub async fn join_campaign(&self) -> Option<CampaignReport> {
        let handle = self.active().as_mut()?.handle.take()?;
        match handle.await {
            Ok(report) => Some(report),
            Err(e) => {
                self.log.error(format!("Campaign task failed: {}", e));
                None
            }
        }
    }

    pub fn change_random_range(&self, pair: PairId, asset: Asset, min: f64, max: f64) -> bool {
        match self.driver.ranges().set(pair, asset, min, max) {
            Ok(()) => {
                let symbol = match asset {
                    Asset::Native => "MON",
                    Asset::Token => pair.token_symbol(),
                };
                self.log.success(format!(
                    "{} random amount for {} set to {} - {}",
                    symbol, pair, min, max
                ));
                true
            }
            Err(e) => {
                self.log.error(e.to_string());
                false
            }
        }
    }

    pub async fn refresh(&self) -> Option<WalletSnapshot> {
        match self.session.current() {
            Some(chain) => Some(self.reporter.refresh(chain.as_ref()).await),
            None => {
                self.log.warning("No active wallet to refresh");
                None
            }
        }
    }

    pub fn queue_snapshot(&self) -> Vec<QueuedTx> {
        self.sequencer.queue()
    }

    pub fn log(&self) -> &ActivityLog {
        &self.log
    }
}
