use clober_swap::app::Controller;
use clober_swap::campaign::{CampaignRunner, WalletSession};
use clober_swap::chain::{EthersConnector, WalletConnector};
use clober_swap::config::CloberConfig;
use clober_swap::console;
use clober_swap::dashboard::ActivityLog;
use clober_swap::leaderboard::CloberLeaderboard;
use clober_swap::pairs::{PairCatalog, PairId, RangeBook};
use clober_swap::quote::OpenOceanClient;
use clober_swap::sequencer::TxSequencer;
use clober_swap::status::StatusReporter;
use clober_swap::swap::{SwapContext, SwapDriver};

use anyhow::{Context, Result};
use clap::Parser;
use core_logic::{setup_logger, KeyFileLoader, MetricsCollector, WalletLoader};
use dotenv::dotenv;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, default_value = "chains/clober-swap/config.toml")]
    config: String,
    /// Run one campaign for this pair without the menu
    #[arg(short, long, value_enum)]
    pair: Option<PairId>,
    #[arg(short, long, default_value = "1")]
    iterations: u32,
    #[arg(short, long)]
    export_metrics: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    let args = Args::parse();

    let loaded = CloberConfig::load(&args.config);
    let debug = loaded.as_ref().map(|c| c.debug_mode).unwrap_or(false);
    let _log_guard = setup_logger(debug);

    let config = match loaded {
        Ok(c) => c,
        Err(e) => {
            error!("Failed to load config from {}: {:#}", args.config, e);
            return Ok(());
        }
    };
    info!("Configuration loaded for chain ID: {}", config.chain_id);

    let keys = match KeyFileLoader::new(&config.keys_file).load_wallets().await {
        Ok(keys) => keys,
        Err(e) => {
            error!("Failed to load wallets: {:#}", e);
            return Ok(());
        }
    };

    let contracts = config.contracts()?;
    let settings = config.swap_settings()?;

    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let log = ActivityLog::new(events_tx, config.debug_mode);
    log.system(format!(
        "Loaded {} wallet(s) for {}",
        keys.len(),
        config.chain().name
    ));

    let connector: Arc<dyn WalletConnector> =
        Arc::new(EthersConnector::new(&config.rpc_url, config.chain_id)?);
    let (sequencer, _worker) = TxSequencer::spawn(log.clone());
    let reporter = Arc::new(StatusReporter::new(
        &contracts,
        Arc::new(CloberLeaderboard::new(&config.leaderboard_api)?),
        config.network_name.clone(),
        log.clone(),
    ));

    let first = connector.connect(keys.first().context("No wallets loaded")?)?;
    let base = SwapContext {
        chain: first.clone(),
        sequencer: sequencer.clone(),
        quotes: Arc::new(OpenOceanClient::new(&config.openocean_api)?),
        log: log.clone(),
        settings: Arc::new(settings),
    };

    let session = WalletSession::default();
    let runner = Arc::new(CampaignRunner::new(
        keys,
        connector,
        base,
        session.clone(),
        reporter.clone(),
        config.pacing,
    ));
    runner.activate(first).await;

    let driver = Arc::new(SwapDriver::new(
        PairCatalog::new(&contracts),
        Arc::new(RangeBook::default()),
    ));
    let controller = Arc::new(Controller::new(
        runner,
        driver,
        session,
        reporter,
        sequencer,
        log.clone(),
    ));

    match args.pair {
        Some(pair) => {
            drop(events_rx);
            if controller.start_campaign(pair, args.iterations) {
                let watcher = controller.clone();
                tokio::spawn(async move {
                    if tokio::signal::ctrl_c().await.is_ok() {
                        watcher.log().warning("Ctrl+C received, stopping campaign");
                        watcher.stop_campaign();
                    }
                });
                if let Some(report) = controller.join_campaign().await {
                    log.system(format!(
                        "Campaign finished: {}/{} successful over {} wallet(s)",
                        report.successes, report.attempts, report.wallets_visited
                    ));
                }
            }
        }
        None => console::run(controller.clone(), events_rx).await?,
    }

    let pending = controller.queue_snapshot();
    if !pending.is_empty() {
        log.warning(format!(
            "Exiting with {} transaction(s) still in queue",
            pending.len()
        ));
    }

    if let Some(path) = args.export_metrics {
        match MetricsCollector::global().export_to_file(&path).await {
            Ok(()) => info!("Metrics exported to {}", path),
            Err(e) => error!("Failed to export metrics: {}", e),
        }
    }

    Ok(())
}
