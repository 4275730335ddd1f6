//! Interactive console menu.
//!
//! Prompts run on the blocking pool so campaigns keep progressing while the
//! menu waits for input. Activity lines print as they happen through the
//! logger; the panels here are rendered on demand from the dashboard feed.

use crate::app::Controller;
use crate::dashboard::{DashboardEvent, DashboardState, LogKind};
use crate::pairs::{Asset, PairId, NATIVE_SYMBOL};
use crate::sequencer::{render_queue, QueuedTx};
use crate::status::WalletSnapshot;
use anyhow::Result;
use colored::Colorize;
use dialoguer::theme::ColorfulTheme;
use dialoguer::{Input, Select};
use ethers::utils::to_checksum;
use std::sync::Arc;
use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuItem {
    Stop,
    AutoSwap(PairId),
    ChangeRange,
    Queue,
    WalletInfo,
    Logs,
    ClearLogs,
    Refresh,
    Exit,
}

impl MenuItem {
    pub fn label(&self) -> String {
        match self {
            MenuItem::Stop => "Stop Transaction".to_string(),
            MenuItem::AutoSwap(pair) => format!("Auto Swap {}", pair),
            MenuItem::ChangeRange => "Change Random Amount".to_string(),
            MenuItem::Queue => "Transaction Queue".to_string(),
            MenuItem::WalletInfo => "Wallet Info".to_string(),
            MenuItem::Logs => "Transaction Logs".to_string(),
            MenuItem::ClearLogs => "Clear Transaction Logs".to_string(),
            MenuItem::Refresh => "Refresh".to_string(),
            MenuItem::Exit => "Exit".to_string(),
        }
    }
}

pub fn menu_items(running: bool) -> Vec<MenuItem> {
    let mut items = Vec::new();
    if running {
        items.push(MenuItem::Stop);
    }
    items.extend(PairId::ALL.iter().map(|p| MenuItem::AutoSwap(*p)));
    items.extend([
        MenuItem::ChangeRange,
        MenuItem::Queue,
        MenuItem::WalletInfo,
        MenuItem::Logs,
        MenuItem::ClearLogs,
        MenuItem::Refresh,
        MenuItem::Exit,
    ]);
    items
}

async fn prompt<T, F>(f: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> dialoguer::Result<T> + Send + 'static,
{
    Ok(tokio::task::spawn_blocking(f).await??)
}

pub async fn run(
    controller: Arc<Controller>,
    mut events: mpsc::UnboundedReceiver<DashboardEvent>,
) -> Result<()> {
    let mut state = DashboardState::default();

    loop {
        state.drain(&mut events);
        let items = menu_items(controller.is_running());
        let labels: Vec<String> = items.iter().map(|i| i.label()).collect();

        let choice = prompt(move || {
            Select::with_theme(&ColorfulTheme::default())
                .with_prompt("Clober Swap")
                .items(&labels)
                .default(0)
                .interact_opt()
        })
        .await?;
        let Some(index) = choice else {
            continue;
        };

        state.drain(&mut events);
        match items[index] {
            MenuItem::Stop => {
                controller.stop_campaign();
            }
            MenuItem::AutoSwap(pair) => {
                let question = format!("Number of swaps for {}", pair);
                let iterations: u32 = prompt(move || {
                    Input::<u32>::with_theme(&ColorfulTheme::default())
                        .with_prompt(question)
                        .interact_text()
                })
                .await?;
                controller.start_campaign(pair, iterations);
            }
            MenuItem::ChangeRange => change_range(&controller).await?,
            MenuItem::Queue => println!("{}", render_queue_panel(&state.queue)),
            MenuItem::WalletInfo => println!("{}", render_wallet(state.wallet.as_ref())),
            MenuItem::Logs => println!("{}", render_logs(&state, 30)),
            MenuItem::ClearLogs => {
                state.clear_logs();
                controller.log().system("Transaction logs cleared");
            }
            MenuItem::Refresh => {
                controller.refresh().await;
            }
            MenuItem::Exit => {
                if controller.is_running() {
                    controller.stop_campaign();
                    controller.join_campaign().await;
                }
                break;
            }
        }
    }
    Ok(())
}

async fn change_range(controller: &Controller) -> Result<()> {
    let pair_labels: Vec<String> = PairId::ALL.iter().map(|p| p.to_string()).collect();
    let Some(pair_index) = prompt(move || {
        Select::with_theme(&ColorfulTheme::default())
            .with_prompt("Pair")
            .items(&pair_labels)
            .default(0)
            .interact_opt()
    })
    .await?
    else {
        return Ok(());
    };
    let pair = PairId::ALL[pair_index];

    let asset_labels = vec![NATIVE_SYMBOL.to_string(), pair.token_symbol().to_string()];
    let Some(asset_index) = prompt(move || {
        Select::with_theme(&ColorfulTheme::default())
            .with_prompt("Asset")
            .items(&asset_labels)
            .default(0)
            .interact_opt()
    })
    .await?
    else {
        return Ok(());
    };
    let asset = if asset_index == 0 {
        Asset::Native
    } else {
        Asset::Token
    };

    let min: f64 = prompt(|| {
        Input::<f64>::with_theme(&ColorfulTheme::default())
            .with_prompt("Minimum amount")
            .interact_text()
    })
    .await?;
    let max: f64 = prompt(|| {
        Input::<f64>::with_theme(&ColorfulTheme::default())
            .with_prompt("Maximum amount")
            .interact_text()
    })
    .await?;

    controller.change_random_range(pair, asset, min, max);
    Ok(())
}

pub fn render_queue_panel(entries: &[QueuedTx]) -> String {
    format!(
        "{}\n{}",
        "Transaction Queue".bold().cyan(),
        render_queue(entries)
    )
}

pub fn render_wallet(snapshot: Option<&WalletSnapshot>) -> String {
    let Some(w) = snapshot else {
        return "Wallet information not loaded yet.".yellow().to_string();
    };

    let mut lines = vec![
        format!("{}", "Wallet Information".bold().cyan()),
        format!("Address : {}", to_checksum(&w.address, None).magenta()),
        format!("MON     : {}", w.native.green()),
    ];
    for (symbol, balance) in &w.tokens {
        lines.push(format!("{:<8}: {}", symbol, balance.green()));
    }
    lines.push(format!("Volume  : ${}", w.volume_usd.yellow()));
    lines.push(format!("Rank    : {}", w.rank.yellow()));
    lines.push(format!("Network : {}", w.network.bright_blue()));
    lines.join("\n")
}

pub fn render_logs(state: &DashboardState, last: usize) -> String {
    let lines: Vec<_> = state.logs().collect();
    if lines.is_empty() {
        return "No activity yet.".to_string();
    }
    let start = lines.len().saturating_sub(last);
    lines[start..]
        .iter()
        .map(|line| {
            let stamp = format!("[ {} ]", line.at.format("%H:%M:%S"));
            let message = match line.kind {
                LogKind::Swap => line.message.bright_cyan(),
                LogKind::System => line.message.bright_white(),
                LogKind::Error => line.message.bright_red(),
                LogKind::Success => line.message.bright_green(),
                LogKind::Warning => line.message.bright_yellow(),
                LogKind::Debug => line.message.bright_magenta(),
            };
            format!("{} {}", stamp.dimmed(), message)
        })
        .collect::<Vec<_>>()
        .join("\n")
}
