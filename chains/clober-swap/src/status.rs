//! Wallet snapshot refresh: balances plus leaderboard standing.

use crate::chain::ChainClient;
use crate::config::ContractBook;
use crate::dashboard::{ActivityLog, DashboardEvent};
use crate::leaderboard::LeaderboardSource;
use crate::oracle::BalanceOracle;
use ethers::types::Address;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq)]
pub struct WalletSnapshot {
    pub address: Address,
    pub native: String,
    /// `(symbol, balance)` in display order.
    pub tokens: Vec<(String, String)>,
    pub volume_usd: String,
    pub rank: String,
    pub network: String,
}

pub struct StatusReporter {
    tokens: Vec<(&'static str, Address)>,
    leaderboard: Arc<dyn LeaderboardSource>,
    network: String,
    log: ActivityLog,
}

impl StatusReporter {
    pub fn new(
        contracts: &ContractBook,
        leaderboard: Arc<dyn LeaderboardSource>,
        network: String,
        log: ActivityLog,
    ) -> Self {
        Self {
            tokens: vec![
                ("WMON", contracts.wmon),
                ("USDC", contracts.usdc),
                ("sMON", contracts.smon),
                ("DAK", contracts.dak),
            ],
            leaderboard,
            network,
            log,
        }
    }

    /// Reads everything shown in the wallet panel. Individual read failures
    /// are logged and shown as zero; this never fails as a whole.
    pub async fn refresh(&self, chain: &dyn ChainClient) -> WalletSnapshot {
        let oracle = BalanceOracle::new(chain);
        let address = oracle.owner();

        let native = match oracle.native_balance_display().await {
            Ok(balance) => balance,
            Err(e) => {
                self.log
                    .error(format!("Failed to fetch wallet data: {:#}", e));
                "0".to_string()
            }
        };

        let mut tokens = Vec::with_capacity(self.tokens.len());
        for (symbol, token) in &self.tokens {
            let balance = match oracle.token_balance_display(*token).await {
                Ok(balance) => balance,
                Err(e) => {
                    self.log.error(format!(
                        "Failed to fetch {} balance: {:#}",
                        symbol, e
                    ));
                    "0".to_string()
                }
            };
            tokens.push((symbol.to_string(), balance));
        }

        let (volume_usd, rank) = match self.leaderboard.fetch(address).await {
            Ok(entry) => (format!("{:.2}", entry.total_volume_usd), entry.rank),
            Err(e) => {
                self.log
                    .error(format!("Failed to fetch leaderboard data: {:#}", e));
                ("0.00".to_string(), "N/A".to_string())
            }
        };

        let snapshot = WalletSnapshot {
            address,
            native,
            tokens,
            volume_usd,
            rank,
            network: self.network.clone(),
        };
        self.log.publish(DashboardEvent::Wallet(snapshot.clone()));
        self.log.system("Wallet information updated");
        snapshot
    }
}
