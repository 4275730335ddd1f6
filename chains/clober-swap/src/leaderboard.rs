//! Trading volume and rank from the Clober leaderboard.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use crate::quote::send_error;
use core_logic::NetworkError;
use ethers::types::Address;
use ethers::utils::to_checksum;
use serde_json::Value;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub struct LeaderboardEntry {
    pub total_volume_usd: f64,
    pub rank: String,
}

#[async_trait]
pub trait LeaderboardSource: Send + Sync {
    async fn fetch(&self, address: Address) -> Result<LeaderboardEntry>;
}

/// Reads `my_rank.total_volume_usd` and `my_rank.rank`. Both may arrive as
/// numbers or strings.
pub fn parse_entry(body: &Value) -> Result<LeaderboardEntry> {
    let my_rank = body
        .get("my_rank")
        .filter(|v| !v.is_null())
        .ok_or_else(|| anyhow!("Invalid leaderboard response"))?;

    let total_volume_usd = match my_rank.get("total_volume_usd") {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .ok_or_else(|| anyhow!("Invalid total_volume_usd in leaderboard response"))?;

    let rank = match my_rank.get("rank") {
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::String(s)) => s.clone(),
        _ => return Err(anyhow!("Invalid rank in leaderboard response")),
    };

    Ok(LeaderboardEntry {
        total_volume_usd,
        rank,
    })
}

pub struct CloberLeaderboard {
    http: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl CloberLeaderboard {
    pub fn new(base_url: &str) -> Result<Self> {
        let timeout = Duration::from_secs(15);
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
        })
    }
}

#[async_trait]
impl LeaderboardSource for CloberLeaderboard {
    async fn fetch(&self, address: Address) -> Result<LeaderboardEntry> {
        let url = format!("{}/{}", self.base_url, to_checksum(&address, None));
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| send_error(e, &url, self.timeout, "Failed to call leaderboard API"))?;

        let status = response.status();
        if !status.is_success() {
            return Err(NetworkError::HttpError {
                status_code: status.as_u16(),
                endpoint: url,
            }
            .into());
        }

        let body: Value = response.json().await.map_err(|e| NetworkError::InvalidResponse {
            endpoint: url.clone(),
            reason: e.to_string(),
        })?;
        parse_entry(&body)
    }
}
