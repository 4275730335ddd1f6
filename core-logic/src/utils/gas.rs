//! # Core Logic - Gas Limit Policy
//!
//! Safety margin applied to node gas estimates, and the fallback rule used when
//! estimation fails. Chain crates supply their own per-operation fallbacks.

/// Margin applied on top of an estimated gas limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GasPolicy {
    pub margin_percent: u64,
}

impl Default for GasPolicy {
    fn default() -> Self {
        Self { margin_percent: 20 }
    }
}

impl GasPolicy {
    pub fn new(margin_percent: u64) -> Self {
        Self { margin_percent }
    }

    /// `estimate * (100 + margin) / 100`, saturating.
    pub fn apply_margin(&self, estimate: u64) -> u64 {
        let scaled = (estimate as u128) * (100 + self.margin_percent as u128) / 100;
        u64::try_from(scaled).unwrap_or(u64::MAX)
    }

    /// Margined estimate, or `fallback` when the estimate is unavailable.
    pub fn limit_or<E>(&self, estimate: Result<u64, E>, fallback: u64) -> u64 {
        match estimate {
            Ok(gas) => self.apply_margin(gas),
            Err(_) => fallback,
        }
    }
}
