//! Randomized amounts and cancellable pauses.

use crate::error::ConfigError;
use rand::Rng;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Closed interval an amount is drawn from.
///
/// Construction enforces `min > 0` and `max > min`, so a stored range is
/// always drawable.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RandomRange {
    min: f64,
    max: f64,
}

impl RandomRange {
    pub fn new(field: &str, min: f64, max: f64) -> Result<Self, ConfigError> {
        if !min.is_finite() || !max.is_finite() || min <= 0.0 || max <= min {
            return Err(ConfigError::InvalidRange {
                field: field.to_string(),
                min,
                max,
            });
        }
        Ok(Self { min, max })
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }

    pub fn sample(&self) -> f64 {
        rand::thread_rng().gen_range(self.min..=self.max)
    }

    /// Draws an amount and renders it with exactly 6 decimals.
    ///
    /// The string form is what gets parsed into base units and what a quote
    /// request carries, so both agree on the same value.
    pub fn sample_amount(&self) -> String {
        format!("{:.6}", self.sample())
    }
}

/// Sleeps for `duration` unless `token` fires first.
///
/// Returns `true` when the full duration elapsed, `false` when cancelled.
pub async fn cancellable_sleep(token: &CancellationToken, duration: Duration) -> bool {
    tokio::select! {
        _ = token.cancelled() => false,
        _ = tokio::time::sleep(duration) => true,
    }
}

/// Renders a delay as `"Xm Ys"`.
pub fn format_delay(duration: Duration) -> String {
    let secs = duration.as_secs();
    format!("{}m {}s", secs / 60, secs % 60)
}
