use chrono::Utc;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub timestamp: String,
    pub uptime_secs: u64,
    pub swaps: SwapMetrics,
    pub transactions: TxMetrics,
}

#[derive(Debug, Clone, Serialize)]
pub struct SwapMetrics {
    pub total: u64,
    pub success: u64,
    pub failed: u64,
    pub success_rate: f64,
    pub avg_duration_ms: f64,
    pub max_duration_ms: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct TxMetrics {
    pub completed: u64,
    pub failed: u64,
    pub errored: u64,
}

/// Terminal state of a sequenced transaction, as counted by the collector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxOutcomeKind {
    Completed,
    Failed,
    Error,
}

#[derive(Debug)]
pub struct MetricsCollector {
    swaps_total: AtomicU64,
    swaps_success: AtomicU64,
    swaps_failed: AtomicU64,
    swap_duration_sum_ms: AtomicU64,
    swap_max_duration_ms: AtomicU64,
    tx_completed: AtomicU64,
    tx_failed: AtomicU64,
    tx_errored: AtomicU64,
    start_time: Instant,
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self {
            swaps_total: AtomicU64::new(0),
            swaps_success: AtomicU64::new(0),
            swaps_failed: AtomicU64::new(0),
            swap_duration_sum_ms: AtomicU64::new(0),
            swap_max_duration_ms: AtomicU64::new(0),
            tx_completed: AtomicU64::new(0),
            tx_failed: AtomicU64::new(0),
            tx_errored: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }
}

impl MetricsCollector {
    pub fn global() -> &'static Self {
        static INSTANCE: std::sync::OnceLock<MetricsCollector> = std::sync::OnceLock::new();
        INSTANCE.get_or_init(MetricsCollector::default)
    }

    pub fn record_swap(&self, _pair: &str, duration: Duration, success: bool) {
        let duration_ms = duration.as_millis() as u64;
        self.swaps_total.fetch_add(1, Ordering::SeqCst);
        self.swap_duration_sum_ms
            .fetch_add(duration_ms, Ordering::SeqCst);
        self.swap_max_duration_ms
            .fetch_max(duration_ms, Ordering::SeqCst);

        if success {
            self.swaps_success.fetch_add(1, Ordering::SeqCst);
        } else {
            self.swaps_failed.fetch_add(1, Ordering::SeqCst);
        }
    }

    pub fn record_tx(&self, outcome: TxOutcomeKind) {
        let counter = match outcome {
            TxOutcomeKind::Completed => &self.tx_completed,
            TxOutcomeKind::Failed => &self.tx_failed,
            TxOutcomeKind::Error => &self.tx_errored,
        };
        counter.fetch_add(1, Ordering::SeqCst);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let total = self.swaps_total.load(Ordering::SeqCst);
        let success = self.swaps_success.load(Ordering::SeqCst);
        let duration_sum = self.swap_duration_sum_ms.load(Ordering::SeqCst);

        MetricsSnapshot {
            timestamp: Utc::now().to_rfc3339(),
            uptime_secs: self.start_time.elapsed().as_secs(),
            swaps: SwapMetrics {
                total,
                success,
                failed: self.swaps_failed.load(Ordering::SeqCst),
                success_rate: if total > 0 {
                    success as f64 / total as f64 * 100.0
                } else {
                    0.0
                },
                avg_duration_ms: if total > 0 {
                    duration_sum as f64 / total as f64
                } else {
                    0.0
                },
                max_duration_ms: self.swap_max_duration_ms.load(Ordering::SeqCst),
            },
            transactions: TxMetrics {
                completed: self.tx_completed.load(Ordering::SeqCst),
                failed: self.tx_failed.load(Ordering::SeqCst),
                errored: self.tx_errored.load(Ordering::SeqCst),
            },
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(&self.snapshot()).unwrap_or_else(|_| "{}".to_string())
    }

    pub async fn export_to_file(&self, path: &str) -> std::io::Result<()> {
        tokio::fs::write(path, self.to_json()).await
    }
}
