//! # Core Logic - Shared Utilities for Testnet Agents
//!
//! Chain-agnostic pieces used by the swap agents: error taxonomy, pacing and
//! randomized amounts, gas-limit margins, key loading, metrics and logging.
//!
//! ## Modules
//!
//! - [`config`] - Shared configuration types (pacing, chain)
//! - [`error`] - Typed error handling with thiserror
//! - [`metrics`] - Swap and transaction counters
//! - [`traits`] - Core trait definitions

pub mod config;
pub mod error;
pub mod metrics;
pub mod traits;
pub(crate) mod utils;

pub use config::{ChainConfig, DelayRange, PacingConfig};
pub use error::{ConfigError, NetworkError, WalletError};
pub use metrics::{MetricsCollector, MetricsSnapshot, TxOutcomeKind};
pub use traits::{Task, TaskResult, WalletLoader};

pub use utils::{
    cancellable_sleep, format_delay, setup_logger, GasPolicy, KeyFileLoader, RandomRange,
    WalletKey, ACTIVITY_TARGET,
};
