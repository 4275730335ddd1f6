//! # Utilities Module
//!
//! Internal utility modules for the core-logic crate.
//! These modules are marked as `pub(crate)` to enforce API boundaries.

pub(crate) mod gas;
pub(crate) mod logger;
pub(crate) mod pacing;
pub(crate) mod wallet_manager;

pub use gas::GasPolicy;
pub use logger::{setup_logger, ACTIVITY_TARGET};
pub use pacing::{cancellable_sleep, format_delay, RandomRange};
pub use wallet_manager::{KeyFileLoader, WalletKey};
