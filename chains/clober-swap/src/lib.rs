//! # Clober Swap Agent
//!
//! Auto-swap agent for the Clober venue on Monad testnet. Alternates swaps
//! between MON and one of WMON, USDC, sMON or DAK across a list of wallets,
//! sequencing every transaction of the active wallet through one FIFO queue.

pub mod app;
pub mod campaign;
pub mod chain;
pub mod config;
pub mod console;
pub mod contracts;
pub mod dashboard;
pub mod leaderboard;
pub mod oracle;
pub mod pairs;
pub mod quote;
pub mod sequencer;
pub mod status;
pub mod swap;

#[cfg(test)]
pub(crate) mod testing;
