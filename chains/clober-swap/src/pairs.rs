//! The four MON pairs, their amount ranges and their alternation state.

use crate::config::ContractBook;
use core_logic::{ConfigError, RandomRange};
use ethers::types::Address;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Mutex, RwLock};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, clap::ValueEnum)]
pub enum PairId {
    MonWmon,
    MonUsdc,
    MonSmon,
    MonDak,
}

impl PairId {
    pub const ALL: [PairId; 4] = [
        PairId::MonWmon,
        PairId::MonUsdc,
        PairId::MonSmon,
        PairId::MonDak,
    ];

    pub fn token_symbol(&self) -> &'static str {
        match self {
            PairId::MonWmon => "WMON",
            PairId::MonUsdc => "USDC",
            PairId::MonSmon => "sMON",
            PairId::MonDak => "DAK",
        }
    }

    /// Key used for range validation errors and metrics, e.g. `MON_USDC`.
    pub fn key(&self) -> &'static str {
        match self {
            PairId::MonWmon => "MON_WMON",
            PairId::MonUsdc => "MON_USDC",
            PairId::MonSmon => "MON_sMON",
            PairId::MonDak => "MON_DAK",
        }
    }
}

impl fmt::Display for PairId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MON & {}", self.token_symbol())
    }
}

pub const NATIVE_SYMBOL: &str = "MON";

/// Direction of one swap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Leg {
    NativeToToken,
    TokenToNative,
}

impl Leg {
    pub fn flipped(self) -> Self {
        match self {
            Leg::NativeToToken => Leg::TokenToNative,
            Leg::TokenToNative => Leg::NativeToToken,
        }
    }

    /// The asset spent on this leg.
    pub fn input(self) -> Asset {
        match self {
            Leg::NativeToToken => Asset::Native,
            Leg::TokenToNative => Asset::Token,
        }
    }
}

/// Side of a pair an amount range belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Asset {
    Native,
    Token,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    /// 1:1 deposit/withdraw on the wrapped-native contract.
    Wrap { venue: Address },
    /// Aggregator-routed swap through the Clober router.
    Routed { router: Address },
}

/// Gas limits used when estimation fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GasFallbacks {
    pub native_in: u64,
    pub token_in: u64,
    pub approve: u64,
}

impl GasFallbacks {
    pub fn for_leg(&self, leg: Leg) -> u64 {
        match leg {
            Leg::NativeToToken => self.native_in,
            Leg::TokenToNative => self.token_in,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PairDescriptor {
    pub id: PairId,
    pub token: Address,
    pub mode: ExecutionMode,
    pub gas: GasFallbacks,
}

impl PairDescriptor {
    pub fn symbol(&self) -> &'static str {
        self.id.token_symbol()
    }

    /// Contract that needs an allowance before the token leg.
    pub fn spender(&self) -> Address {
        match self.mode {
            ExecutionMode::Wrap { venue } => venue,
            ExecutionMode::Routed { router } => router,
        }
    }

    pub fn is_routed(&self) -> bool {
        matches!(self.mode, ExecutionMode::Routed { .. })
    }
}

pub struct PairCatalog {
    wmon: PairDescriptor,
    usdc: PairDescriptor,
    smon: PairDescriptor,
    dak: PairDescriptor,
}

impl PairCatalog {
    pub fn new(contracts: &ContractBook) -> Self {
        let routed = ExecutionMode::Routed {
            router: contracts.router,
        };
        Self {
            wmon: PairDescriptor {
                id: PairId::MonWmon,
                token: contracts.wmon,
                mode: ExecutionMode::Wrap {
                    venue: contracts.wmon_swap,
                },
                gas: GasFallbacks {
                    native_in: 60_000,
                    token_in: 60_000,
                    approve: 100_000,
                },
            },
            usdc: PairDescriptor {
                id: PairId::MonUsdc,
                token: contracts.usdc,
                mode: routed,
                gas: GasFallbacks {
                    native_in: 52_000,
                    token_in: 50_000,
                    approve: 100_000,
                },
            },
            smon: PairDescriptor {
                id: PairId::MonSmon,
                token: contracts.smon,
                mode: routed,
                gas: GasFallbacks {
                    native_in: 50_000,
                    token_in: 50_000,
                    approve: 100_000,
                },
            },
            dak: PairDescriptor {
                id: PairId::MonDak,
                token: contracts.dak,
                mode: routed,
                gas: GasFallbacks {
                    native_in: 50_000,
                    token_in: 50_000,
                    approve: 100_000,
                },
            },
        }
    }

    pub fn get(&self, pair: PairId) -> &PairDescriptor {
        match pair {
            PairId::MonWmon => &self.wmon,
            PairId::MonUsdc => &self.usdc,
            PairId::MonSmon => &self.smon,
            PairId::MonDak => &self.dak,
        }
    }
}

/// Runtime-adjustable amount ranges per pair and side.
pub struct RangeBook {
    ranges: RwLock<HashMap<(PairId, Asset), RandomRange>>,
}

impl Default for RangeBook {
    fn default() -> Self {
        let defaults: [(PairId, f64, f64, f64, f64); 4] = [
            (PairId::MonWmon, 0.1, 0.5, 0.1, 0.5),
            (PairId::MonUsdc, 0.1, 0.5, 0.3, 1.5),
            (PairId::MonSmon, 0.1, 0.5, 0.1, 0.5),
            (PairId::MonDak, 0.1, 0.5, 0.3, 1.0),
        ];
        let mut ranges = HashMap::new();
        for (pair, native_min, native_max, token_min, token_max) in defaults {
            if let Ok(r) = RandomRange::new(NATIVE_SYMBOL, native_min, native_max) {
                ranges.insert((pair, Asset::Native), r);
            }
            if let Ok(r) = RandomRange::new(pair.token_symbol(), token_min, token_max) {
                ranges.insert((pair, Asset::Token), r);
            }
        }
        Self {
            ranges: RwLock::new(ranges),
        }
    }
}

impl RangeBook {
    pub fn get(&self, pair: PairId, asset: Asset) -> Option<RandomRange> {
        let ranges = self.ranges.read().unwrap_or_else(|e| e.into_inner());
        ranges.get(&(pair, asset)).copied()
    }

    /// Replaces a range. Invalid bounds leave the book untouched.
    pub fn set(&self, pair: PairId, asset: Asset, min: f64, max: f64) -> Result<(), ConfigError> {
        let symbol = match asset {
            Asset::Native => NATIVE_SYMBOL,
            Asset::Token => pair.token_symbol(),
        };
        let range = RandomRange::new(&format!("{}.{}", pair.key(), symbol), min, max)?;
        self.ranges
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert((pair, asset), range);
        Ok(())
    }
}

/// Last executed leg per pair. The first swap of a pair is native to token.
#[derive(Default)]
pub struct DirectionBook {
    last: Mutex<HashMap<PairId, Leg>>,
}

impl DirectionBook {
    /// Flips and returns the leg to run now.
    pub fn advance(&self, pair: PairId) -> Leg {
        let mut last = self.last.lock().unwrap_or_else(|e| e.into_inner());
        let next = match last.get(&pair) {
            Some(leg) => leg.flipped(),
            None => Leg::NativeToToken,
        };
        last.insert(pair, next);
        next
    }

    pub fn peek(&self, pair: PairId) -> Leg {
        let last = self.last.lock().unwrap_or_else(|e| e.into_inner());
        last.get(&pair)
            .map(|leg| leg.flipped())
            .unwrap_or(Leg::NativeToToken)
    }
}
