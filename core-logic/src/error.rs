//! # Core Error Types
//!
//! Centralized error definitions for the core-logic crate.
//! All errors implement `std::error::Error` and `std::fmt::Display`.

use thiserror::Error;

/// Configuration-related errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("Missing required configuration field: '{field}'")]
    MissingField { field: String },

    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Invalid range for '{field}': min {min}, max {max} (need min > 0 and max > min)")]
    InvalidRange { field: String, min: f64, max: f64 },

    #[error("File not found: {path}")]
    FileNotFound { path: String },

    #[error("I/O error reading {path}: {msg}")]
    IoError { path: String, msg: String },
}

/// Wallet key loading errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum WalletError {
    #[error("No private keys found in '{path}'")]
    NoKeys { path: String },

    #[error("Invalid private key format on line {line}: expected hex string")]
    InvalidKeyFormat { line: usize },

    #[error("Invalid private key length on line {line}: expected 64 hex chars, got {length}")]
    InvalidKeyLength { line: usize, length: usize },
}

/// Network and HTTP-related errors
#[derive(Error, Debug, Clone)]
pub enum NetworkError {
    #[error("Request timeout after {timeout_ms}ms to {endpoint}")]
    Timeout { timeout_ms: u64, endpoint: String },

    #[error("HTTP error {status_code} from {endpoint}")]
    HttpError { status_code: u16, endpoint: String },

    #[error("Invalid response from {endpoint}: {reason}")]
    InvalidResponse { endpoint: String, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range_error_display() {
        let err = ConfigError::InvalidRange {
            field: "MON_USDC.USDC".to_string(),
            min: 1.5,
            max: 0.3,
        };
        let text = err.to_string();
        assert!(text.contains("MON_USDC.USDC"));
        assert!(text.contains("1.5"));
    }
}
