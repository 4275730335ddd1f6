use crate::error::{ConfigError, WalletError};
use crate::traits::WalletLoader;
use anyhow::Result;
use async_trait::async_trait;
use std::fmt;
use std::path::{Path, PathBuf};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Hex private key of one campaign wallet, without the `0x` prefix.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct WalletKey {
    hex: String,
}

impl WalletKey {
    pub fn parse(raw: &str, line: usize) -> Result<Self, WalletError> {
        let trimmed = raw.trim();
        let stripped = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed);

        if !stripped.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(WalletError::InvalidKeyFormat { line });
        }
        if stripped.len() != 64 {
            return Err(WalletError::InvalidKeyLength {
                line,
                length: stripped.len(),
            });
        }
        Ok(Self {
            hex: stripped.to_lowercase(),
        })
    }

    pub fn expose_hex(&self) -> &str {
        &self.hex
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, WalletError> {
        hex::decode(&self.hex).map_err(|_| WalletError::InvalidKeyFormat { line: 0 })
    }
}

impl fmt::Debug for WalletKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WalletKey")
            .field("hex", &"***REDACTED***")
            .finish()
    }
}

/// Reads the ordered wallet list from a plain key file.
///
/// One key per line; CR characters, blank lines and `#` comments are skipped.
#[derive(Debug, Clone)]
pub struct KeyFileLoader {
    path: PathBuf,
}

impl KeyFileLoader {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn parse(content: &str, origin: &str) -> Result<Vec<WalletKey>, WalletError> {
        let mut keys = Vec::new();
        for (idx, line) in content.lines().enumerate() {
            let cleaned = line.replace('\r', "");
            let trimmed = cleaned.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            keys.push(WalletKey::parse(trimmed, idx + 1)?);
        }

        if keys.is_empty() {
            return Err(WalletError::NoKeys {
                path: origin.to_string(),
            });
        }
        Ok(keys)
    }
}

#[async_trait]
impl WalletLoader for KeyFileLoader {
    type Wallet = WalletKey;

    async fn load_wallets(&self) -> Result<Vec<WalletKey>> {
        let display = self.path.display().to_string();
        let content = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => ConfigError::FileNotFound {
                    path: display.clone(),
                },
                _ => ConfigError::IoError {
                    path: display.clone(),
                    msg: e.to_string(),
                },
            })?;
        Ok(Self::parse(&content, &display)?)
    }
}
