use purchase_ledger_primitives::Domain;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Ten days.
pub const DEFAULT_GRANT_DURATION_SECS: u64 = 864_000;
pub const DEFAULT_NOTIFICATION_CAPACITY: usize = 64;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("reading {path}: {source}")]
    Io { path: PathBuf, source: std::io::Error },
    #[error("parsing config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("{0}")]
    Invalid(&'static str),
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum StorageConfig {
    #[default]
    Memory,
    File { path: PathBuf },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LedgerConfig {
    /// Domain every handle of this ledger is scoped to.
    pub domain: Domain,
    #[serde(default = "default_grant_duration")]
    pub grant_duration_secs: u64,
    #[serde(default = "default_notification_capacity")]
    pub notification_capacity: usize,
    #[serde(default)]
    pub storage: StorageConfig,
}

fn default_grant_duration() -> u64 {
    DEFAULT_GRANT_DURATION_SECS
}

fn default_notification_capacity() -> usize {
    DEFAULT_NOTIFICATION_CAPACITY
}

impl LedgerConfig {
    pub fn new(domain: Domain) -> Self {
        Self {
            domain,
            grant_duration_secs: DEFAULT_GRANT_DURATION_SECS,
            notification_capacity: DEFAULT_NOTIFICATION_CAPACITY,
            storage: StorageConfig::Memory,
        }
    }

    pub fn from_json(s: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::Io { path: path.to_path_buf(), source })?;
        Self::from_json(&raw)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.grant_duration_secs == 0 {
            return Err(ConfigError::Invalid("grant_duration_secs must be positive"));
        }
        if self.notification_capacity == 0 {
            return Err(ConfigError::Invalid("notification_capacity must be positive"));
        }
        Ok(())
    }
}
