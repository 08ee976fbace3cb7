use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;

use super::draft::DEFAULT_DRAFT_CAPACITY;
use super::history::DEFAULT_HISTORY_CAPACITY;
use super::persistence::StorageKeys;
use super::persistence::DEFAULT_KEY_PREFIX;
use super::state::Filter;

pub const DEFAULT_SECRET_PASSWORD: &str = "1234";

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub storage: StorageConfig,
    pub history: HistoryConfig,
    pub autosave: AutosaveConfig,
    pub secret: SecretConfig,
    pub view: ViewConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct StorageConfig {
    pub key_prefix: String,
    pub migrate_legacy_keys: bool,
    pub data_dir: Option<PathBuf>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
            migrate_legacy_keys: true,
            data_dir: None,
        }
    }
}

impl StorageConfig {
    pub fn keys(&self) -> StorageKeys {
        StorageKeys::with_prefix(&self.key_prefix, self.migrate_legacy_keys)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct HistoryConfig {
    pub capacity: usize,
    pub draft_capacity: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_HISTORY_CAPACITY,
            draft_capacity: DEFAULT_DRAFT_CAPACITY,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct AutosaveConfig {
    pub enabled: bool,
    pub interval_secs: u64,
}

impl Default for AutosaveConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 5,
        }
    }
}

/// The secret-task password is an obfuscation toggle compared in plain
/// text on the client. It protects nothing.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct SecretConfig {
    pub password: String,
}

impl Default for SecretConfig {
    fn default() -> Self {
        Self {
            password: DEFAULT_SECRET_PASSWORD.to_string(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(default)]
pub struct ViewConfig {
    pub default_filter: Filter,
}
