//! Ledger configuration

use farm_storage::{KvStore, MemoryStore, RocksStore};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{LedgerError, Result};
use crate::keys::Namespace;

/// What happens to rewards allocated while a pool has no stake
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZeroStakePolicy {
    /// Keep them in `current_rewards` until a period closes with stake
    #[default]
    CarryForward,
    /// Clear `current_rewards`; the amount stays in `outstanding_rewards` as dust
    Strand,
}

/// Backing store selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    #[default]
    Memory,
    Rocksdb,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// Database directory, used by `rocksdb`
    pub path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Memory,
            path: PathBuf::from("./data/farm"),
        }
    }
}

impl StorageConfig {
    /// Open the configured store
    pub fn open(&self) -> Result<Box<dyn KvStore>> {
        match self.backend {
            StorageBackend::Memory => Ok(Box::new(MemoryStore::new())),
            StorageBackend::Rocksdb => Ok(Box::new(RocksStore::open(&self.path)?)),
        }
    }
}

/// Farm ledger configuration
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Ledger served by this instance
    pub namespace: Namespace,

    /// Disposition of rewards allocated into an empty pool
    pub zero_stake_policy: ZeroStakePolicy,

    /// Run the full consistency check after every committed operation
    pub check_invariants: bool,

    pub storage: StorageConfig,
}

impl LedgerConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| LedgerError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| LedgerError::Config(e.to_string()))
    }

    /// Save configuration to a TOML file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content =
            toml::to_string_pretty(self).map_err(|e| LedgerError::Config(e.to_string()))?;
        std::fs::write(path, content)
            .map_err(|e| LedgerError::Config(format!("{}: {}", path.display(), e)))
    }

    /// In-memory store with consistency checks after every operation
    pub fn development() -> Self {
        Self {
            check_invariants: true,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_toml_is_default() {
        let config = LedgerConfig::from_toml_str("").unwrap();
        assert_eq!(config, LedgerConfig::default());
        assert_eq!(config.namespace, Namespace::PoolCoin);
        assert_eq!(config.zero_stake_policy, ZeroStakePolicy::CarryForward);
    }

    #[test]
    fn test_parse_full_config() {
        let config = LedgerConfig::from_toml_str(
            r#"
            namespace = "staking_coin"
            zero_stake_policy = "strand"
            check_invariants = true

            [storage]
            backend = "rocksdb"
            path = "/var/lib/farm"
            "#,
        )
        .unwrap();

        assert_eq!(config.namespace, Namespace::StakingCoin);
        assert_eq!(config.zero_stake_policy, ZeroStakePolicy::Strand);
        assert!(config.check_invariants);
        assert_eq!(config.storage.backend, StorageBackend::Rocksdb);
        assert_eq!(config.storage.path, PathBuf::from("/var/lib/farm"));
    }

    #[test]
    fn test_unknown_policy_rejected() {
        let err = LedgerConfig::from_toml_str(r#"zero_stake_policy = "refund""#).unwrap_err();
        assert_eq!(err.code(), 3003);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("farm.toml");
        let config = LedgerConfig::development();

        config.save(&path).unwrap();
        assert_eq!(LedgerConfig::load(&path).unwrap(), config);
    }
}
