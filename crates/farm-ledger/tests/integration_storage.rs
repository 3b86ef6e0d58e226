//! Integration tests for configuration loading and persistent storage

use farm_core::{Address, Coins, DecCoins};
use farm_ledger::{Ledger, LedgerConfig, StorageBackend, StorageConfig};
use std::path::Path;

const ALICE: Address = Address::new([1u8; 32]);

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn rocks_config(path: &Path) -> LedgerConfig {
    LedgerConfig {
        check_invariants: true,
        storage: StorageConfig {
            backend: StorageBackend::Rocksdb,
            path: path.to_path_buf(),
        },
        ..LedgerConfig::default()
    }
}

#[test]
fn test_ledger_survives_reopen() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let config = rocks_config(dir.path());
    let rewards: Coins = "600stake".parse().unwrap();

    {
        let mut ledger = Ledger::open(config.clone()).unwrap();
        ledger.mint(&ALICE, &"1000pool1".parse().unwrap()).unwrap();
        let reserve = ledger.reward_reserve();
        ledger.mint(&reserve, &rewards).unwrap();

        ledger.begin_block(1);
        ledger.farm(&ALICE, &"300pool1".parse().unwrap()).unwrap();
        ledger.allocate("pool1", &DecCoins::from_coins(&rewards)).unwrap();
    }

    let mut ledger = Ledger::open(config).unwrap();
    let position = ledger.position(&ALICE, "pool1").unwrap().unwrap();
    assert_eq!(position.amount, 300);
    assert_eq!(ledger.balance(&ALICE, "pool1").unwrap(), 700);

    ledger.begin_block(2);
    assert_eq!(ledger.rewards(&ALICE, "pool1").unwrap(), DecCoins::from_coins(&rewards));
    assert_eq!(ledger.harvest(&ALICE, "pool1").unwrap(), rewards);
    assert!(ledger.check_invariants().unwrap().is_empty());
}

#[test]
fn test_open_from_toml_file() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("db");
    let config_path = dir.path().join("farm.toml");
    std::fs::write(
        &config_path,
        format!(
            "namespace = \"staking_coin\"\n\n[storage]\nbackend = \"rocksdb\"\npath = {:?}\n",
            db_path.display().to_string()
        ),
    )
    .unwrap();

    let config = LedgerConfig::load(&config_path).unwrap();
    assert_eq!(config.storage.path, db_path);

    let mut ledger = Ledger::open(config).unwrap();
    ledger.mint(&ALICE, &"5pool1".parse().unwrap()).unwrap();
    ledger.begin_block(1);
    ledger.farm(&ALICE, &"5pool1".parse().unwrap()).unwrap();

    let reserve = ledger.staking_reserve();
    assert_eq!(ledger.balance(&reserve, "pool1").unwrap(), 5);
    assert!(db_path.exists());
}

#[test]
fn test_missing_config_file() {
    let err = LedgerConfig::load(Path::new("/nonexistent/farm.toml")).unwrap_err();
    assert!(!err.is_recoverable());
}
