//! Ledger service
//!
//! Owns the committed store, the bank and the block context. Each public
//! operation runs on a `CacheStore` overlay of the committed store and is
//! applied with a single batch write only if it succeeds, so a failed
//! operation leaves neither records nor events behind.

use farm_core::{Address, Coin, Coins, DecCoins};
use farm_storage::{CacheStore, KvStore};
use tracing::{debug, error};

use crate::allocation::RewardAllocation;
use crate::bank::{Bank, KvBank};
use crate::config::LedgerConfig;
use crate::error::{LedgerError, Result};
use crate::events::LedgerEvent;
use crate::invariants::{self, InvariantBreach};
use crate::keys::Namespace;
use crate::state::{LedgerState, Reader};

/// Farming ledger over a store `S` and a bank `B`
pub struct Ledger<S: KvStore = Box<dyn KvStore>, B: Bank = KvBank> {
    store: S,
    bank: B,
    config: LedgerConfig,
    height: u64,
    events: Vec<LedgerEvent>,
}

impl Ledger {
    /// Open the store named by the configuration
    pub fn open(config: LedgerConfig) -> Result<Self> {
        let store = config.storage.open()?;
        debug!(
            namespace = config.namespace.name(),
            backend = ?config.storage.backend,
            "Ledger opened"
        );
        Ok(Self::new(store, config))
    }
}

impl<S: KvStore> Ledger<S, KvBank> {
    pub fn new(store: S, config: LedgerConfig) -> Self {
        Self::with_bank(store, KvBank, config)
    }

    /// Credit coins to an account outside any farming operation
    pub fn mint(&mut self, to: &Address, amount: &Coins) -> Result<()> {
        let batch = {
            let mut cache = CacheStore::new(&self.store);
            KvBank::mint(&mut cache, to, amount)?;
            cache.into_batch()
        };
        self.store.write_batch(batch)?;
        Ok(())
    }
}

impl<S: KvStore, B: Bank> Ledger<S, B> {
    pub fn with_bank(store: S, bank: B, config: LedgerConfig) -> Self {
        Self {
            store,
            bank,
            config,
            height: 0,
            events: Vec::new(),
        }
    }

    /// Enter a new block. Heights never go backwards.
    pub fn begin_block(&mut self, height: u64) {
        if height < self.height {
            panic!(
                "block height regressed from {} to {}",
                self.height, height
            );
        }
        self.height = height;
    }

    pub fn height(&self) -> u64 {
        self.height
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    pub fn namespace(&self) -> Namespace {
        self.config.namespace
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    pub fn bank(&self) -> &B {
        &self.bank
    }

    /// Module account holding farmed principal
    pub fn staking_reserve(&self) -> Address {
        self.namespace().staking_reserve()
    }

    /// Module account backing outstanding rewards
    pub fn reward_reserve(&self) -> Address {
        self.namespace().reward_reserve()
    }

    pub(crate) fn reader(&self) -> Reader<'_> {
        Reader::new(&self.store, self.namespace())
    }

    /// Events of every operation committed since the last drain
    pub fn drain_events(&mut self) -> Vec<LedgerEvent> {
        std::mem::take(&mut self.events)
    }

    /// Run `op` against a throwaway overlay; nothing it writes survives
    pub(crate) fn simulate<T>(
        &self,
        op: impl FnOnce(&mut LedgerState<'_>) -> Result<T>,
    ) -> Result<T> {
        let mut cache = CacheStore::new(&self.store);
        let mut state = LedgerState::new(
            &mut cache,
            &self.bank,
            self.namespace(),
            self.height,
            self.config.zero_stake_policy,
        );
        op(&mut state)
    }

    /// Run `op` against an overlay and commit it only on success
    fn execute<T>(&mut self, op: impl FnOnce(&mut LedgerState<'_>) -> Result<T>) -> Result<T> {
        let (value, events, batch) = {
            let mut cache = CacheStore::new(&self.store);
            let mut state = LedgerState::new(
                &mut cache,
                &self.bank,
                self.config.namespace,
                self.height,
                self.config.zero_stake_policy,
            );
            let value = op(&mut state)?;
            let events = state.into_events();
            (value, events, cache.into_batch())
        };

        debug!(writes = batch.len(), height = self.height, "Committing");
        self.store.write_batch(batch)?;
        self.events.extend(events);

        if self.config.check_invariants {
            self.assert_invariants()?;
        }
        Ok(value)
    }

    // === Operations ===

    /// Lock `coin` for `farmer`. Returns rewards paid out by the settlement.
    pub fn farm(&mut self, farmer: &Address, coin: &Coin) -> Result<Coins> {
        self.execute(|state| state.farm(farmer, coin))
    }

    /// Withdraw `coin` from the farmer's position. Returns rewards paid out.
    pub fn unfarm(&mut self, farmer: &Address, coin: &Coin) -> Result<Coins> {
        self.execute(|state| state.unfarm(farmer, coin))
    }

    pub fn harvest(&mut self, farmer: &Address, denom: &str) -> Result<Coins> {
        self.execute(|state| state.harvest(farmer, denom))
    }

    /// Harvest several positions at once; fails whole if any is missing
    pub fn harvest_many(&mut self, farmer: &Address, denoms: &[String]) -> Result<Coins> {
        self.execute(|state| state.harvest_many(farmer, denoms))
    }

    pub fn harvest_all(&mut self, farmer: &Address) -> Result<Coins> {
        self.execute(|state| state.harvest_all(farmer))
    }

    /// Credit rewards to a pool. The reward reserve must already hold them.
    pub fn allocate(&mut self, denom: &str, amount: &DecCoins) -> Result<()> {
        self.execute(|state| state.allocate(denom, amount))
    }

    /// Fund the reward reserve from a source and allocate by weight
    pub fn distribute(&mut self, allocation: &RewardAllocation) -> Result<Vec<(String, Coins)>> {
        self.execute(|state| state.distribute(allocation))
    }

    /// Close the open period of an existing pool. Returns the closed period.
    pub fn close_period(&mut self, denom: &str) -> Result<u64> {
        if self.reader().pool(denom)?.is_none() {
            return Err(LedgerError::PoolNotFound(denom.to_string()));
        }
        self.execute(|state| state.close_period(denom))
    }

    // === Consistency ===

    pub fn check_invariants(&self) -> Result<Vec<InvariantBreach>> {
        invariants::check_invariants(&self.reader(), &self.bank, self.namespace())
    }

    /// Panics if any consistency check fails
    pub fn assert_invariants(&self) -> Result<()> {
        let breaches = self.check_invariants()?;
        if !breaches.is_empty() {
            let report: Vec<String> = breaches.iter().map(ToString::to_string).collect();
            error!(count = breaches.len(), "Ledger invariants broken");
            panic!("ledger invariants broken: {}", report.join("; "));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use farm_storage::MemoryStore;

    const ALICE: Address = Address::new([1u8; 32]);

    fn ledger() -> Ledger<MemoryStore> {
        let mut ledger = Ledger::new(MemoryStore::new(), LedgerConfig::development());
        ledger.mint(&ALICE, &"100stake".parse().unwrap()).unwrap();
        ledger.begin_block(1);
        ledger
    }

    #[test]
    fn test_failed_operation_commits_nothing() {
        let mut ledger = ledger();
        let before = ledger.store().snapshot();

        let err = ledger.farm(&ALICE, &"101stake".parse().unwrap()).unwrap_err();
        assert_eq!(err.code(), 2001);
        assert_eq!(ledger.store().snapshot(), before);
        assert!(ledger.drain_events().is_empty());
    }

    #[test]
    fn test_committed_operation_emits_events() {
        let mut ledger = ledger();
        ledger.farm(&ALICE, &"10stake".parse().unwrap()).unwrap();

        let events = ledger.drain_events();
        assert!(matches!(events.first(), Some(LedgerEvent::PeriodClosed { period: 1, .. })));
        assert!(matches!(events.last(), Some(LedgerEvent::Farmed { .. })));
        assert!(ledger.drain_events().is_empty());
    }

    #[test]
    fn test_close_period_requires_pool() {
        let mut ledger = ledger();
        let err = ledger.close_period("stake").unwrap_err();
        assert_eq!(err, LedgerError::PoolNotFound("stake".to_string()));
    }

    #[test]
    #[should_panic(expected = "block height regressed")]
    fn test_height_regression_panics() {
        let mut ledger = ledger();
        ledger.begin_block(5);
        ledger.begin_block(4);
    }
}
