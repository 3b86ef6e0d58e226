//! Typed access to ledger records over a `KvStore`
//!
//! `Reader` serves queries against any store. `LedgerState` is the mutable
//! view an operation runs with: it borrows the operation's overlay, the bank
//! and the block context, and collects the events the operation raises.
//! Settlement and allocation extend it in their own modules.

use farm_core::{Address, Coins};
use farm_storage::KvStore;
use tracing::debug;

use crate::bank::Bank;
use crate::config::ZeroStakePolicy;
use crate::error::Result;
use crate::events::LedgerEvent;
use crate::keys::{Keyspace, Namespace};
use crate::records::{decode, encode, Checkpoint, Pool, Position};
use crate::{GENESIS_PERIOD, MAX_CHECKPOINT_REFERENCES};

/// Read-only record access
#[derive(Clone, Copy)]
pub struct Reader<'s> {
    store: &'s dyn KvStore,
    keys: Keyspace,
}

impl<'s> Reader<'s> {
    pub fn new(store: &'s dyn KvStore, namespace: Namespace) -> Self {
        Self {
            store,
            keys: Keyspace::new(namespace),
        }
    }

    pub fn store(&self) -> &'s dyn KvStore {
        self.store
    }

    fn load<T: serde::de::DeserializeOwned>(&self, key: &[u8]) -> Result<Option<T>> {
        match self.store.get(key)? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn pool(&self, denom: &str) -> Result<Option<Pool>> {
        self.load(&self.keys.pool(denom))
    }

    /// All pools, ordered by denomination length then bytes
    pub fn pools(&self) -> Result<Vec<Pool>> {
        self.store
            .scan_prefix(&self.keys.pool_prefix())?
            .iter()
            .map(|(_, value)| decode(value))
            .collect()
    }

    pub fn checkpoint(&self, denom: &str, period: u64) -> Result<Option<Checkpoint>> {
        self.load(&self.keys.checkpoint(denom, period))
    }

    /// Live checkpoints of a pool in period order
    pub fn checkpoints(&self, denom: &str) -> Result<Vec<(u64, Checkpoint)>> {
        let mut out = Vec::new();
        for (key, value) in self.store.scan_prefix(&self.keys.checkpoint_prefix(denom))? {
            if let Some(period) = Keyspace::checkpoint_period(&key) {
                out.push((period, decode(&value)?));
            }
        }
        Ok(out)
    }

    pub fn position(&self, farmer: &Address, denom: &str) -> Result<Option<Position>> {
        self.load(&self.keys.position(farmer, denom))
    }

    pub fn positions_by_farmer(&self, farmer: &Address) -> Result<Vec<Position>> {
        self.store
            .scan_prefix(&self.keys.position_prefix(farmer))?
            .iter()
            .map(|(_, value)| decode(value))
            .collect()
    }

    pub fn positions_by_denom(&self, denom: &str) -> Result<Vec<Position>> {
        let mut out = Vec::new();
        for (key, _) in self
            .store
            .scan_prefix(&self.keys.position_by_denom_prefix(denom))?
        {
            if let Some(farmer) = Keyspace::indexed_farmer(&key) {
                if let Some(position) = self.position(&farmer, denom)? {
                    out.push(position);
                }
            }
        }
        Ok(out)
    }
}

/// Mutable ledger view for one operation
pub struct LedgerState<'s> {
    store: &'s mut dyn KvStore,
    bank: &'s dyn Bank,
    namespace: Namespace,
    keys: Keyspace,
    height: u64,
    policy: ZeroStakePolicy,
    events: Vec<LedgerEvent>,
}

impl<'s> LedgerState<'s> {
    pub fn new(
        store: &'s mut dyn KvStore,
        bank: &'s dyn Bank,
        namespace: Namespace,
        height: u64,
        policy: ZeroStakePolicy,
    ) -> Self {
        Self {
            store,
            bank,
            namespace,
            keys: Keyspace::new(namespace),
            height,
            policy,
            events: Vec::new(),
        }
    }

    pub fn read(&self) -> Reader<'_> {
        Reader {
            store: &*self.store,
            keys: self.keys,
        }
    }

    pub fn height(&self) -> u64 {
        self.height
    }

    pub fn policy(&self) -> ZeroStakePolicy {
        self.policy
    }

    pub fn namespace(&self) -> Namespace {
        self.namespace
    }

    pub(crate) fn emit(&mut self, event: LedgerEvent) {
        self.events.push(event);
    }

    pub fn into_events(self) -> Vec<LedgerEvent> {
        self.events
    }

    pub(crate) fn transfer(&mut self, from: &Address, to: &Address, amount: &Coins) -> Result<()> {
        self.bank.transfer(&mut *self.store, from, to, amount)
    }

    pub(crate) fn balances(&self, owner: &Address) -> Result<Coins> {
        self.bank.balances(&*self.store, owner)
    }

    // === Pools ===

    pub(crate) fn save_pool(&mut self, pool: &Pool) -> Result<()> {
        self.store.set(&self.keys.pool(&pool.denom), encode(pool)?)?;
        Ok(())
    }

    /// Pool that must exist because a position or checkpoint points at it
    pub(crate) fn existing_pool(&self, denom: &str) -> Result<Pool> {
        match self.read().pool(denom)? {
            Some(pool) => Ok(pool),
            None => panic!("ledger corrupted: pool {} missing", denom),
        }
    }

    /// Load the pool, creating it with its genesis checkpoint on first use
    pub(crate) fn ensure_pool(&mut self, denom: &str) -> Result<Pool> {
        if let Some(pool) = self.read().pool(denom)? {
            return Ok(pool);
        }
        farm_core::validate_denom(denom)?;

        let pool = Pool::new(denom);
        self.save_pool(&pool)?;
        self.save_checkpoint(denom, GENESIS_PERIOD, &Checkpoint::new(Default::default()))?;
        debug!(denom, namespace = self.namespace.name(), "Pool created");
        Ok(pool)
    }

    // === Checkpoints ===

    pub(crate) fn save_checkpoint(
        &mut self,
        denom: &str,
        period: u64,
        checkpoint: &Checkpoint,
    ) -> Result<()> {
        self.store
            .set(&self.keys.checkpoint(denom, period), encode(checkpoint)?)?;
        Ok(())
    }

    /// Checkpoint that must exist because something references it
    pub(crate) fn referenced_checkpoint(&self, denom: &str, period: u64) -> Result<Checkpoint> {
        match self.read().checkpoint(denom, period)? {
            Some(checkpoint) => Ok(checkpoint),
            None => panic!(
                "ledger corrupted: checkpoint {}/{} is referenced but missing",
                denom, period
            ),
        }
    }

    pub(crate) fn increment_reference(&mut self, denom: &str, period: u64) -> Result<()> {
        let mut checkpoint = self.referenced_checkpoint(denom, period)?;
        if checkpoint.reference_count >= MAX_CHECKPOINT_REFERENCES {
            panic!(
                "ledger corrupted: checkpoint {}/{} would exceed {} references",
                denom, period, MAX_CHECKPOINT_REFERENCES
            );
        }
        checkpoint.reference_count += 1;
        debug!(denom, period, count = checkpoint.reference_count, "Checkpoint referenced");
        self.save_checkpoint(denom, period, &checkpoint)
    }

    /// Release one reference, deleting the checkpoint when none remain
    pub(crate) fn decrement_reference(&mut self, denom: &str, period: u64) -> Result<()> {
        let mut checkpoint = self.referenced_checkpoint(denom, period)?;
        checkpoint.reference_count = match checkpoint.reference_count.checked_sub(1) {
            Some(count) => count,
            None => panic!(
                "ledger corrupted: checkpoint {}/{} reference count underflow",
                denom, period
            ),
        };

        if checkpoint.reference_count == 0 {
            self.store.delete(&self.keys.checkpoint(denom, period))?;
            debug!(denom, period, "Checkpoint released");
            Ok(())
        } else {
            debug!(denom, period, count = checkpoint.reference_count, "Checkpoint dereferenced");
            self.save_checkpoint(denom, period, &checkpoint)
        }
    }

    // === Positions ===

    pub(crate) fn save_position(&mut self, position: &Position) -> Result<()> {
        self.store.set(
            &self.keys.position(&position.farmer, &position.denom),
            encode(position)?,
        )?;
        self.store.set(
            &self.keys.position_by_denom(&position.denom, &position.farmer),
            Vec::new(),
        )?;
        Ok(())
    }

    pub(crate) fn delete_position(&mut self, farmer: &Address, denom: &str) -> Result<()> {
        self.store.delete(&self.keys.position(farmer, denom))?;
        self.store
            .delete(&self.keys.position_by_denom(denom, farmer))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bank::KvBank;
    use farm_storage::MemoryStore;

    fn with_state<R>(store: &mut MemoryStore, f: impl FnOnce(&mut LedgerState<'_>) -> R) -> R {
        let mut state = LedgerState::new(
            store,
            &KvBank,
            Namespace::PoolCoin,
            1,
            ZeroStakePolicy::CarryForward,
        );
        f(&mut state)
    }

    #[test]
    fn test_ensure_pool_creates_genesis_checkpoint() {
        let mut store = MemoryStore::new();
        with_state(&mut store, |state| {
            let pool = state.ensure_pool("stake").unwrap();
            assert_eq!(pool.period, 1);

            let genesis = state.read().checkpoint("stake", 0).unwrap().unwrap();
            assert!(genesis.cumulative_unit_rewards.is_zero());
            assert_eq!(genesis.reference_count, 1);

            // Second call loads rather than recreates
            state.increment_reference("stake", 0).unwrap();
            state.ensure_pool("stake").unwrap();
            let genesis = state.read().checkpoint("stake", 0).unwrap().unwrap();
            assert_eq!(genesis.reference_count, 2);
        });
    }

    #[test]
    fn test_ensure_pool_rejects_bad_denom() {
        let mut store = MemoryStore::new();
        with_state(&mut store, |state| {
            assert!(state.ensure_pool("x").is_err());
        });
        assert!(store.is_empty());
    }

    #[test]
    fn test_decrement_deletes_at_zero() {
        let mut store = MemoryStore::new();
        with_state(&mut store, |state| {
            state.ensure_pool("stake").unwrap();
            state.decrement_reference("stake", 0).unwrap();
            assert!(state.read().checkpoint("stake", 0).unwrap().is_none());
        });
    }

    #[test]
    #[should_panic(expected = "would exceed 2 references")]
    fn test_third_reference_panics() {
        let mut store = MemoryStore::new();
        with_state(&mut store, |state| {
            state.ensure_pool("stake").unwrap();
            state.increment_reference("stake", 0).unwrap();
            state.increment_reference("stake", 0).unwrap();
        });
    }

    #[test]
    #[should_panic(expected = "referenced but missing")]
    fn test_missing_checkpoint_panics() {
        let mut store = MemoryStore::new();
        with_state(&mut store, |state| {
            state.decrement_reference("stake", 7).unwrap();
        });
    }

    #[test]
    fn test_position_index() {
        let mut store = MemoryStore::new();
        let farmer = Address::new([3u8; 32]);
        with_state(&mut store, |state| {
            let position = Position {
                farmer,
                denom: "stake".to_string(),
                amount: 10,
                previous_period: 0,
                last_settled_height: 1,
            };
            state.save_position(&position).unwrap();

            assert_eq!(state.read().positions_by_denom("stake").unwrap(), vec![position.clone()]);
            assert_eq!(state.read().positions_by_farmer(&farmer).unwrap(), vec![position]);

            state.delete_position(&farmer, "stake").unwrap();
            assert!(state.read().positions_by_denom("stake").unwrap().is_empty());
        });
        assert!(store.is_empty());
    }
}
