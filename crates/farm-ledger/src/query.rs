//! Read surface
//!
//! Plain lookups read the committed store directly. `rewards` and
//! `total_rewards` need a closed period to price the open one, so they close
//! it on a throwaway overlay that is dropped before returning.

use farm_core::{Address, Coins, DecCoins};
use farm_storage::KvStore;

use crate::bank::Bank;
use crate::error::Result;
use crate::ledger::Ledger;
use crate::records::{Checkpoint, Pool, Position};

impl<S: KvStore, B: Bank> Ledger<S, B> {
    pub fn pool(&self, denom: &str) -> Result<Option<Pool>> {
        self.reader().pool(denom)
    }

    pub fn pools(&self) -> Result<Vec<Pool>> {
        self.reader().pools()
    }

    pub fn position(&self, farmer: &Address, denom: &str) -> Result<Option<Position>> {
        self.reader().position(farmer, denom)
    }

    pub fn positions_by_farmer(&self, farmer: &Address) -> Result<Vec<Position>> {
        self.reader().positions_by_farmer(farmer)
    }

    pub fn positions_by_denom(&self, denom: &str) -> Result<Vec<Position>> {
        self.reader().positions_by_denom(denom)
    }

    pub fn checkpoint(&self, denom: &str, period: u64) -> Result<Option<Checkpoint>> {
        self.reader().checkpoint(denom, period)
    }

    pub fn checkpoints(&self, denom: &str) -> Result<Vec<(u64, Checkpoint)>> {
        self.reader().checkpoints(denom)
    }

    pub fn balance(&self, owner: &Address, denom: &str) -> Result<u128> {
        self.bank().balance(self.store(), owner, denom)
    }

    pub fn balances(&self, owner: &Address) -> Result<Coins> {
        self.bank().balances(self.store(), owner)
    }

    /// Untruncated rewards the position has accrued as of now
    pub fn rewards(&self, farmer: &Address, denom: &str) -> Result<DecCoins> {
        self.simulate(|state| state.pending_rewards(farmer, denom))
    }

    /// Sum of `rewards` over every position the farmer holds
    pub fn total_rewards(&self, farmer: &Address) -> Result<DecCoins> {
        self.simulate(|state| {
            let positions = state.read().positions_by_farmer(farmer)?;
            let mut total = DecCoins::new();
            for position in positions {
                let pending = state.pending_rewards(farmer, &position.denom)?;
                total = total.checked_add(&pending)?;
            }
            Ok(total)
        })
    }
}
