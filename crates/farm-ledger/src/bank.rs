//! Value transfer primitive
//!
//! Balances live in the same store as the ledger records, so a transfer made
//! inside an operation commits or rolls back together with it.

use farm_core::{Address, Coins};
use farm_storage::KvStore;
use tracing::debug;

use crate::error::{LedgerError, Result};

/// Balance prefix, outside both ledger namespaces
const BALANCE_PREFIX: u8 = 0xB0;

/// Moves integer amounts between accounts
pub trait Bank {
    fn balance(&self, store: &dyn KvStore, owner: &Address, denom: &str) -> Result<u128>;

    fn balances(&self, store: &dyn KvStore, owner: &Address) -> Result<Coins>;

    /// Fails with `InsufficientFunds` and writes nothing if `from` lacks any
    /// component of `amount`
    fn transfer(
        &self,
        store: &mut dyn KvStore,
        from: &Address,
        to: &Address,
        amount: &Coins,
    ) -> Result<()>;
}

/// Store-backed bank: one big-endian `u128` per (owner, denom)
#[derive(Debug, Clone, Copy, Default)]
pub struct KvBank;

impl KvBank {
    fn account_prefix(owner: &Address) -> Vec<u8> {
        let mut key = Vec::with_capacity(1 + 32 + 16);
        key.push(BALANCE_PREFIX);
        key.extend_from_slice(owner.as_bytes());
        key
    }

    fn balance_key(owner: &Address, denom: &str) -> Vec<u8> {
        let mut key = Self::account_prefix(owner);
        key.extend_from_slice(denom.as_bytes());
        key
    }

    fn decode_amount(bytes: &[u8]) -> Result<u128> {
        let raw: [u8; 16] = bytes
            .try_into()
            .map_err(|_| LedgerError::Serialization("balance is not 16 bytes".to_string()))?;
        Ok(u128::from_be_bytes(raw))
    }

    fn write_balance(
        store: &mut dyn KvStore,
        owner: &Address,
        denom: &str,
        amount: u128,
    ) -> Result<()> {
        let key = Self::balance_key(owner, denom);
        if amount == 0 {
            store.delete(&key)?;
        } else {
            store.set(&key, amount.to_be_bytes().to_vec())?;
        }
        Ok(())
    }

    /// Credit new coins to an account (genesis balances, reward funding)
    pub fn mint(store: &mut dyn KvStore, to: &Address, amount: &Coins) -> Result<()> {
        for (denom, value) in amount.iter() {
            let current = KvBank.balance(store, to, denom)?;
            let credited = current
                .checked_add(value)
                .ok_or(LedgerError::Core(farm_core::CoreError::Overflow))?;
            Self::write_balance(store, to, denom, credited)?;
        }
        debug!(to = %to, amount = %amount, "Minted");
        Ok(())
    }
}

impl Bank for KvBank {
    fn balance(&self, store: &dyn KvStore, owner: &Address, denom: &str) -> Result<u128> {
        match store.get(&Self::balance_key(owner, denom))? {
            Some(bytes) => Self::decode_amount(&bytes),
            None => Ok(0),
        }
    }

    fn balances(&self, store: &dyn KvStore, owner: &Address) -> Result<Coins> {
        let prefix = Self::account_prefix(owner);
        let mut out = Coins::new();
        for (key, value) in store.scan_prefix(&prefix)? {
            let denom = std::str::from_utf8(&key[prefix.len()..])
                .map_err(|e| LedgerError::Serialization(e.to_string()))?;
            let amount = Self::decode_amount(&value)?;
            out = out.checked_add(&Coins::single(denom, amount)?)?;
        }
        Ok(out)
    }

    fn transfer(
        &self,
        store: &mut dyn KvStore,
        from: &Address,
        to: &Address,
        amount: &Coins,
    ) -> Result<()> {
        if amount.is_empty() || from == to {
            return Ok(());
        }

        // Check every component before writing any
        for (denom, needed) in amount.iter() {
            let available = self.balance(store, from, denom)?;
            if available < needed {
                return Err(LedgerError::InsufficientFunds {
                    denom: denom.to_string(),
                    needed,
                    available,
                });
            }
        }

        for (denom, value) in amount.iter() {
            let debited = self.balance(store, from, denom)? - value;
            Self::write_balance(store, from, denom, debited)?;

            let credited = self
                .balance(store, to, denom)?
                .checked_add(value)
                .ok_or(LedgerError::Core(farm_core::CoreError::Overflow))?;
            Self::write_balance(store, to, denom, credited)?;
        }

        debug!(from = %from, to = %to, amount = %amount, "Transferred");
        Ok(())
    }
}
