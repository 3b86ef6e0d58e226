//! Record keys
//!
//! ```text
//! pool        ns | 0x01 | len | denom
//! checkpoint  ns | 0x02 | len | denom | period (u64 BE)
//! position    ns | 0x03 | address (32) | denom
//! by-denom    ns | 0x04 | len | denom | address (32)
//! ```
//!
//! Denominations are length-prefixed wherever something follows them, so a
//! scan over `"stake"` never picks up `"stake2"`. Periods are big-endian so a
//! prefix scan yields checkpoints in period order.

use farm_core::Address;
use serde::{Deserialize, Serialize};

const KIND_POOL: u8 = 0x01;
const KIND_CHECKPOINT: u8 = 0x02;
const KIND_POSITION: u8 = 0x03;
const KIND_POSITION_BY_DENOM: u8 = 0x04;

/// Which of the two ledgers an instance serves
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Namespace {
    /// Pools keyed by liquidity-pool coin denominations
    #[default]
    PoolCoin,
    /// Pools keyed by staking coin denominations
    StakingCoin,
}

impl Namespace {
    pub fn prefix(&self) -> u8 {
        match self {
            Self::PoolCoin => 0x10,
            Self::StakingCoin => 0x20,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::PoolCoin => "pool_coin",
            Self::StakingCoin => "staking_coin",
        }
    }

    /// Module account holding farmed principal
    pub fn staking_reserve(&self) -> Address {
        Address::module(&format!("farm/{}/staking_reserve", self.name()))
    }

    /// Module account backing outstanding rewards
    pub fn reward_reserve(&self) -> Address {
        Address::module(&format!("farm/{}/reward_reserve", self.name()))
    }
}

/// Key builder bound to one namespace
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Keyspace {
    ns: u8,
}

impl Keyspace {
    pub fn new(namespace: Namespace) -> Self {
        Self {
            ns: namespace.prefix(),
        }
    }

    fn head(&self, kind: u8, capacity: usize) -> Vec<u8> {
        let mut key = Vec::with_capacity(2 + capacity);
        key.push(self.ns);
        key.push(kind);
        key
    }

    fn push_denom(key: &mut Vec<u8>, denom: &str) {
        // Denominations are validated to at most 128 bytes
        key.push(denom.len() as u8);
        key.extend_from_slice(denom.as_bytes());
    }

    pub fn pool(&self, denom: &str) -> Vec<u8> {
        let mut key = self.head(KIND_POOL, 1 + denom.len());
        Self::push_denom(&mut key, denom);
        key
    }

    pub fn pool_prefix(&self) -> Vec<u8> {
        self.head(KIND_POOL, 0)
    }

    pub fn checkpoint(&self, denom: &str, period: u64) -> Vec<u8> {
        let mut key = self.checkpoint_prefix(denom);
        key.extend_from_slice(&period.to_be_bytes());
        key
    }

    pub fn checkpoint_prefix(&self, denom: &str) -> Vec<u8> {
        let mut key = self.head(KIND_CHECKPOINT, 1 + denom.len() + 8);
        Self::push_denom(&mut key, denom);
        key
    }

    /// Period encoded in the trailing 8 bytes of a checkpoint key
    pub fn checkpoint_period(key: &[u8]) -> Option<u64> {
        let tail = key.len().checked_sub(8)?;
        let bytes: [u8; 8] = key[tail..].try_into().ok()?;
        Some(u64::from_be_bytes(bytes))
    }

    pub fn position(&self, farmer: &Address, denom: &str) -> Vec<u8> {
        let mut key = self.position_prefix(farmer);
        key.extend_from_slice(denom.as_bytes());
        key
    }

    pub fn position_prefix(&self, farmer: &Address) -> Vec<u8> {
        let mut key = self.head(KIND_POSITION, 32 + 16);
        key.extend_from_slice(farmer.as_bytes());
        key
    }

    pub fn position_by_denom(&self, denom: &str, farmer: &Address) -> Vec<u8> {
        let mut key = self.position_by_denom_prefix(denom);
        key.extend_from_slice(farmer.as_bytes());
        key
    }

    pub fn position_by_denom_prefix(&self, denom: &str) -> Vec<u8> {
        let mut key = self.head(KIND_POSITION_BY_DENOM, 1 + denom.len() + 32);
        Self::push_denom(&mut key, denom);
        key
    }

    /// Farmer encoded in the trailing 32 bytes of a by-denom index key
    pub fn indexed_farmer(key: &[u8]) -> Option<Address> {
        let tail = key.len().checked_sub(32)?;
        let bytes: [u8; 32] = key[tail..].try_into().ok()?;
        Some(Address::new(bytes))
    }
}
