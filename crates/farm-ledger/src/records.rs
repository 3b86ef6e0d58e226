//! Persisted ledger records

use farm_core::{Address, DecCoins};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::error::Result;

/// Per-denomination aggregate of locked stake and reward state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pool {
    pub denom: String,
    /// Sum of all position amounts
    pub total_stake: u128,
    /// Rewards allocated since the last period close
    pub current_rewards: DecCoins,
    /// Rewards allocated and not yet paid out
    pub outstanding_rewards: DecCoins,
    /// Currently open period
    pub period: u64,
}

impl Pool {
    pub fn new(denom: &str) -> Self {
        Self {
            denom: denom.to_string(),
            total_stake: 0,
            current_rewards: DecCoins::new(),
            outstanding_rewards: DecCoins::new(),
            period: crate::INITIAL_PERIOD,
        }
    }

    /// Most recently closed period
    pub fn last_closed_period(&self) -> u64 {
        self.period - 1
    }
}

/// Cumulative reward per unit of stake at the close of one period
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub cumulative_unit_rewards: DecCoins,
    /// Live pointers: the pool's back-reference and positions snapshotted here
    pub reference_count: u8,
}

impl Checkpoint {
    pub fn new(cumulative_unit_rewards: DecCoins) -> Self {
        Self {
            cumulative_unit_rewards,
            reference_count: 1,
        }
    }
}

/// One farmer's stake in one pool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub farmer: Address,
    pub denom: String,
    pub amount: u128,
    /// Checkpoint the position was last settled against
    pub previous_period: u64,
    pub last_settled_height: u64,
}

pub(crate) fn encode<T: Serialize>(record: &T) -> Result<Vec<u8>> {
    Ok(bincode::serialize(record)?)
}

pub(crate) fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    Ok(bincode::deserialize(bytes)?)
}
