//! # Farm Ledger
//!
//! Lazy proportional reward distribution for farming pools.
//!
//! Participants lock ("farm") amounts of a denomination into a pool. Rewards
//! arrive in bulk and are never pushed to individual positions. Instead each
//! pool keeps a running reward-per-unit-stake, sealed into a checkpoint every
//! time any position in the pool is touched. A position's reward is the
//! difference between two checkpoints times its locked amount.
//!
//! ## Record Layout
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │  Pool(denom)                                                         │
//! │    total_stake, current_rewards, outstanding_rewards, period = p     │
//! │                         │                                            │
//! │                         ▼ (p - 1)                                    │
//! │  Checkpoint(denom, 0) ... Checkpoint(denom, p-1)                     │
//! │    cumulative_unit_rewards, reference_count ≤ 2                      │
//! │                         ▲                                            │
//! │                         │ previous_period                            │
//! │  Position(farmer, denom)                                             │
//! │    amount, previous_period, last_settled_height                      │
//! └──────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Settlement
//!
//! | Step | Effect |
//! |------|--------|
//! | close period | checkpoint(p) = checkpoint(p-1) + current / total_stake |
//! | accrue | (checkpoint(end) - checkpoint(previous)) × amount |
//! | pay | truncated reward moves from the reward reserve to the farmer |
//! | release | checkpoint(previous) loses one reference, deleted at zero |
//! | re-snapshot | previous = p - 1, one reference added |
//!
//! Every state-changing operation runs on a write-buffer overlay and either
//! commits whole or leaves no trace.

pub mod allocation;
pub mod bank;
pub mod config;
pub mod error;
pub mod events;
pub mod invariants;
pub mod keys;
pub mod ledger;
pub mod query;
pub mod records;
pub mod settlement;
pub mod state;

// Re-exports
pub use allocation::{RewardAllocation, RewardSource};
pub use bank::{Bank, KvBank};
pub use config::{LedgerConfig, StorageBackend, StorageConfig, ZeroStakePolicy};
pub use error::{LedgerError, Result};
pub use events::LedgerEvent;
pub use invariants::InvariantBreach;
pub use keys::{Keyspace, Namespace};
pub use ledger::Ledger;
pub use records::{Checkpoint, Pool, Position};
pub use state::{LedgerState, Reader};

/// Ledger constants
pub mod constants {
    /// Period number of the first checkpoint of every pool
    pub const GENESIS_PERIOD: u64 = 0;

    /// Period a freshly created pool starts in
    pub const INITIAL_PERIOD: u64 = 1;

    /// Upper bound on live references to one checkpoint: the pool itself
    /// plus the position snapshotted onto it right after it was closed.
    /// Every touch closes a fresh period, so no second position can share it.
    pub const MAX_CHECKPOINT_REFERENCES: u8 = 2;
}

pub use constants::*;
