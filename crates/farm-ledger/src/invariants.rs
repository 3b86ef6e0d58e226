//! Ledger consistency checks
//!
//! A full scan of every pool, its checkpoints and positions, plus the two
//! reserve accounts. Breaches indicate corruption; `Ledger::assert_invariants`
//! turns any of them into a panic.

use farm_core::{Address, DecCoins};
use std::collections::BTreeMap;
use thiserror::Error;

use crate::bank::Bank;
use crate::error::Result;
use crate::keys::Namespace;
use crate::state::Reader;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InvariantBreach {
    #[error("pool {denom}: total stake {total_stake} but positions sum to {positions}")]
    StakeMismatch {
        denom: String,
        total_stake: u128,
        positions: u128,
    },

    #[error("checkpoint {denom}/{period}: reference count {stored}, {expected} live pointers")]
    ReferenceCountMismatch {
        denom: String,
        period: u64,
        stored: u8,
        expected: u8,
    },

    #[error("checkpoint {denom}/{period} is referenced but missing")]
    DanglingReference { denom: String, period: u64 },

    #[error("pool {denom}: outstanding rewards below current rewards")]
    OutstandingBelowCurrent { denom: String },

    #[error("reward reserve {reserve}: holds {available}{denom}, owes {needed}{denom}")]
    RewardReserveShortfall {
        reserve: Address,
        denom: String,
        needed: u128,
        available: u128,
    },

    #[error("staking reserve {reserve}: holds {available}{denom}, pool stake {needed}")]
    StakingReserveShortfall {
        reserve: Address,
        denom: String,
        needed: u128,
        available: u128,
    },
}

/// Scan the whole namespace and report every broken property
pub fn check_invariants(
    reader: &Reader<'_>,
    bank: &dyn Bank,
    namespace: Namespace,
) -> Result<Vec<InvariantBreach>> {
    let mut breaches = Vec::new();
    let mut owed = DecCoins::new();
    let staking_reserve = namespace.staking_reserve();
    let reward_reserve = namespace.reward_reserve();

    for pool in reader.pools()? {
        let denom = pool.denom.clone();
        let positions = reader.positions_by_denom(&denom)?;

        let staked: u128 = positions.iter().map(|p| p.amount).sum();
        if staked != pool.total_stake {
            breaches.push(InvariantBreach::StakeMismatch {
                denom: denom.clone(),
                total_stake: pool.total_stake,
                positions: staked,
            });
        }

        // Live pointers per period: the pool's back-reference and positions
        let mut pointers: BTreeMap<u64, u8> = BTreeMap::new();
        *pointers.entry(pool.last_closed_period()).or_default() += 1;
        for position in &positions {
            let count = pointers.entry(position.previous_period).or_default();
            *count = count.saturating_add(1);
        }

        let stored: BTreeMap<u64, u8> = reader
            .checkpoints(&denom)?
            .into_iter()
            .map(|(period, checkpoint)| (period, checkpoint.reference_count))
            .collect();

        for (&period, &count) in &stored {
            let expected = pointers.get(&period).copied().unwrap_or(0);
            if count != expected {
                breaches.push(InvariantBreach::ReferenceCountMismatch {
                    denom: denom.clone(),
                    period,
                    stored: count,
                    expected,
                });
            }
        }
        for &period in pointers.keys() {
            if !stored.contains_key(&period) {
                breaches.push(InvariantBreach::DanglingReference {
                    denom: denom.clone(),
                    period,
                });
            }
        }

        if !pool.outstanding_rewards.is_all_gte(&pool.current_rewards) {
            breaches.push(InvariantBreach::OutstandingBelowCurrent {
                denom: denom.clone(),
            });
        }
        owed = owed.checked_add(&pool.outstanding_rewards)?;

        let locked = bank.balance(reader.store(), &staking_reserve, &denom)?;
        if locked < pool.total_stake {
            breaches.push(InvariantBreach::StakingReserveShortfall {
                reserve: staking_reserve,
                denom,
                needed: pool.total_stake,
                available: locked,
            });
        }
    }

    let (owed, _) = owed.truncate_decimal()?;
    for (denom, needed) in owed.iter() {
        let available = bank.balance(reader.store(), &reward_reserve, denom)?;
        if available < needed {
            breaches.push(InvariantBreach::RewardReserveShortfall {
                reserve: reward_reserve,
                denom: denom.to_string(),
                needed,
                available,
            });
        }
    }

    Ok(breaches)
}
