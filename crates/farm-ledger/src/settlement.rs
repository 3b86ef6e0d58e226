//! Settlement engine
//!
//! Every touch of a position first closes the pool's open period, sealing
//! `current_rewards / total_stake` into a new checkpoint. The position is
//! then paid the checkpoint difference since its last snapshot times its
//! amount, releases its old checkpoint, and re-snapshots onto the one just
//! closed. This keeps each checkpoint referenced by at most the pool and one
//! generation of positions.
//!
//! Accrual is always a checkpoint difference, so settling twice at one height
//! pays only what was allocated between the two touches and never the same
//! period twice.

use farm_core::{Address, Coin, CoreError, Coins, DecCoins};
use tracing::{debug, info};

use crate::config::ZeroStakePolicy;
use crate::error::{LedgerError, Result};
use crate::events::LedgerEvent;
use crate::records::{Checkpoint, Position};
use crate::state::LedgerState;

fn overflow() -> LedgerError {
    LedgerError::Core(CoreError::Overflow)
}

fn check_amount(coin: &Coin) -> Result<()> {
    farm_core::validate_denom(&coin.denom)?;
    if coin.is_zero() {
        return Err(LedgerError::InvalidAmount(format!(
            "zero amount of {}",
            coin.denom
        )));
    }
    Ok(())
}

impl<'s> LedgerState<'s> {
    /// Seal the open period of `denom` into a checkpoint and open the next.
    /// Returns the period that was closed.
    pub fn close_period(&mut self, denom: &str) -> Result<u64> {
        let mut pool = self.existing_pool(denom)?;

        let unit_rewards = if pool.total_stake == 0 {
            DecCoins::new()
        } else {
            pool.current_rewards.quo_int_truncate(pool.total_stake)?
        };

        let previous_period = pool.last_closed_period();
        let previous = self.referenced_checkpoint(denom, previous_period)?;
        let cumulative = previous
            .cumulative_unit_rewards
            .checked_add(&unit_rewards)?;

        let closed = pool.period;
        self.save_checkpoint(denom, closed, &Checkpoint::new(cumulative))?;
        // The pool's back-reference moves to the new checkpoint
        self.decrement_reference(denom, previous_period)?;

        let carry = pool.total_stake == 0 && self.policy() == ZeroStakePolicy::CarryForward;
        if !carry {
            pool.current_rewards = DecCoins::new();
        }
        pool.period += 1;
        self.save_pool(&pool)?;

        debug!(denom, period = closed, unit_rewards = %unit_rewards, "Period closed");
        self.emit(LedgerEvent::PeriodClosed {
            denom: denom.to_string(),
            period: closed,
            unit_rewards,
        });
        Ok(closed)
    }

    /// Untruncated reward of `amount` stake held from `start` through `end`
    pub fn accrued(&self, denom: &str, start: u64, end: u64, amount: u128) -> Result<DecCoins> {
        if start > end {
            panic!(
                "ledger corrupted: position of {} starts at period {} after end {}",
                denom, start, end
            );
        }
        let starting = self.referenced_checkpoint(denom, start)?;
        let ending = self.referenced_checkpoint(denom, end)?;

        let difference = match ending
            .cumulative_unit_rewards
            .checked_sub(&starting.cumulative_unit_rewards)
        {
            Some(difference) => difference,
            None => panic!(
                "ledger corrupted: cumulative rewards of {} decreased between periods {} and {}",
                denom, start, end
            ),
        };
        Ok(difference.mul_int(amount)?)
    }

    /// Close the open period, pay the position what it accrued since its
    /// snapshot and release its checkpoint. The caller re-snapshots or
    /// deletes the position.
    pub(crate) fn settle(&mut self, position: &Position) -> Result<Coins> {
        let denom = position.denom.as_str();
        let end = self.close_period(denom)?;

        let rewards = self.accrued(denom, position.previous_period, end, position.amount)?;
        let (payout, _dust) = rewards.truncate_decimal()?;

        if !payout.is_empty() {
            let reserve = self.namespace().reward_reserve();
            self.transfer(&reserve, &position.farmer, &payout)?;

            let mut pool = self.existing_pool(denom)?;
            pool.outstanding_rewards = match pool
                .outstanding_rewards
                .checked_sub(&DecCoins::from_coins(&payout))
            {
                Some(outstanding) => outstanding,
                None => panic!(
                    "ledger corrupted: payout {} exceeds outstanding rewards {} of {}",
                    payout, pool.outstanding_rewards, denom
                ),
            };
            self.save_pool(&pool)?;
        }

        self.decrement_reference(denom, position.previous_period)?;
        debug!(farmer = %position.farmer, denom, payout = %payout, "Position settled");
        Ok(payout)
    }

    /// Point the position at the most recently closed checkpoint
    fn snapshot(&mut self, position: &mut Position) -> Result<()> {
        let pool = self.existing_pool(&position.denom)?;
        position.previous_period = pool.last_closed_period();
        position.last_settled_height = self.height();
        self.increment_reference(&position.denom, position.previous_period)?;
        self.save_position(position)
    }

    fn required_position(&self, farmer: &Address, denom: &str) -> Result<Position> {
        self.read()
            .position(farmer, denom)?
            .ok_or_else(|| LedgerError::PositionNotFound {
                farmer: *farmer,
                denom: denom.to_string(),
            })
    }

    /// Lock `coin` for `farmer`, paying out whatever an existing position accrued
    pub fn farm(&mut self, farmer: &Address, coin: &Coin) -> Result<Coins> {
        check_amount(coin)?;
        let denom = coin.denom.as_str();

        let reserve = self.namespace().staking_reserve();
        self.transfer(farmer, &reserve, &Coins::from(coin.clone()))?;
        self.ensure_pool(denom)?;

        let existing = self.read().position(farmer, denom)?;
        let (mut position, payout) = match existing {
            Some(position) => {
                let payout = self.settle(&position)?;
                (position, payout)
            }
            None => {
                self.close_period(denom)?;
                let position = Position {
                    farmer: *farmer,
                    denom: denom.to_string(),
                    amount: 0,
                    previous_period: 0,
                    last_settled_height: self.height(),
                };
                (position, Coins::new())
            }
        };

        position.amount = position.amount.checked_add(coin.amount).ok_or_else(overflow)?;
        let mut pool = self.existing_pool(denom)?;
        pool.total_stake = pool.total_stake.checked_add(coin.amount).ok_or_else(overflow)?;
        self.save_pool(&pool)?;
        self.snapshot(&mut position)?;

        info!(farmer = %farmer, coin = %coin, payout = %payout, "Farmed");
        self.emit(LedgerEvent::Farmed {
            farmer: *farmer,
            coin: coin.clone(),
            payout: payout.clone(),
        });
        Ok(payout)
    }

    /// Withdraw `coin` from the farmer's position, paying out accrued rewards
    pub fn unfarm(&mut self, farmer: &Address, coin: &Coin) -> Result<Coins> {
        check_amount(coin)?;
        let denom = coin.denom.as_str();

        let mut position = self.required_position(farmer, denom)?;
        if coin.amount > position.amount {
            return Err(LedgerError::InsufficientFunds {
                denom: denom.to_string(),
                needed: coin.amount,
                available: position.amount,
            });
        }

        let payout = self.settle(&position)?;

        position.amount -= coin.amount;
        let mut pool = self.existing_pool(denom)?;
        pool.total_stake = match pool.total_stake.checked_sub(coin.amount) {
            Some(stake) => stake,
            None => panic!(
                "ledger corrupted: position of {} exceeds total stake {}",
                denom, pool.total_stake
            ),
        };
        self.save_pool(&pool)?;

        if position.amount == 0 {
            self.delete_position(farmer, denom)?;
        } else {
            self.snapshot(&mut position)?;
        }

        let reserve = self.namespace().staking_reserve();
        self.transfer(&reserve, farmer, &Coins::from(coin.clone()))?;

        info!(farmer = %farmer, coin = %coin, payout = %payout, "Unfarmed");
        self.emit(LedgerEvent::Unfarmed {
            farmer: *farmer,
            coin: coin.clone(),
            payout: payout.clone(),
        });
        Ok(payout)
    }

    /// Pay out accrued rewards without changing the locked amount
    pub fn harvest(&mut self, farmer: &Address, denom: &str) -> Result<Coins> {
        let mut position = self.required_position(farmer, denom)?;
        let payout = self.settle(&position)?;
        self.snapshot(&mut position)?;

        info!(farmer = %farmer, denom, payout = %payout, "Harvested");
        self.emit(LedgerEvent::Harvested {
            farmer: *farmer,
            denom: denom.to_string(),
            payout: payout.clone(),
        });
        Ok(payout)
    }

    /// What `harvest` would pay right now, before truncation. Closes the open
    /// period, so run it on a store that is thrown away afterwards.
    pub fn pending_rewards(&mut self, farmer: &Address, denom: &str) -> Result<DecCoins> {
        let position = self.required_position(farmer, denom)?;
        let end = self.close_period(denom)?;
        self.accrued(denom, position.previous_period, end, position.amount)
    }

    /// Harvest each listed denomination; any missing position fails the lot
    pub fn harvest_many(&mut self, farmer: &Address, denoms: &[String]) -> Result<Coins> {
        let mut total = Coins::new();
        for denom in denoms {
            let payout = self.harvest(farmer, denom)?;
            total = total.checked_add(&payout)?;
        }
        Ok(total)
    }

    /// Harvest every position the farmer holds
    pub fn harvest_all(&mut self, farmer: &Address) -> Result<Coins> {
        let denoms: Vec<String> = self
            .read()
            .positions_by_farmer(farmer)?
            .into_iter()
            .map(|position| position.denom)
            .collect();
        self.harvest_many(farmer, &denoms)
    }
}
