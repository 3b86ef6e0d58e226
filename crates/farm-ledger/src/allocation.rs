//! Reward allocator
//!
//! `allocate` is the primitive: it credits an amount to a pool's open period
//! and its outstanding total, and never looks at positions or checkpoints.
//! `distribute` resolves a `RewardAllocation` into per-pool shares, funds the
//! reward reserve from the source account and allocates each share.

use farm_core::{Address, Coins, CoreError, Dec, DecCoins};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::{debug, info, warn};

use crate::error::{LedgerError, Result};
use crate::events::LedgerEvent;
use crate::state::LedgerState;

/// How much a source injects per distribution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RewardSource {
    /// Exactly this amount every time
    FixedAmount { amount: Coins },
    /// This fraction of every balance the source holds, truncated
    Ratio { ratio: Dec },
}

/// One distribution from a funded source account to weighted pools
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardAllocation {
    pub source: Address,
    pub kind: RewardSource,
    /// Target pool denominations and their relative weights
    pub weights: Vec<(String, Dec)>,
}

impl RewardAllocation {
    pub fn fixed(source: Address, amount: Coins, weights: Vec<(String, Dec)>) -> Self {
        Self {
            source,
            kind: RewardSource::FixedAmount { amount },
            weights,
        }
    }

    pub fn ratio(source: Address, ratio: Dec, weights: Vec<(String, Dec)>) -> Self {
        Self {
            source,
            kind: RewardSource::Ratio { ratio },
            weights,
        }
    }

    pub fn validate(&self) -> Result<()> {
        match &self.kind {
            RewardSource::FixedAmount { amount } if amount.is_empty() => {
                return Err(LedgerError::InvalidAllocation(
                    "fixed amount is empty".to_string(),
                ));
            }
            RewardSource::Ratio { ratio } if ratio.is_zero() || *ratio > Dec::ONE => {
                return Err(LedgerError::InvalidAllocation(format!(
                    "ratio {} outside (0, 1]",
                    ratio
                )));
            }
            _ => {}
        }

        if self.weights.is_empty() {
            return Err(LedgerError::InvalidAllocation("no target pools".to_string()));
        }
        let mut seen = BTreeSet::new();
        for (denom, weight) in &self.weights {
            farm_core::validate_denom(denom)?;
            if weight.is_zero() {
                return Err(LedgerError::InvalidAllocation(format!(
                    "zero weight for {}",
                    denom
                )));
            }
            if !seen.insert(denom.as_str()) {
                return Err(LedgerError::InvalidAllocation(format!(
                    "duplicate target {}",
                    denom
                )));
            }
        }
        Ok(())
    }
}

impl<'s> LedgerState<'s> {
    /// Credit `amount` to the open period of an existing pool
    pub fn allocate(&mut self, denom: &str, amount: &DecCoins) -> Result<()> {
        let mut pool = self
            .read()
            .pool(denom)?
            .ok_or_else(|| LedgerError::PoolNotFound(denom.to_string()))?;
        if amount.is_zero() {
            return Ok(());
        }

        pool.current_rewards = pool.current_rewards.checked_add(amount)?;
        pool.outstanding_rewards = pool.outstanding_rewards.checked_add(amount)?;
        self.save_pool(&pool)?;

        if pool.total_stake == 0 {
            warn!(denom, amount = %amount, "Rewards allocated to a pool with no stake");
        }
        info!(denom, amount = %amount, period = pool.period, "Rewards allocated");
        self.emit(LedgerEvent::RewardsAllocated {
            denom: denom.to_string(),
            amount: amount.clone(),
        });
        Ok(())
    }

    fn resolve_amount(&self, allocation: &RewardAllocation) -> Result<Coins> {
        match &allocation.kind {
            RewardSource::FixedAmount { amount } => Ok(amount.clone()),
            RewardSource::Ratio { ratio } => {
                let balances = self.balances(&allocation.source)?;
                let (whole, _) = DecCoins::from_coins(&balances)
                    .mul_dec_truncate(*ratio)?
                    .truncate_decimal()?;
                Ok(whole)
            }
        }
    }

    /// Split the allocation across its target pools by weight and allocate
    /// each share. Pools without stake are skipped and their share stays
    /// with the source. Returns the shares actually allocated.
    pub fn distribute(&mut self, allocation: &RewardAllocation) -> Result<Vec<(String, Coins)>> {
        allocation.validate()?;
        let amount = self.resolve_amount(allocation)?;

        let mut targets = Vec::with_capacity(allocation.weights.len());
        for (denom, weight) in &allocation.weights {
            let pool = self.read().pool(denom)?;
            match pool {
                Some(pool) if pool.total_stake > 0 => targets.push((denom, *weight)),
                _ => debug!(denom = denom.as_str(), "Skipping pool without stake"),
            }
        }
        if targets.is_empty() || amount.is_empty() {
            return Ok(Vec::new());
        }

        let mut total_weight = Dec::ZERO;
        for (_, weight) in &targets {
            total_weight = total_weight
                .checked_add(*weight)
                .ok_or(LedgerError::Core(CoreError::Overflow))?;
        }

        let available = DecCoins::from_coins(&amount);
        let mut shares = Vec::with_capacity(targets.len());
        let mut funded = Coins::new();
        for (denom, weight) in targets {
            let fraction = weight.quo_truncate(total_weight)?;
            let (share, _) = available.mul_dec_truncate(fraction)?.truncate_decimal()?;
            if share.is_empty() {
                continue;
            }
            funded = funded.checked_add(&share)?;
            shares.push((denom.clone(), share));
        }

        let reserve = self.namespace().reward_reserve();
        self.transfer(&allocation.source, &reserve, &funded)?;
        for (denom, share) in &shares {
            self.allocate(denom, &DecCoins::from_coins(share))?;
        }

        info!(source = %allocation.source, amount = %funded, pools = shares.len(), "Rewards distributed");
        Ok(shares)
    }
}
