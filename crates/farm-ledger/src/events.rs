//! Ledger events handed to the host after each committed operation

use farm_core::{Address, Coin, Coins, DecCoins};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LedgerEvent {
    Farmed {
        farmer: Address,
        coin: Coin,
        payout: Coins,
    },
    Unfarmed {
        farmer: Address,
        coin: Coin,
        payout: Coins,
    },
    Harvested {
        farmer: Address,
        denom: String,
        payout: Coins,
    },
    RewardsAllocated {
        denom: String,
        amount: DecCoins,
    },
    PeriodClosed {
        denom: String,
        period: u64,
        unit_rewards: DecCoins,
    },
}

impl LedgerEvent {
    /// Denomination of the pool the event concerns
    pub fn denom(&self) -> &str {
        match self {
            Self::Farmed { coin, .. } | Self::Unfarmed { coin, .. } => &coin.denom,
            Self::Harvested { denom, .. }
            | Self::RewardsAllocated { denom, .. }
            | Self::PeriodClosed { denom, .. } => denom,
        }
    }
}
