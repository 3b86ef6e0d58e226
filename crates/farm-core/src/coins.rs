//! Integer coin amounts

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::{CoreError, Result};
use crate::types::validate_denom;

/// Single-denomination amount
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Coin {
    pub denom: String,
    pub amount: u128,
}

impl Coin {
    pub fn new(denom: &str, amount: u128) -> Result<Self> {
        validate_denom(denom)?;
        Ok(Self {
            denom: denom.to_string(),
            amount,
        })
    }

    pub fn is_zero(&self) -> bool {
        self.amount == 0
    }
}

impl fmt::Display for Coin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.amount, self.denom)
    }
}

impl fmt::Debug for Coin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Coin({})", self)
    }
}

/// Parses `"1000stake"`
impl FromStr for Coin {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let split = s
            .find(|c: char| !c.is_ascii_digit())
            .ok_or_else(|| CoreError::InvalidCoin(s.to_string()))?;
        let (amount, denom) = s.split_at(split);
        let amount = amount
            .parse::<u128>()
            .map_err(|_| CoreError::InvalidCoin(s.to_string()))?;
        Coin::new(denom, amount)
    }
}

/// Multi-denomination integer amount
///
/// Sorted by denomination, zero entries removed.
#[derive(Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Coins {
    amounts: BTreeMap<String, u128>,
}

impl Coins {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(denom: &str, amount: u128) -> Result<Self> {
        Self::from_coins(vec![Coin::new(denom, amount)?])
    }

    /// Build from a list, merging repeated denominations
    pub fn from_coins(coins: Vec<Coin>) -> Result<Self> {
        let mut out = Self::new();
        for coin in coins {
            validate_denom(&coin.denom)?;
            let sum = out
                .amount_of(&coin.denom)
                .checked_add(coin.amount)
                .ok_or(CoreError::Overflow)?;
            out.put(&coin.denom, sum);
        }
        Ok(out)
    }

    fn put(&mut self, denom: &str, amount: u128) {
        if amount == 0 {
            self.amounts.remove(denom);
        } else {
            self.amounts.insert(denom.to_string(), amount);
        }
    }

    pub fn amount_of(&self, denom: &str) -> u128 {
        self.amounts.get(denom).copied().unwrap_or(0)
    }

    pub fn is_zero(&self) -> bool {
        self.amounts.is_empty()
    }

    pub fn is_empty(&self) -> bool {
        self.amounts.is_empty()
    }

    pub fn len(&self) -> usize {
        self.amounts.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u128)> {
        self.amounts.iter().map(|(d, a)| (d.as_str(), *a))
    }

    pub fn to_vec(&self) -> Vec<Coin> {
        self.iter()
            .map(|(denom, amount)| Coin {
                denom: denom.to_string(),
                amount,
            })
            .collect()
    }

    pub fn checked_add(&self, other: &Self) -> Result<Self> {
        let mut out = self.clone();
        for (denom, amount) in other.iter() {
            let sum = out
                .amount_of(denom)
                .checked_add(amount)
                .ok_or(CoreError::Overflow)?;
            out.put(denom, sum);
        }
        Ok(out)
    }

    /// Component-wise subtraction; `None` if any component would go negative
    pub fn checked_sub(&self, other: &Self) -> Option<Self> {
        let mut out = self.clone();
        for (denom, amount) in other.iter() {
            let diff = out.amount_of(denom).checked_sub(amount)?;
            out.put(denom, diff);
        }
        Some(out)
    }

    pub fn is_all_gte(&self, other: &Self) -> bool {
        other.iter().all(|(denom, amount)| self.amount_of(denom) >= amount)
    }
}

impl From<Coin> for Coins {
    fn from(coin: Coin) -> Self {
        let mut out = Coins::new();
        out.put(&coin.denom, coin.amount);
        out
    }
}

impl fmt::Display for Coins {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.iter().map(|(d, a)| format!("{}{}", a, d)).collect();
        write!(f, "{}", parts.join(","))
    }
}

impl fmt::Debug for Coins {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Coins({})", self)
    }
}

/// Parses `"100stake,5uatom"`; the empty string is the empty set
impl FromStr for Coins {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        if s.trim().is_empty() {
            return Ok(Coins::new());
        }
        let coins = s
            .split(',')
            .map(str::parse::<Coin>)
            .collect::<Result<Vec<_>>>()?;
        Coins::from_coins(coins)
    }
}
