//! Fixed-point decimals for reward accounting
//!
//! `Dec` carries 18 fractional digits on a 256-bit integer, so a cumulative
//! reward-per-unit value multiplied by any `u128` stake stays exact.
//! All divisions truncate toward zero.

use primitive_types::U256;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::coins::Coins;
use crate::error::{CoreError, Result};

/// Number of fractional decimal digits
pub const PRECISION: usize = 18;

const ONE_ATTO: u64 = 1_000_000_000_000_000_000;

fn scale() -> U256 {
    U256::from(ONE_ATTO)
}

fn to_u128(value: U256) -> Result<u128> {
    if value.bits() > 128 {
        return Err(CoreError::Overflow);
    }
    Ok(value.low_u128())
}

/// Non-negative 18-place fixed-point decimal
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Dec(U256);

impl Dec {
    /// Zero
    pub const ZERO: Self = Self(U256([0, 0, 0, 0]));

    /// One
    pub const ONE: Self = Self(U256([ONE_ATTO, 0, 0, 0]));

    /// Whole-unit decimal
    pub fn from_int(value: u128) -> Self {
        // u128 * 10^18 < 2^188, never overflows
        Self(U256::from(value) * scale())
    }

    /// Decimal from raw atto units (10^-18)
    pub fn from_atto(atto: U256) -> Self {
        Self(atto)
    }

    /// Raw atto units
    pub fn atto(&self) -> U256 {
        self.0
    }

    /// `numerator / denominator`, truncated
    pub fn from_ratio(numerator: u128, denominator: u128) -> Result<Self> {
        if denominator == 0 {
            return Err(CoreError::DivisionByZero);
        }
        Ok(Self(U256::from(numerator) * scale() / U256::from(denominator)))
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn checked_add(self, other: Self) -> Option<Self> {
        self.0.checked_add(other.0).map(Self)
    }

    pub fn checked_sub(self, other: Self) -> Option<Self> {
        self.0.checked_sub(other.0).map(Self)
    }

    /// Divide by an integer, truncating
    pub fn quo_int_truncate(self, divisor: u128) -> Result<Self> {
        if divisor == 0 {
            return Err(CoreError::DivisionByZero);
        }
        Ok(Self(self.0 / U256::from(divisor)))
    }

    /// Multiply by an integer. Exact: no fractional digits are lost.
    pub fn mul_int(self, factor: u128) -> Result<Self> {
        self.0
            .checked_mul(U256::from(factor))
            .map(Self)
            .ok_or(CoreError::Overflow)
    }

    /// Multiply two decimals, truncating below 10^-18
    pub fn mul_truncate(self, other: Self) -> Result<Self> {
        let product = self.0.checked_mul(other.0).ok_or(CoreError::Overflow)?;
        Ok(Self(product / scale()))
    }

    /// Divide by another decimal, truncating below 10^-18
    pub fn quo_truncate(self, divisor: Self) -> Result<Self> {
        if divisor.is_zero() {
            return Err(CoreError::DivisionByZero);
        }
        let scaled = self.0.checked_mul(scale()).ok_or(CoreError::Overflow)?;
        Ok(Self(scaled / divisor.0))
    }

    /// Integer part
    pub fn truncate_int(self) -> Result<u128> {
        to_u128(self.0 / scale())
    }

    /// Fractional part
    pub fn fraction(self) -> Self {
        Self(self.0 % scale())
    }
}

impl Default for Dec {
    fn default() -> Self {
        Self::ZERO
    }
}

impl fmt::Display for Dec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let int = self.0 / scale();
        let frac = (self.0 % scale()).low_u64();
        write!(f, "{}.{:018}", int, frac)
    }
}

impl fmt::Debug for Dec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Dec({})", self)
    }
}

impl FromStr for Dec {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || CoreError::InvalidDecimal(s.to_string());
        let (int_part, frac_part) = match s.split_once('.') {
            Some((i, f)) => (i, f),
            None => (s, ""),
        };

        let digits_only = |p: &str| p.chars().all(|c| c.is_ascii_digit());
        if int_part.is_empty()
            || !digits_only(int_part)
            || !digits_only(frac_part)
            || frac_part.len() > PRECISION
        {
            return Err(invalid());
        }

        let int = U256::from_dec_str(int_part).map_err(|_| invalid())?;
        let frac = if frac_part.is_empty() {
            U256::zero()
        } else {
            let padded = format!("{:0<width$}", frac_part, width = PRECISION);
            U256::from_dec_str(&padded).map_err(|_| invalid())?
        };

        int.checked_mul(scale())
            .and_then(|v| v.checked_add(frac))
            .map(Self)
            .ok_or(CoreError::Overflow)
    }
}

impl Serialize for Dec {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Dec {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}

/// Multi-asset decimal vector
///
/// Kept sorted by denomination with zero entries removed, so equality is
/// structural.
#[derive(Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DecCoins {
    amounts: BTreeMap<String, Dec>,
}

impl DecCoins {
    pub fn new() -> Self {
        Self::default()
    }

    /// Single-denomination vector. A zero amount yields the empty vector.
    pub fn single(denom: &str, amount: Dec) -> Self {
        let mut out = Self::new();
        out.put(denom, amount);
        out
    }

    pub fn from_coins(coins: &Coins) -> Self {
        let mut out = Self::new();
        for (denom, amount) in coins.iter() {
            out.put(denom, Dec::from_int(amount));
        }
        out
    }

    fn put(&mut self, denom: &str, amount: Dec) {
        if amount.is_zero() {
            self.amounts.remove(denom);
        } else {
            self.amounts.insert(denom.to_string(), amount);
        }
    }

    pub fn amount_of(&self, denom: &str) -> Dec {
        self.amounts.get(denom).copied().unwrap_or(Dec::ZERO)
    }

    pub fn is_zero(&self) -> bool {
        self.amounts.is_empty()
    }

    pub fn len(&self) -> usize {
        self.amounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.amounts.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Dec)> {
        self.amounts.iter().map(|(d, a)| (d.as_str(), *a))
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

    /// True when every component of `self` is at least the matching one of `other`
    pub fn is_all_gte(&self, other: &Self) -> bool {
        other.iter().all(|(denom, amount)| self.amount_of(denom) >= amount)
    }

    /// Divide every component by an integer, truncating
    pub fn quo_int_truncate(&self, divisor: u128) -> Result<Self> {
        let mut out = Self::new();
        for (denom, amount) in self.iter() {
            out.put(denom, amount.quo_int_truncate(divisor)?);
        }
        Ok(out)
    }

    /// Multiply every component by an integer
    pub fn mul_int(&self, factor: u128) -> Result<Self> {
        let mut out = Self::new();
        for (denom, amount) in self.iter() {
            out.put(denom, amount.mul_int(factor)?);
        }
        Ok(out)
    }

    /// Multiply every component by a decimal, truncating
    pub fn mul_dec_truncate(&self, factor: Dec) -> Result<Self> {
        let mut out = Self::new();
        for (denom, amount) in self.iter() {
            out.put(denom, amount.mul_truncate(factor)?);
        }
        Ok(out)
    }

    /// Split into whole coins and the fractional change left behind
    pub fn truncate_decimal(&self) -> Result<(Coins, DecCoins)> {
        let mut whole = Coins::new();
        let mut change = DecCoins::new();
        for (denom, amount) in self.iter() {
            let int = amount.truncate_int()?;
            if int > 0 {
                whole = whole.checked_add(&Coins::single(denom, int)?)?;
            }
            change.put(denom, amount.fraction());
        }
        Ok((whole, change))
    }
}

impl fmt::Display for DecCoins {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.iter().map(|(d, a)| format!("{}{}", a, d)).collect();
        write!(f, "{}", parts.join(","))
    }
}

impl fmt::Debug for DecCoins {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DecCoins({})", self)
    }
}
