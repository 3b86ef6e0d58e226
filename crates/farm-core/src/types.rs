//! Core type definitions for the farming ledger

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{CoreError, Result};

/// Address - 32-byte account identifier
///
/// User accounts carry whatever 32 bytes the host assigns. Module accounts
/// (reserves) are derived as BLAKE3("module:" || name) so they are stable
/// across restarts and never collide with each other.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Address {
    bytes: [u8; 32],
}

impl Address {
    /// Create an address from raw bytes
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self { bytes }
    }

    /// Derive the address of a module-owned account
    pub fn module(name: &str) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(b"module:");
        hasher.update(name.as_bytes());
        Self {
            bytes: *hasher.finalize().as_bytes(),
        }
    }

    /// Get the raw bytes
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.bytes
    }

    /// Convert to hex string
    pub fn to_hex(&self) -> String {
        hex::encode(self.bytes)
    }

    /// Parse from hex string
    pub fn from_hex(s: &str) -> Result<Self> {
        let decoded = hex::decode(s).map_err(|_| CoreError::InvalidAddress(s.to_string()))?;
        let bytes: [u8; 32] = decoded
            .try_into()
            .map_err(|_| CoreError::InvalidAddress(s.to_string()))?;
        Ok(Self { bytes })
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", &self.to_hex()[..16])
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", &self.to_hex()[..16])
    }
}

/// Maximum denomination length
pub const MAX_DENOM_LEN: usize = 128;

/// Validate a denomination: `[a-zA-Z][a-zA-Z0-9/:._-]{2,127}`
pub fn validate_denom(denom: &str) -> Result<()> {
    let mut chars = denom.chars();
    let first_ok = chars.next().is_some_and(|c| c.is_ascii_alphabetic());
    let rest_ok = chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '/' | ':' | '.' | '_' | '-'));

    if !first_ok || !rest_ok || denom.len() < 3 || denom.len() > MAX_DENOM_LEN {
        return Err(CoreError::InvalidDenom(denom.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_module_address_deterministic() {
        let a = Address::module("farm/reward_reserve");
        let b = Address::module("farm/reward_reserve");
        let c = Address::module("farm/staking_reserve");

        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_address_hex_roundtrip() {
        let addr = Address::new([7u8; 32]);
        let parsed = Address::from_hex(&addr.to_hex()).unwrap();
        assert_eq!(addr, parsed);

        assert!(Address::from_hex("abcd").is_err());
        assert!(Address::from_hex("zz").is_err());
    }

    #[test]
    fn test_validate_denom() {
        assert!(validate_denom("stake").is_ok());
        assert!(validate_denom("pool1").is_ok());
        assert!(validate_denom("ibc/27394FB0").is_ok());

        assert!(validate_denom("").is_err());
        assert!(validate_denom("ab").is_err());
        assert!(validate_denom("1pool").is_err());
        assert!(validate_denom("bad denom").is_err());
        assert!(validate_denom(&"a".repeat(129)).is_err());
    }
}
