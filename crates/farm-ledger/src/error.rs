//! Error types for ledger operations
//!
//! Only recoverable conditions appear here. Ledger corruption (a missing
//! checkpoint, a reference count outside 0..=2, stake totals that disagree)
//! panics instead, aborting the enclosing state transition.

use farm_core::{Address, CoreError};
use farm_storage::StorageError;
use thiserror::Error;

/// Result type alias for ledger operations
pub type Result<T> = std::result::Result<T, LedgerError>;

/// Errors that can occur in ledger operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    // === User Errors ===
    /// Source account or position holds less than requested
    #[error("Insufficient funds: need {needed}{denom}, have {available}{denom}")]
    InsufficientFunds {
        denom: String,
        needed: u128,
        available: u128,
    },

    /// No position for this farmer and denomination
    #[error("Position not found: farmer {farmer}, denom {denom}")]
    PositionNotFound { farmer: Address, denom: String },

    /// No pool for this denomination
    #[error("Pool not found: {0}")]
    PoolNotFound(String),

    /// Zero or otherwise unusable amount
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// Reward allocation rejected
    #[error("Invalid allocation: {0}")]
    InvalidAllocation(String),

    /// Malformed denomination, coin or decimal
    #[error(transparent)]
    Core(#[from] CoreError),

    // === Infrastructure Errors ===
    /// Underlying store failed
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Stored record could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration could not be read or parsed
    #[error("Configuration error: {0}")]
    Config(String),
}

impl LedgerError {
    /// Stable numeric code for the external query layer
    pub fn code(&self) -> u32 {
        match self {
            Self::InsufficientFunds { .. } => 2001,
            Self::PositionNotFound { .. } => 2002,
            Self::PoolNotFound(_) => 2003,
            Self::InvalidAmount(_) => 2004,
            Self::InvalidAllocation(_) => 2005,
            Self::Core(CoreError::Overflow) => 2006,
            Self::Core(_) => 2007,
            Self::Storage(_) => 3001,
            Self::Serialization(_) => 3002,
            Self::Config(_) => 3003,
        }
    }

    /// User errors: reported back to the caller, nothing was applied
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            Self::Storage(_) | Self::Serialization(_) | Self::Config(_)
        )
    }
}

impl From<bincode::Error> for LedgerError {
    fn from(err: bincode::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
