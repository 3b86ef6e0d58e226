//! Error types for farm core value operations

use thiserror::Error;

/// Result type alias for core value operations
pub type Result<T> = std::result::Result<T, CoreError>;

/// Errors raised while constructing or combining amounts
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// Denomination does not match `[a-zA-Z][a-zA-Z0-9/:._-]{2,127}`
    #[error("Invalid denomination: {0}")]
    InvalidDenom(String),

    /// Coin string could not be parsed
    #[error("Invalid coin: {0}")]
    InvalidCoin(String),

    /// Decimal string could not be parsed
    #[error("Invalid decimal: {0}")]
    InvalidDecimal(String),

    /// Address is not 32 bytes of hex
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    /// Division by zero
    #[error("Division by zero")]
    DivisionByZero,

    /// Result does not fit the amount type
    #[error("Arithmetic overflow")]
    Overflow,
}
