//! # Farm Core
//!
//! Value types shared by the farming ledger crates.
//!
//! - `Address` - 32-byte account identifier, with deterministic module accounts
//! - `Coin` / `Coins` - integer amounts of one or many denominations
//! - `Dec` / `DecCoins` - 18-place fixed-point amounts used for reward accounting
//!
//! ## Amount Model
//!
//! ```text
//!   Coins     {stake: 1000, uatom: 5}          integer, what moves between accounts
//!   DecCoins  {stake: 0.25, uatom: 0.000001}   fixed-point, what the ledger accrues
//!
//!   DecCoins --truncate_decimal()--> (Coins, DecCoins change)
//! ```

pub mod coins;
pub mod dec;
pub mod error;
pub mod types;

pub use coins::*;
pub use dec::*;
pub use error::*;
pub use types::*;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::coins::{Coin, Coins};
    pub use crate::dec::{Dec, DecCoins};
    pub use crate::error::{CoreError, Result};
    pub use crate::types::{validate_denom, Address};
}
