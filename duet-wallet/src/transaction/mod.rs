//! Transaction functionality
//!
//! This module provides the chain-client abstraction used to read balances
//! and history and to submit signed native transfers, plus the Ethereum
//! implementation of it.

pub mod types;
pub mod units;
pub mod provider;
mod ethereum;

pub use types::*;
pub use provider::*;
pub use ethereum::*;
