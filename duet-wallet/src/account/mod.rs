//! Account management functionality
//!
//! This module provides address validation and the per-chain registry of
//! derived accounts.

mod address;
mod registry;

pub use address::*;
pub use registry::*;
