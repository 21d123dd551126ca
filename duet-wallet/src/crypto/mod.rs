//! Cryptographic primitives and operations
//!
//! This module provides functionality for mnemonic handling, seed derivation,
//! and per-curve key derivation required for wallet management.

pub mod mnemonic;
pub mod keys;

pub use mnemonic::*;
pub use keys::*;
