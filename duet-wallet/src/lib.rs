//! Duet Wallet Core - Deterministic Ethereum and Solana wallet engine
//!
//! This library derives Ethereum (BIP-32) and Solana (SLIP-0010) accounts
//! from a single BIP-39 mnemonic, keeps a per-chain registry of them in a
//! pluggable key-value store, and reads balances and history from or submits
//! native transfers to the chains through JSON-RPC clients.

pub mod error;
pub mod crypto;
pub mod account;
pub mod storage;
pub mod transaction;
pub mod config;
pub mod service;

// Re-export commonly used types for convenience
pub use error::{Error, Result};
pub use crypto::keys::{Account, Chain};
pub use config::WalletConfig;
pub use service::{AccountCreated, ChainSnapshot, WalletService};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
