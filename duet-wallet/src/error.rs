//! Error types for the duet-wallet library

use thiserror::Error;

/// Custom error type for duet-wallet operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid mnemonic: {0}")]
    InvalidMnemonic(String),

    #[error("No mnemonic available; create or import one first")]
    MnemonicMissing,

    #[error("Key derivation error: {0}")]
    Derivation(String),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Invalid recipient: {0}")]
    InvalidRecipient(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Insufficient funds: {0}")]
    InsufficientFunds(String),

    #[error("Network unavailable: {0}")]
    NetworkUnavailable(String),

    #[error("Broadcast failed: {0}")]
    BroadcastFailed(String),

    /// The transfer may have reached the network but its fate is not known.
    /// Check the chain before retrying.
    #[error("Transaction {id} outcome unknown: {reason}")]
    UnknownOutcome { id: String, reason: String },

    #[error("Unknown account: {0}")]
    UnknownAccount(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Not supported: {0}")]
    NotSupported(String),
}

impl Error {
    /// Whether the failure leaves a transfer in an unknown on-chain state.
    pub fn is_unknown_outcome(&self) -> bool {
        matches!(self, Error::UnknownOutcome { .. })
    }
}

/// Result type for duet-wallet operations
pub type Result<T> = std::result::Result<T, Error>;
