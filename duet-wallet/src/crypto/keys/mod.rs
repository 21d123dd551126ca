//! Key derivation and management
//!
//! This module provides hierarchical deterministic key derivation for the
//! supported chains: BIP-32 for Ethereum and SLIP-0010 for Solana.

pub mod ethereum;
pub mod solana;
mod derivation;

pub use derivation::*;
pub use ethereum::Secp256k1Deriver;
pub use solana::Ed25519Deriver;

/// The deriver matching a chain
pub fn deriver_for(chain: Chain) -> &'static dyn KeyDeriver {
    match chain {
        Chain::Ethereum => &Secp256k1Deriver,
        Chain::Solana => &Ed25519Deriver,
    }
}
