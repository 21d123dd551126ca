//! Key-value persistence
//!
//! The wallet persists everything through a minimal string key-value
//! contract so that the host application decides where data lives.

mod memory;
mod file;

pub use memory::MemoryStore;
pub use file::FileStore;

use crate::crypto::keys::Chain;
use crate::error::Result;

/// Storage key of the mnemonic phrase
pub const MNEMONIC_KEY: &str = "mnemonic";

/// A string key-value store
pub trait KeyValueStore: Send + Sync {
    /// Get the value stored under `key`, if any
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Store `value` under `key`, replacing any previous value
    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Remove `key`; removing a missing key is not an error
    fn remove(&self, key: &str) -> Result<()>;
}

/// Storage key of a chain's serialized account list
pub fn accounts_key(chain: Chain) -> String {
    format!("{}Wallets", chain.as_str())
}

/// Storage key of a chain's next-index counter
pub fn next_index_key(chain: Chain) -> String {
    format!("{}NextIndex", chain.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_keys() {
        assert_eq!(accounts_key(Chain::Ethereum), "ethereumWallets");
        assert_eq!(accounts_key(Chain::Solana), "solanaWallets");
        assert_eq!(next_index_key(Chain::Ethereum), "ethereumNextIndex");
        assert_eq!(next_index_key(Chain::Solana), "solanaNextIndex");
    }
}
