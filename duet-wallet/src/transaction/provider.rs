//! RPC provider configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::crypto::keys::Chain;
use crate::error::{Error, Result};

pub const ETHEREUM_MAINNET_RPC: &str = "https://eth.llamarpc.com";
pub const ETHEREUM_SEPOLIA_RPC: &str = "https://sepolia.gateway.tenderly.co";
pub const SOLANA_MAINNET_RPC: &str = "https://api.mainnet-beta.solana.com";
pub const SOLANA_DEVNET_RPC: &str = "https://api.devnet.solana.com";

/// Default per-request timeout in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
/// Default bound on waiting for a transfer to confirm, in seconds
pub const DEFAULT_CONFIRMATION_TIMEOUT_SECS: u64 = 120;

/// Which network the endpoints point at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Mainnet,
    /// Sepolia for Ethereum, devnet for Solana
    #[default]
    Testnet,
}

impl std::str::FromStr for Network {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "mainnet" => Ok(Self::Mainnet),
            "testnet" | "sepolia" | "devnet" => Ok(Self::Testnet),
            other => Err(Error::Configuration(format!("Unknown network: {}", other))),
        }
    }
}

impl Network {
    /// Default public endpoint of `chain` on this network
    pub fn default_url(&self, chain: Chain) -> &'static str {
        match (chain, self) {
            (Chain::Ethereum, Self::Mainnet) => ETHEREUM_MAINNET_RPC,
            (Chain::Ethereum, Self::Testnet) => ETHEREUM_SEPOLIA_RPC,
            (Chain::Solana, Self::Mainnet) => SOLANA_MAINNET_RPC,
            (Chain::Solana, Self::Testnet) => SOLANA_DEVNET_RPC,
        }
    }
}

/// Provider configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Provider URL
    pub url: String,
    /// Per-request timeout in seconds
    pub timeout: Option<u64>,
    /// Bound on waiting for a broadcast transfer to confirm, in seconds
    pub confirmation_timeout: u64,
}

impl ProviderConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            timeout: Some(DEFAULT_TIMEOUT_SECS),
            confirmation_timeout: DEFAULT_CONFIRMATION_TIMEOUT_SECS,
        }
    }

    /// The default endpoint of `chain` on `network`
    pub fn for_network(chain: Chain, network: Network) -> Self {
        Self::new(network.default_url(chain))
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.timeout.map(Duration::from_secs)
    }

    pub fn confirmation_timeout(&self) -> Duration {
        Duration::from_secs(self.confirmation_timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_network_defaults() {
        let config = ProviderConfig::for_network(Chain::Solana, Network::default());
        assert_eq!(config.url, SOLANA_DEVNET_RPC);
        assert_eq!(config.request_timeout(), Some(Duration::from_secs(30)));

        let config = ProviderConfig::for_network(Chain::Ethereum, Network::Mainnet);
        assert_eq!(config.url, ETHEREUM_MAINNET_RPC);
    }

    #[test]
    fn test_parse_network() {
        assert_eq!("Mainnet".parse::<Network>().unwrap(), Network::Mainnet);
        assert_eq!("devnet".parse::<Network>().unwrap(), Network::Testnet);
        assert!("moon".parse::<Network>().is_err());
    }
}
