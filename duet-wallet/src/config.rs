//! Wallet configuration

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::crypto::keys::Chain;
use crate::transaction::{
    Network, ProviderConfig, DEFAULT_CONFIRMATION_TIMEOUT_SECS, DEFAULT_SCAN_DEPTH,
    DEFAULT_TIMEOUT_SECS,
};

/// Default number of concurrent per-account fetches during a refresh
pub const DEFAULT_REFRESH_CONCURRENCY: usize = 4;
/// Default number of transactions fetched per account
pub const DEFAULT_TX_FETCH_LIMIT: usize = 25;
/// Default cap on the merged recent-activity list
pub const DEFAULT_HISTORY_CAP: usize = 50;

/// How a chain refresh fans out and how much history it keeps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshConfig {
    /// Maximum in-flight account fetches
    pub concurrency: usize,
    /// Transactions requested per account
    pub tx_limit: usize,
    /// Entries kept in the merged activity list
    pub history_cap: usize,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_REFRESH_CONCURRENCY,
            tx_limit: DEFAULT_TX_FETCH_LIMIT,
            history_cap: DEFAULT_HISTORY_CAP,
        }
    }
}

/// Configuration of both chain endpoints and the refresh behaviour
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletConfig {
    pub network: Network,
    pub ethereum: ProviderConfig,
    pub solana: ProviderConfig,
    pub refresh: RefreshConfig,
    /// Blocks scanned back from the tip for Ethereum history
    pub ethereum_scan_depth: u64,
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self::for_network(Network::default())
    }
}

impl WalletConfig {
    /// Public endpoints of `network` with default timeouts
    pub fn for_network(network: Network) -> Self {
        Self {
            network,
            ethereum: ProviderConfig::for_network(Chain::Ethereum, network),
            solana: ProviderConfig::for_network(Chain::Solana, network),
            refresh: RefreshConfig::default(),
            ethereum_scan_depth: DEFAULT_SCAN_DEPTH,
        }
    }

    /// Load the configuration from environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from `lookup`, falling back to defaults for
    /// anything missing or malformed
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let network = parse_or(&lookup, "DUET_NETWORK", Network::default());
        let mut config = Self::for_network(network);

        if let Some(url) = lookup("ETHEREUM_RPC_URL") {
            config.ethereum.url = url;
        }
        if let Some(url) = lookup("SOLANA_RPC_URL") {
            config.solana.url = url;
        }

        let timeout = parse_or(&lookup, "RPC_TIMEOUT_SECS", DEFAULT_TIMEOUT_SECS);
        let confirmation_timeout = parse_or(
            &lookup,
            "CONFIRMATION_TIMEOUT_SECS",
            DEFAULT_CONFIRMATION_TIMEOUT_SECS,
        );
        for provider in [&mut config.ethereum, &mut config.solana] {
            provider.timeout = Some(timeout);
            provider.confirmation_timeout = confirmation_timeout;
        }

        config.refresh.concurrency =
            parse_or(&lookup, "REFRESH_CONCURRENCY", DEFAULT_REFRESH_CONCURRENCY).max(1);
        config.refresh.tx_limit = parse_or(&lookup, "TX_FETCH_LIMIT", DEFAULT_TX_FETCH_LIMIT);
        config.ethereum_scan_depth =
            parse_or(&lookup, "ETHEREUM_SCAN_DEPTH", DEFAULT_SCAN_DEPTH).max(1);

        config
    }

    /// Provider configuration of `chain`
    pub fn provider(&self, chain: Chain) -> &ProviderConfig {
        match chain {
            Chain::Ethereum => &self.ethereum,
            Chain::Solana => &self.solana,
        }
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    let Some(raw) = lookup(key) else {
        return default;
    };

    match raw.trim().parse() {
        Ok(value) => value,
        Err(_) => {
            warn!(key, value = %raw, "ignoring malformed configuration value");
            default
        }
    }
}
