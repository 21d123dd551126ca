//! Common key derivation functionality

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Offset added to a child number to mark it hardened
pub const HARDENED_OFFSET: u32 = 0x8000_0000;

/// BIP-32 allows seeds of 128 to 512 bits
const MIN_SEED_LEN: usize = 16;
const MAX_SEED_LEN: usize = 64;

/// Supported chains
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Chain {
    /// Ethereum (secp256k1, BIP-32)
    Ethereum,
    /// Solana (Ed25519, SLIP-0010)
    Solana,
}

impl Chain {
    /// Every supported chain, in display order
    pub const ALL: [Chain; 2] = [Chain::Ethereum, Chain::Solana];

    /// Number of decimals between the base unit (wei, lamports) and the display unit
    pub fn decimals(&self) -> u32 {
        match self {
            Self::Ethereum => 18,
            Self::Solana => 9,
        }
    }

    /// Ticker of the native asset
    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Ethereum => "ETH",
            Self::Solana => "SOL",
        }
    }

    /// Lower-case name used in storage keys and on the command line
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ethereum => "ethereum",
            Self::Solana => "solana",
        }
    }
}

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Chain {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "ethereum" | "eth" => Ok(Self::Ethereum),
            "solana" | "sol" => Ok(Self::Solana),
            other => Err(Error::NotSupported(format!("Unknown chain: {}", other))),
        }
    }
}

/// One segment of a derivation path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChildIndex {
    pub index: u32,
    pub hardened: bool,
}

impl ChildIndex {
    pub fn normal(index: u32) -> Self {
        Self { index, hardened: false }
    }

    pub fn hardened(index: u32) -> Self {
        Self { index, hardened: true }
    }

    /// The 32-bit child number as serialized into the HMAC input
    pub fn to_u32(&self) -> u32 {
        if self.hardened {
            self.index | HARDENED_OFFSET
        } else {
            self.index
        }
    }
}

/// An ordered list of child-index segments below the master key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivationPath {
    segments: Vec<ChildIndex>,
}

impl DerivationPath {
    pub fn new(segments: Vec<ChildIndex>) -> Self {
        Self { segments }
    }

    /// `m/44'/60'/0'/0/{index}`
    pub fn ethereum(index: u32) -> Self {
        Self::new(vec![
            ChildIndex::hardened(44),
            ChildIndex::hardened(60),
            ChildIndex::hardened(0),
            ChildIndex::normal(0),
            ChildIndex::normal(index),
        ])
    }

    /// `m/44'/501'/{index}'/0'`
    pub fn solana(index: u32) -> Self {
        Self::new(vec![
            ChildIndex::hardened(44),
            ChildIndex::hardened(501),
            ChildIndex::hardened(index),
            ChildIndex::hardened(0),
        ])
    }

    /// Standard account path for a chain
    pub fn for_account(chain: Chain, index: u32) -> Self {
        match chain {
            Chain::Ethereum => Self::ethereum(index),
            Chain::Solana => Self::solana(index),
        }
    }

    pub fn segments(&self) -> &[ChildIndex] {
        &self.segments
    }

    pub fn is_fully_hardened(&self) -> bool {
        self.segments.iter().all(|s| s.hardened)
    }
}

impl FromStr for DerivationPath {
    type Err = Error;

    /// Parse a BIP-32 derivation path such as `m/44'/60'/0'/0/0`
    fn from_str(path: &str) -> Result<Self> {
        let rest = path
            .strip_prefix('m')
            .filter(|rest| rest.is_empty() || rest.starts_with('/'))
            .ok_or_else(|| Error::Derivation(format!("Invalid derivation path: {}", path)))?;

        let mut segments = Vec::new();
        for component in rest.split('/').skip(1) {
            if component.is_empty() {
                return Err(Error::Derivation(format!("Invalid derivation path: {}", path)));
            }

            let hardened_digits = component
                .strip_suffix('\'')
                .or_else(|| component.strip_suffix('h'));
            let (digits, hardened) = match hardened_digits {
                Some(digits) => (digits, true),
                None => (component, false),
            };

            let index = digits
                .parse::<u32>()
                .ok()
                .filter(|i| *i < HARDENED_OFFSET)
                .ok_or_else(|| {
                    Error::Derivation(format!("Invalid derivation path component: {}", component))
                })?;

            segments.push(ChildIndex { index, hardened });
        }

        Ok(Self { segments })
    }
}

impl fmt::Display for DerivationPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("m")?;
        for segment in &self.segments {
            write!(f, "/{}", segment.index)?;
            if segment.hardened {
                f.write_str("'")?;
            }
        }
        Ok(())
    }
}

/// An Ethereum account derived at `m/44'/60'/0'/0/{index}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EthereumAccount {
    pub index: u32,
    /// EIP-55 checksummed address
    pub public_key: String,
    /// `0x`-prefixed hex of the 32-byte secret scalar
    pub private_key: String,
}

/// A Solana account derived at `m/44'/501'/{index}'/0'`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SolanaAccount {
    pub index: u32,
    /// Base-58 Ed25519 public key
    pub public_key: String,
    /// Base-58 of the 64-byte keypair (secret || public)
    pub private_key: String,
}

/// A derived account on one of the supported chains
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "chain")]
pub enum Account {
    Ethereum(EthereumAccount),
    Solana(SolanaAccount),
}

impl Account {
    pub fn chain(&self) -> Chain {
        match self {
            Self::Ethereum(_) => Chain::Ethereum,
            Self::Solana(_) => Chain::Solana,
        }
    }

    pub fn index(&self) -> u32 {
        match self {
            Self::Ethereum(account) => account.index,
            Self::Solana(account) => account.index,
        }
    }

    /// The chain-native address
    pub fn address(&self) -> &str {
        match self {
            Self::Ethereum(account) => &account.public_key,
            Self::Solana(account) => &account.public_key,
        }
    }

    /// The chain-native secret encoding
    pub fn private_key(&self) -> &str {
        match self {
            Self::Ethereum(account) => &account.private_key,
            Self::Solana(account) => &account.private_key,
        }
    }

    pub fn derivation_path(&self) -> DerivationPath {
        DerivationPath::for_account(self.chain(), self.index())
    }
}

/// Derives the account at a given index from a BIP-39 seed
pub trait KeyDeriver: Send + Sync {
    /// The chain this deriver produces accounts for
    fn chain(&self) -> Chain;

    /// Derive the account at `index`. Deterministic in `(seed, index)`.
    fn derive(&self, seed: &[u8], index: u32) -> Result<Account>;
}

/// Reject seeds outside the 16..=64 byte range BIP-32 allows
pub(crate) fn check_seed(seed: &[u8]) -> Result<()> {
    if (MIN_SEED_LEN..=MAX_SEED_LEN).contains(&seed.len()) {
        Ok(())
    } else {
        Err(Error::Derivation(format!("Invalid seed length: {} bytes", seed.len())))
    }
}

/// Reject account indices that would collide with the hardened range
pub(crate) fn check_account_index(index: u32) -> Result<()> {
    if index < HARDENED_OFFSET {
        Ok(())
    } else {
        Err(Error::Derivation(format!("Account index out of range: {}", index)))
    }
}

/// Split a 64-byte HMAC-SHA512 output into (key, chain code)
pub(crate) fn split_hmac_output(output: &[u8]) -> ([u8; 32], [u8; 32]) {
    let mut key = [0u8; 32];
    let mut chain_code = [0u8; 32];
    key.copy_from_slice(&output[0..32]);
    chain_code.copy_from_slice(&output[32..64]);
    (key, chain_code)
}
