//! Mnemonic phrase generation, import and seed derivation

use std::fmt;
use std::sync::Arc;

pub use bip39::Mnemonic;
use rand::{rngs::OsRng, RngCore};
use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::storage::{KeyValueStore, MNEMONIC_KEY};

/// Entropy of a freshly generated mnemonic: 128 bits, 12 words
const ENTROPY_BYTES: usize = 16;

/// The 64-byte BIP-39 seed of a mnemonic
#[derive(Clone, PartialEq, Eq)]
pub struct Seed([u8; 64]);

impl Seed {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for Seed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Seed(..)")
    }
}

/// Generate a new random 12-word mnemonic
pub fn generate_mnemonic() -> Result<Mnemonic> {
    let mut entropy = [0u8; ENTROPY_BYTES];
    OsRng.fill_bytes(&mut entropy);

    Mnemonic::from_entropy(&entropy)
        .map_err(|e| Error::InvalidMnemonic(e.to_string()))
}

/// Parse a mnemonic phrase, checking wordlist membership and checksum.
///
/// Surrounding whitespace, repeated spaces and letter case are normalized first.
pub fn parse_mnemonic(phrase: &str) -> Result<Mnemonic> {
    let normalized = phrase
        .split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ");

    Mnemonic::parse_normalized(&normalized)
        .map_err(|e| Error::InvalidMnemonic(e.to_string()))
}

/// PBKDF2-HMAC-SHA512 seed of a mnemonic with an empty passphrase
pub fn mnemonic_to_seed(mnemonic: &Mnemonic) -> Seed {
    Seed(mnemonic.to_seed(""))
}

/// Owns the wallet mnemonic and hands out its seed
#[derive(Clone)]
pub struct SeedProvider {
    store: Arc<dyn KeyValueStore>,
}

impl SeedProvider {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// The persisted mnemonic, if one exists
    pub fn current_mnemonic(&self) -> Result<Option<Mnemonic>> {
        match self.store.get(MNEMONIC_KEY)? {
            Some(phrase) => parse_mnemonic(&phrase).map(Some),
            None => Ok(None),
        }
    }

    /// Return the persisted mnemonic, generating and persisting one if absent.
    ///
    /// Never overwrites an existing mnemonic. A stored phrase that fails to
    /// parse is reported rather than replaced.
    pub fn ensure_mnemonic(&self) -> Result<Mnemonic> {
        if let Some(mnemonic) = self.current_mnemonic()? {
            return Ok(mnemonic);
        }

        let mnemonic = generate_mnemonic()?;
        self.store.set(MNEMONIC_KEY, &mnemonic.to_string())?;
        info!(words = mnemonic.word_count(), "generated new mnemonic");

        Ok(mnemonic)
    }

    /// Validate `phrase` and make it the current mnemonic.
    ///
    /// Accounts already in the registry keep the keys they were derived with.
    pub fn import_mnemonic(&self, phrase: &str) -> Result<Mnemonic> {
        let mnemonic = parse_mnemonic(phrase)?;

        if self.store.get(MNEMONIC_KEY)?.is_some() {
            warn!("replacing existing mnemonic; previously derived accounts are not re-keyed");
        }
        self.store.set(MNEMONIC_KEY, &mnemonic.to_string())?;
        info!(words = mnemonic.word_count(), "imported mnemonic");

        Ok(mnemonic)
    }

    /// Seed of the current mnemonic, or `MnemonicMissing`
    pub fn current_seed(&self) -> Result<Seed> {
        self.current_mnemonic()?
            .map(|mnemonic| Self::seed_of(&mnemonic))
            .ok_or(Error::MnemonicMissing)
    }

    /// Pure seed derivation
    pub fn seed_of(mnemonic: &Mnemonic) -> Seed {
        mnemonic_to_seed(mnemonic)
    }
}
