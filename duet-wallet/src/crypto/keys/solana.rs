//! Solana key derivation (SLIP-0010 over Ed25519)
//!
//! Ed25519 has no public-key child derivation, so every step below the
//! master key is hardened regardless of how the path segment is written.

use ed25519_dalek::{SigningKey, VerifyingKey};
use hmac::{Hmac, Mac};
use sha2::Sha512;
use tracing::debug;

use crate::error::{Error, Result};
use super::derivation::{
    check_account_index, check_seed, split_hmac_output, Account, Chain, DerivationPath,
    KeyDeriver, SolanaAccount, HARDENED_OFFSET,
};

/// SLIP-0010 deriver for Solana accounts at `m/44'/501'/{index}'/0'`
#[derive(Debug, Clone, Copy, Default)]
pub struct Ed25519Deriver;

impl Ed25519Deriver {
    pub fn new() -> Self {
        Self
    }
}

impl KeyDeriver for Ed25519Deriver {
    fn chain(&self) -> Chain {
        Chain::Solana
    }

    fn derive(&self, seed: &[u8], index: u32) -> Result<Account> {
        check_account_index(index)?;
        let path = DerivationPath::solana(index);
        let (secret_key, _) = derive_private_key(seed, &path)?;

        let signing_key = SigningKey::from_bytes(&secret_key);
        let address = public_key_to_address(&signing_key.verifying_key());

        debug!(%path, %address, "derived solana account");

        Ok(Account::Solana(SolanaAccount {
            index,
            public_key: address,
            private_key: bs58::encode(signing_key.to_keypair_bytes()).into_string(),
        }))
    }
}

/// Walk `path` from the SLIP-0010 master key of `seed`, returning (private key, chain code)
pub fn derive_private_key(seed: &[u8], path: &DerivationPath) -> Result<([u8; 32], [u8; 32])> {
    check_seed(seed)?;

    let (mut secret_key, mut chain_code) = derive_master_key(seed)?;
    for segment in path.segments() {
        (secret_key, chain_code) = derive_child_key(&secret_key, &chain_code, segment.index)?;
    }

    Ok((secret_key, chain_code))
}

/// Derive the master key from a seed
fn derive_master_key(seed: &[u8]) -> Result<([u8; 32], [u8; 32])> {
    let mut hmac = Hmac::<Sha512>::new_from_slice(b"ed25519 seed")
        .map_err(|_| Error::Derivation("HMAC error".to_string()))?;

    hmac.update(seed);
    let result = hmac.finalize().into_bytes();

    Ok(split_hmac_output(&result))
}

/// Hardened child step: `HMAC-SHA512(chain code, 0x00 || key || ser32(index | 2^31))`
fn derive_child_key(
    parent_key: &[u8; 32],
    parent_chain_code: &[u8; 32],
    index: u32,
) -> Result<([u8; 32], [u8; 32])> {
    let hardened_index = index | HARDENED_OFFSET;

    let mut data = Vec::with_capacity(37);
    data.push(0);
    data.extend_from_slice(parent_key);
    data.extend_from_slice(&hardened_index.to_be_bytes());

    let mut hmac = Hmac::<Sha512>::new_from_slice(parent_chain_code)
        .map_err(|_| Error::Derivation("HMAC error".to_string()))?;

    hmac.update(&data);
    let result = hmac.finalize().into_bytes();

    Ok(split_hmac_output(&result))
}

/// Get the Solana address (base-58) of a public key
pub fn public_key_to_address(public_key: &VerifyingKey) -> String {
    bs58::encode(public_key.to_bytes()).into_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    // SLIP-0010 ed25519 test vector 1
    const VECTOR_SEED: &str = "000102030405060708090a0b0c0d0e0f";

    fn vector_key(path: &str) -> ([u8; 32], [u8; 32]) {
        let seed = hex::decode(VECTOR_SEED).unwrap();
        derive_private_key(&seed, &path.parse().unwrap()).unwrap()
    }

    #[test]
    fn test_slip10_vector_master() {
        let (key, chain_code) = vector_key("m");
        assert_eq!(
            hex::encode(key),
            "2b4be7f19ee27bbf30c667b642d5f4aa69fd169872f8fc3059c08ebae2eb19e7"
        );
        assert_eq!(
            hex::encode(chain_code),
            "90046a93de5380a72b5e45010748567d5ea02bbf6522f979e05c0d8d8ca9fffb"
        );

        let public = SigningKey::from_bytes(&key).verifying_key();
        assert_eq!(
            hex::encode(public.to_bytes()),
            "a4b2856bfec510abab89753fac1ac0e1112364e7d250545963f135f2a33188ed"
        );
    }

    #[test]
    fn test_slip10_vector_first_child() {
        let (key, chain_code) = vector_key("m/0'");
        assert_eq!(
            hex::encode(key),
            "68e0fe46dfb67e368c75379acec591dad19df3cde26e63b93a8e704f1dade7a3"
        );
        assert_eq!(
            hex::encode(chain_code),
            "8b59aa11380b624e81507a27fedda59fea6d0b779a778918a2fd3590e16e9c69"
        );
    }

    #[test]
    fn test_unhardened_segments_are_hardened() {
        assert_eq!(vector_key("m/0"), vector_key("m/0'"));
    }

    #[test]
    fn test_private_key_is_keypair() {
        let seed = [7u8; 64];
        let account = Ed25519Deriver::new().derive(&seed, 0).unwrap();

        let keypair = bs58::decode(account.private_key()).into_vec().unwrap();
        assert_eq!(keypair.len(), 64);
        assert_eq!(bs58::encode(&keypair[32..]).into_string(), account.address());
    }

    #[test]
    fn test_rejects_bad_seed_length() {
        let deriver = Ed25519Deriver::new();
        assert!(matches!(deriver.derive(&[], 0), Err(Error::Derivation(_))));
        assert!(matches!(deriver.derive(&[1u8; 15], 0), Err(Error::Derivation(_))));
    }
}
