//! Ethereum key derivation (BIP-32 over secp256k1)

use hmac::{Hmac, Mac};
use secp256k1::{PublicKey as Secp256k1PublicKey, Scalar, Secp256k1, SecretKey, Signing};
use sha2::Sha512;
use sha3::{Digest, Keccak256};
use tracing::debug;

use crate::error::{Error, Result};
use super::derivation::{
    check_account_index, check_seed, split_hmac_output, Account, Chain, DerivationPath,
    EthereumAccount, KeyDeriver,
};

/// BIP-32 deriver for Ethereum accounts at `m/44'/60'/0'/0/{index}`
#[derive(Debug, Clone, Copy, Default)]
pub struct Secp256k1Deriver;

impl Secp256k1Deriver {
    pub fn new() -> Self {
        Self
    }
}

impl KeyDeriver for Secp256k1Deriver {
    fn chain(&self) -> Chain {
        Chain::Ethereum
    }

    fn derive(&self, seed: &[u8], index: u32) -> Result<Account> {
        check_account_index(index)?;
        let path = DerivationPath::ethereum(index);
        let (secret, _) = derive_private_key(seed, &path)?;

        let secp = Secp256k1::new();
        let secret_key = SecretKey::from_slice(&secret)
            .map_err(|e| Error::Derivation(format!("Invalid secret key: {}", e)))?;
        let public_key = Secp256k1PublicKey::from_secret_key(&secp, &secret_key);
        let address = public_key_to_address(&public_key);

        debug!(%path, %address, "derived ethereum account");

        Ok(Account::Ethereum(EthereumAccount {
            index,
            public_key: address,
            private_key: format!("0x{}", hex::encode(secret_key.secret_bytes())),
        }))
    }
}

/// Walk `path` from the BIP-32 master key of `seed`, returning (private key, chain code)
pub fn derive_private_key(seed: &[u8], path: &DerivationPath) -> Result<([u8; 32], [u8; 32])> {
    check_seed(seed)?;
    let secp = Secp256k1::new();

    let (mut secret_key, mut chain_code) = derive_master_key(seed)?;
    for segment in path.segments() {
        (secret_key, chain_code) =
            derive_child_key(&secp, &secret_key, &chain_code, segment.to_u32())?;
    }

    Ok((secret_key.secret_bytes(), chain_code))
}

/// Derive the master key from a seed
fn derive_master_key(seed: &[u8]) -> Result<(SecretKey, [u8; 32])> {
    let mut hmac = Hmac::<Sha512>::new_from_slice(b"Bitcoin seed")
        .map_err(|_| Error::Derivation("HMAC error".to_string()))?;

    hmac.update(seed);
    let result = hmac.finalize().into_bytes();
    let (key, chain_code) = split_hmac_output(&result);

    let secret_key = SecretKey::from_slice(&key)
        .map_err(|e| Error::Derivation(format!("Invalid master key: {}", e)))?;

    Ok((secret_key, chain_code))
}

/// CKDpriv: derive a child private key from a parent private key
fn derive_child_key<C: Signing>(
    secp: &Secp256k1<C>,
    parent_key: &SecretKey,
    parent_chain_code: &[u8; 32],
    index: u32,
) -> Result<(SecretKey, [u8; 32])> {
    let mut data = Vec::with_capacity(37);

    if index >= super::derivation::HARDENED_OFFSET {
        data.push(0);
        data.extend_from_slice(&parent_key.secret_bytes());
    } else {
        let parent_public_key = Secp256k1PublicKey::from_secret_key(secp, parent_key);
        data.extend_from_slice(&parent_public_key.serialize());
    }
    data.extend_from_slice(&index.to_be_bytes());

    let mut hmac = Hmac::<Sha512>::new_from_slice(parent_chain_code)
        .map_err(|_| Error::Derivation("HMAC error".to_string()))?;

    hmac.update(&data);
    let result = hmac.finalize().into_bytes();
    let (tweak, child_chain_code) = split_hmac_output(&result);

    // IL >= n or a zero child key make this index invalid
    let tweak = Scalar::from_be_bytes(tweak)
        .map_err(|_| Error::Derivation(format!("Child key out of range at index {}", index)))?;
    let child_key = parent_key.add_tweak(&tweak)
        .map_err(|e| Error::Derivation(format!("Invalid child key at index {}: {}", index, e)))?;

    Ok((child_key, child_chain_code))
}

/// Get the EIP-55 checksummed Ethereum address of a public key
pub fn public_key_to_address(public_key: &Secp256k1PublicKey) -> String {
    // Skip the 0x04 prefix of the uncompressed encoding
    let key_hash = keccak256(&public_key.serialize_uncompressed()[1..]);
    to_checksum_address(&key_hash[12..])
}

/// Format 20 address bytes with the EIP-55 mixed-case checksum
pub fn to_checksum_address(address: &[u8]) -> String {
    let lower = hex::encode(address);
    format!("0x{}", apply_checksum(&lower))
}

/// Apply EIP-55 casing to 40 lower-case hex characters (no prefix)
pub(crate) fn apply_checksum(lower_hex: &str) -> String {
    let hash = keccak256(lower_hex.as_bytes());

    lower_hex
        .chars()
        .enumerate()
        .map(|(i, c)| {
            let nibble = (hash[i / 2] >> (if i % 2 == 0 { 4 } else { 0 })) & 0x0f;
            if c.is_ascii_alphabetic() && nibble >= 8 {
                c.to_ascii_uppercase()
            } else {
                c
            }
        })
        .collect()
}

/// Calculate the Keccak-256 hash of data
fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    hasher.finalize().into()
}

#[cfg(test)]
mod tests {
    use super::*;

    // BIP-32 test vector 1
    const VECTOR_SEED: &str = "000102030405060708090a0b0c0d0e0f";

    fn vector_key(path: &str) -> (String, String) {
        let seed = hex::decode(VECTOR_SEED).unwrap();
        let (key, chain_code) = derive_private_key(&seed, &path.parse().unwrap()).unwrap();
        (hex::encode(key), hex::encode(chain_code))
    }

    #[test]
    fn test_bip32_vector_master() {
        let (key, chain_code) = vector_key("m");
        assert_eq!(key, "e8f32e723decf4051aefac8e2c93c9c5b214313817cdccf3cdbcd6a31ba4a9a3");
        assert_eq!(chain_code, "873dff81c02f525623fd1fe5167eac3a55a049de3d314bb42ee227ffed37d508");
    }

    #[test]
    fn test_bip32_vector_hardened_child() {
        let (key, _) = vector_key("m/0'");
        assert_eq!(key, "edb2e14f9ee77d26dd93b4ecede8d16ed408ce149b6cd80b0715a2d911a0afea");
    }

    #[test]
    fn test_bip32_vector_mixed_chain() {
        let (key, _) = vector_key("m/0'/1/2'/2/1000000000");
        assert_eq!(key, "471b76e389e528d6de6d816857e012c5455051cad6660850e58372a6c3e6e7c8");
    }

    #[test]
    fn test_checksum_address() {
        // EIP-55 reference addresses
        for expected in [
            "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed",
            "0xfB6916095ca1df60bB79Ce92cE3Ea74c37c5d359",
            "0xdbF03B407c01E7cD3CBea99509d93f8DDDC8C6FB",
            "0xD1220A0cf47c7B9Be7A2E6BA89F429762e7b9aDb",
        ] {
            let bytes = hex::decode(&expected[2..].to_lowercase()).unwrap();
            assert_eq!(to_checksum_address(&bytes), expected);
        }
    }

    #[test]
    fn test_rejects_bad_seed_length() {
        let deriver = Secp256k1Deriver::new();
        assert!(matches!(deriver.derive(&[0u8; 8], 0), Err(Error::Derivation(_))));
        assert!(matches!(deriver.derive(&[0u8; 65], 0), Err(Error::Derivation(_))));
    }
}
