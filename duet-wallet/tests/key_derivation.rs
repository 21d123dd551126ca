//! Tests for key derivation

use std::collections::HashSet;

use duet_wallet::crypto::mnemonic::*;
use duet_wallet::crypto::keys::*;

const MNEMONIC: &str = "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";

fn seed() -> Seed {
    mnemonic_to_seed(&parse_mnemonic(MNEMONIC).unwrap())
}

#[test]
fn test_ethereum_key_derivation() {
    let account = Secp256k1Deriver.derive(seed().as_bytes(), 0).unwrap();

    assert_eq!(account.chain(), Chain::Ethereum);
    assert_eq!(account.address(), "0x9858EfFD232B4033E47d90003D41EC34EcaEda94");
    assert_eq!(
        account.private_key(),
        "0x1ab42cc412b618bdea3a599e3c9bae199ebf030895b039e9db1e30dafb12b727"
    );
    assert_eq!(account.derivation_path().to_string(), "m/44'/60'/0'/0/0");
}

#[test]
fn test_solana_key_derivation() {
    let account = Ed25519Deriver.derive(seed().as_bytes(), 0).unwrap();

    assert_eq!(account.chain(), Chain::Solana);
    assert_eq!(account.address(), "HAgk14JpMQLgt6rVgv7cBQFJWFto5Dqxi472uT3DKpqk");
    assert_eq!(account.derivation_path().to_string(), "m/44'/501'/0'/0'");

    let keypair = bs58::decode(account.private_key()).into_vec().unwrap();
    assert_eq!(keypair.len(), 64);
    assert_eq!(bs58::encode(&keypair[32..]).into_string(), account.address());
}

#[test]
fn test_derivation_is_deterministic() {
    let seed = seed();

    for chain in Chain::ALL {
        let deriver = deriver_for(chain);
        for index in [0, 1, 7, 1000] {
            let first = deriver.derive(seed.as_bytes(), index).unwrap();
            let second = deriver.derive(seed.as_bytes(), index).unwrap();
            assert_eq!(first, second);
            assert_eq!(first.index(), index);
        }
    }
}

#[test]
fn test_indices_yield_distinct_addresses() {
    let seed = seed();

    for chain in Chain::ALL {
        let deriver = deriver_for(chain);
        let addresses: HashSet<String> = (0..100)
            .map(|index| deriver.derive(seed.as_bytes(), index).unwrap().address().to_string())
            .collect();
        assert_eq!(addresses.len(), 100, "{} addresses collide", chain);
    }
}

#[test]
fn test_chains_do_not_share_keys() {
    let seed = seed();
    let ethereum = Secp256k1Deriver.derive(seed.as_bytes(), 0).unwrap();
    let solana = Ed25519Deriver.derive(seed.as_bytes(), 0).unwrap();

    let ethereum_secret = hex::decode(ethereum.private_key().trim_start_matches("0x")).unwrap();
    let solana_secret = bs58::decode(solana.private_key()).into_vec().unwrap();
    assert_ne!(ethereum_secret[..], solana_secret[..32]);
}

#[test]
fn test_different_mnemonics_yield_different_accounts() {
    let other = generate_mnemonic().unwrap();
    let other_seed = mnemonic_to_seed(&other);

    let ours = Secp256k1Deriver.derive(seed().as_bytes(), 0).unwrap();
    let theirs = Secp256k1Deriver.derive(other_seed.as_bytes(), 0).unwrap();
    assert_ne!(ours.address(), theirs.address());
}

#[test]
fn test_account_serialization_shape() {
    let account = Ed25519Deriver.derive(seed().as_bytes(), 3).unwrap();
    let json = serde_json::to_value(&account).unwrap();

    assert_eq!(json["chain"], "Solana");
    assert_eq!(json["index"], 3);
    assert_eq!(json["publicKey"], account.address());
    assert_eq!(json["privateKey"], account.private_key());

    let back: Account = serde_json::from_value(json).unwrap();
    assert_eq!(back, account);
}
