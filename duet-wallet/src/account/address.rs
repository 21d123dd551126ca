//! Address validation

use crate::crypto::keys::{ethereum, Chain};

/// Whether `text` is a syntactically valid address on `chain`.
///
/// Ethereum: 40 hex digits with an optional `0x` prefix. All-lowercase and
/// all-uppercase forms are accepted as-is; mixed case must match the EIP-55
/// checksum. Solana: base-58 that decodes to exactly 32 bytes.
pub fn is_valid_address(chain: Chain, text: &str) -> bool {
    match chain {
        Chain::Ethereum => is_valid_ethereum_address(text),
        Chain::Solana => is_valid_solana_address(text),
    }
}

/// Whether two addresses on `chain` name the same account.
///
/// Ethereum addresses compare case-insensitively; Solana addresses exactly.
pub fn addresses_match(chain: Chain, a: &str, b: &str) -> bool {
    match chain {
        Chain::Ethereum => a.eq_ignore_ascii_case(b),
        Chain::Solana => a == b,
    }
}

fn is_valid_ethereum_address(text: &str) -> bool {
    let digits = text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
        .unwrap_or(text);

    if digits.len() != 40 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return false;
    }

    let has_lower = digits.chars().any(|c| c.is_ascii_lowercase());
    let has_upper = digits.chars().any(|c| c.is_ascii_uppercase());
    if !(has_lower && has_upper) {
        return true;
    }

    ethereum::apply_checksum(&digits.to_ascii_lowercase()) == digits
}

fn is_valid_solana_address(text: &str) -> bool {
    match bs58::decode(text).into_vec() {
        Ok(bytes) => bytes.len() == 32,
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_ethereum_address() {
        assert!(is_valid_address(Chain::Ethereum, "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed"));
        assert!(is_valid_address(Chain::Ethereum, "0x5aaeb6053f3e94c9b9a09f33669435e7ef1beaed"));
        assert!(is_valid_address(Chain::Ethereum, "0x5AAEB6053F3E94C9B9A09F33669435E7EF1BEAED"));
        assert!(is_valid_address(Chain::Ethereum, "5aaeb6053f3e94c9b9a09f33669435e7ef1beaed"));
        assert!(is_valid_address(Chain::Ethereum, &format!("0x{}", "a".repeat(40))));

        // Too short, too long, bad hex, broken checksum
        assert!(!is_valid_address(Chain::Ethereum, &format!("0x{}", "a".repeat(39))));
        assert!(!is_valid_address(Chain::Ethereum, &format!("0x{}", "a".repeat(41))));
        assert!(!is_valid_address(Chain::Ethereum, "0xZZZeb6053F3E94C9b9A09f33669435E7Ef1BeAed"));
        assert!(!is_valid_address(Chain::Ethereum, "0x5AAeb6053F3E94C9b9A09f33669435E7Ef1BeAed"));
        assert!(!is_valid_address(Chain::Ethereum, ""));
    }

    #[test]
    fn test_validate_solana_address() {
        assert!(is_valid_address(Chain::Solana, "11111111111111111111111111111111"));
        assert!(is_valid_address(Chain::Solana, "vines1vzrYbzLMRdu58ou5XTby4qAqVRLmqo36NKPTg"));
        assert!(is_valid_address(Chain::Solana, &bs58::encode([9u8; 32]).into_string()));

        assert!(!is_valid_address(Chain::Solana, "not-base58-!!"));
        assert!(!is_valid_address(Chain::Solana, &bs58::encode([9u8; 31]).into_string()));
        assert!(!is_valid_address(Chain::Solana, &bs58::encode([9u8; 33]).into_string()));
        // '0' is outside the base-58 alphabet
        assert!(!is_valid_address(Chain::Solana, "0vines1vzrYbzLMRdu58ou5XTby4qAqVRLmqo36NKP"));
    }

    #[test]
    fn test_addresses_match() {
        assert!(addresses_match(
            Chain::Ethereum,
            "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed",
            "0x5aaeb6053f3e94c9b9a09f33669435e7ef1beaed"
        ));
        assert!(!addresses_match(
            Chain::Solana,
            "vines1vzrYbzLMRdu58ou5XTby4qAqVRLmqo36NKPTg",
            "VINES1VZRYBZLMRDU58OU5XTBY4QAQVRLMQO36NKPTG"
        ));
    }

    #[test]
    fn test_addresses_are_chain_specific() {
        assert!(!is_valid_address(Chain::Solana, "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed"));
        assert!(!is_valid_address(Chain::Ethereum, "vines1vzrYbzLMRdu58ou5XTby4qAqVRLmqo36NKPTg"));
    }
}
