//! Conversion between base units (wei, lamports) and display units (ETH, SOL)

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use crate::crypto::keys::Chain;
use crate::error::{Error, Result};

/// Convert a base-unit amount into the chain's display unit
pub fn from_base_units(chain: Chain, amount: u128) -> Result<Decimal> {
    let mantissa = i128::try_from(amount)
        .map_err(|_| Error::InvalidAmount(format!("{} amount out of range: {}", chain, amount)))?;

    Decimal::try_from_i128_with_scale(mantissa, chain.decimals())
        .map(|value| value.normalize())
        .map_err(|_| Error::InvalidAmount(format!("{} amount out of range: {}", chain, amount)))
}

/// Convert a display-unit amount into base units, truncating sub-unit dust.
///
/// The amount must be strictly positive and at least one base unit.
pub fn to_base_units(chain: Chain, amount: Decimal) -> Result<u128> {
    if amount <= Decimal::ZERO {
        return Err(Error::InvalidAmount(format!("amount must be positive, got {}", amount)));
    }

    let factor = Decimal::from(10u64.pow(chain.decimals()));
    let base = amount
        .checked_mul(factor)
        .and_then(|scaled| scaled.trunc().to_u128())
        .ok_or_else(|| {
            Error::InvalidAmount(format!("{} {} is out of range", amount, chain.symbol()))
        })?;

    if base == 0 {
        return Err(Error::InvalidAmount(format!(
            "{} {} is below the smallest unit",
            amount,
            chain.symbol()
        )));
    }

    Ok(base)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_from_base_units() {
        assert_eq!(
            from_base_units(Chain::Ethereum, 1_500_000_000_000_000_000).unwrap(),
            dec("1.5")
        );
        assert_eq!(from_base_units(Chain::Solana, 1).unwrap(), dec("0.000000001"));
        assert_eq!(from_base_units(Chain::Solana, 0).unwrap(), Decimal::ZERO);
        assert!(from_base_units(Chain::Ethereum, u128::MAX).is_err());
    }

    #[test]
    fn test_to_base_units() {
        assert_eq!(to_base_units(Chain::Ethereum, dec("0.01")).unwrap(), 10_000_000_000_000_000);
        assert_eq!(to_base_units(Chain::Solana, dec("2.5")).unwrap(), 2_500_000_000);
        // Sub-lamport dust is truncated
        assert_eq!(to_base_units(Chain::Solana, dec("1.0000000019")).unwrap(), 1_000_000_001);
    }

    #[test]
    fn test_to_base_units_rejects_bad_amounts() {
        for amount in [Decimal::ZERO, dec("-1"), dec("0.0000000001")] {
            assert!(matches!(
                to_base_units(Chain::Solana, amount),
                Err(Error::InvalidAmount(_))
            ));
        }
    }
}
