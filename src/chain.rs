//! Chain constants and the USD / on-chain precision boundary.

use anyhow::{anyhow, Result};
use num_bigint::BigUint;

pub const BASE_MAINNET_CHAIN_ID: u64 = 8453;
pub const BASE_SEPOLIA_CHAIN_ID: u64 = 84532;

pub const USDC_BASE: &str = "0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913";
pub const USDC_BASE_SEPOLIA: &str = "0x036CbD53842c5426634e7929541eC2318f3dCF7e";

/// Stablecoin amounts settle with 6 decimal places
pub const USDC_DECIMALS: u32 = 6;

/// USDC contract for a chain; unknown chains fall back to the testnet token.
pub fn usdc_address(chain_id: u64) -> &'static str {
    match chain_id {
        BASE_MAINNET_CHAIN_ID => USDC_BASE,
        BASE_SEPOLIA_CHAIN_ID => USDC_BASE_SEPOLIA,
        _ => USDC_BASE_SEPOLIA,
    }
}

/// Convert a decimal amount into integer token base units, rounding at `decimals` places.
pub fn to_base_units(amount: f64, decimals: u32) -> Result<BigUint> {
    if !amount.is_finite() || amount < 0.0 {
        return Err(anyhow!("cannot convert {} into token units", amount));
    }

    let fixed = format!("{:.*}", decimals as usize, amount);
    let digits: String = fixed.chars().filter(|c| *c != '.').collect();
    BigUint::parse_bytes(digits.as_bytes(), 10)
        .ok_or_else(|| anyhow!("cannot convert {} into token units", amount))
}

/// Round a USD figure to cents for display
pub fn round_usd(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usdc_address_by_chain() {
        assert_eq!(usdc_address(8453), USDC_BASE);
        assert_eq!(usdc_address(84532), USDC_BASE_SEPOLIA);
        assert_eq!(usdc_address(1), USDC_BASE_SEPOLIA);
    }

    #[test]
    fn test_to_base_units_uses_token_precision() {
        assert_eq!(
            to_base_units(1500.25, USDC_DECIMALS).unwrap(),
            BigUint::from(1_500_250_000u64)
        );
        assert_eq!(to_base_units(0.0000004, USDC_DECIMALS).unwrap(), BigUint::from(0u32));
        assert_eq!(to_base_units(0.0000006, USDC_DECIMALS).unwrap(), BigUint::from(1u32));
        assert_eq!(to_base_units(42.0, 0).unwrap(), BigUint::from(42u32));
    }

    #[test]
    fn test_to_base_units_rejects_bad_input() {
        assert!(to_base_units(-1.0, USDC_DECIMALS).is_err());
        assert!(to_base_units(f64::NAN, USDC_DECIMALS).is_err());
        assert!(to_base_units(f64::INFINITY, USDC_DECIMALS).is_err());
    }

    #[test]
    fn test_round_usd() {
        assert_eq!(round_usd(2999.999), 3000.0);
        assert_eq!(round_usd(12.344), 12.34);
    }
}
