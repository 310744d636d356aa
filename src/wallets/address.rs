//! EVM address helpers: validation, normalisation and generation.

use alloy::primitives::Address;
use anyhow::{bail, Result};
use rand::Rng;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::ServiceError;

/// `0x` followed by exactly 40 hex characters.
pub fn is_valid_address(address: &str) -> bool {
    let Some(hex) = address.strip_prefix("0x") else {
        return false;
    };
    hex.len() == 40
        && hex.chars().all(|c| c.is_ascii_hexdigit())
        && Address::from_str(address).is_ok()
}

/// Lower-cased, trimmed form used as a lookup key.
pub fn normalize_address(address: &str) -> String {
    address.trim().to_lowercase()
}

/// Validate and return the EIP-55 checksummed form.
pub fn validate_address(address: &str) -> Result<String, ServiceError> {
    let trimmed = address.trim();
    if !is_valid_address(trimmed) {
        return Err(ServiceError::InvalidAddress(trimmed.to_string()));
    }
    let parsed = Address::from_str(trimmed)
        .map_err(|_| ServiceError::InvalidAddress(trimmed.to_string()))?;
    Ok(parsed.to_checksum(None))
}

/// Fresh random address standing in for a provisioned custodial account.
pub fn generate_address() -> Result<String> {
    let bytes: [u8; 20] = rand::thread_rng().gen();
    let address = Address::from(bytes).to_checksum(None);

    if !is_valid_address(&address) {
        bail!("Failed to generate valid address");
    }

    Ok(address)
}

pub fn generate_wallet_id() -> String {
    format!("wallet_{}", Uuid::new_v4().simple())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_validation() {
        assert!(is_valid_address("0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913"));
        assert!(is_valid_address("0x0000000000000000000000000000000000000000"));
        assert!(!is_valid_address("833589fCD6eDb6E08f4c7C32D4f71b54bdA02913"));
        assert!(!is_valid_address("0x833589fCD6eDb6E08f4c7C32D4f71b54bdA0291"));
        assert!(!is_valid_address("0xZZ3589fCD6eDb6E08f4c7C32D4f71b54bdA02913"));
        assert!(!is_valid_address(""));
    }

    #[test]
    fn test_validate_returns_checksummed() {
        let checksummed =
            validate_address("0x833589fcd6edb6e08f4c7c32d4f71b54bda02913").unwrap();
        assert_eq!(checksummed, "0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913");

        let err = validate_address("0x1234").unwrap_err();
        assert!(matches!(err, ServiceError::InvalidAddress(_)));
    }

    #[test]
    fn test_normalize_address() {
        assert_eq!(
            normalize_address("  0xABCDEF0000000000000000000000000000000001 "),
            "0xabcdef0000000000000000000000000000000001"
        );
    }

    #[test]
    fn test_generated_addresses_are_valid_and_distinct() {
        let a = generate_address().unwrap();
        let b = generate_address().unwrap();
        assert!(is_valid_address(&a));
        assert!(is_valid_address(&b));
        assert_ne!(a, b);
        assert!(generate_wallet_id().starts_with("wallet_"));
    }
}
