//! EIP-712 terms-acceptance message.

use alloy::primitives::{Address, Signature, B256, U256};
use alloy::sol;
use alloy::sol_types::{Eip712Domain, SolStruct};
use anyhow::{anyhow, Context, Result};

use crate::chain::BASE_MAINNET_CHAIN_ID;

pub const DEFAULT_DOMAIN_NAME: &str = "Vaultify";
pub const DOMAIN_VERSION: &str = "1";
pub const TERMS_AGREEMENT: &str =
    "I accept the Terms & Conditions and understand the risks of Web3 investment";

sol! {
    #[allow(missing_docs)]
    struct Terms {
        address user;
        string agreement;
        uint256 timestamp;
    }
}

/// Domain the acceptance message is bound to.
#[derive(Debug, Clone)]
pub struct TermsDomain {
    pub name: String,
    pub chain_id: u64,
}

impl Default for TermsDomain {
    fn default() -> Self {
        Self {
            name: DEFAULT_DOMAIN_NAME.to_string(),
            chain_id: BASE_MAINNET_CHAIN_ID,
        }
    }
}

impl TermsDomain {
    pub fn new(name: impl Into<String>, chain_id: u64) -> Self {
        Self {
            name: name.into(),
            chain_id,
        }
    }

    pub fn eip712_domain(&self) -> Eip712Domain {
        Eip712Domain::new(
            Some(self.name.clone().into()),
            Some(DOMAIN_VERSION.into()),
            Some(U256::from(self.chain_id)),
            None,
            None,
        )
    }

    /// Digest the wallet signs for `user` accepting the terms at `timestamp`.
    pub fn signing_hash(&self, user: Address, timestamp: u64) -> B256 {
        let terms = Terms {
            user,
            agreement: TERMS_AGREEMENT.to_string(),
            timestamp: U256::from(timestamp),
        };
        terms.eip712_signing_hash(&self.eip712_domain())
    }
}

/// Parse a 65-byte `r || s || v` signature from hex (with or without `0x`).
pub fn parse_signature(signature: &str) -> Result<Signature> {
    let raw = signature.trim();
    let raw = raw.strip_prefix("0x").unwrap_or(raw);
    let bytes = hex::decode(raw).context("signature is not hex")?;
    if bytes.len() != 65 {
        return Err(anyhow!("signature must be 65 bytes, got {}", bytes.len()));
    }
    Signature::try_from(bytes.as_slice()).map_err(|e| anyhow!("invalid signature: {}", e))
}

pub fn recover_signer(hash: &B256, signature: &Signature) -> Result<Address> {
    signature
        .recover_address_from_prehash(hash)
        .map_err(|e| anyhow!("signature recovery failed: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::signers::{local::PrivateKeySigner, SignerSync};

    const TEST_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    #[test]
    fn test_recovers_signer_of_terms() {
        let signer: PrivateKeySigner = TEST_KEY.parse().unwrap();
        let domain = TermsDomain::default();
        let hash = domain.signing_hash(signer.address(), 1_700_000_000);

        let sig = signer.sign_hash_sync(&hash).unwrap();
        let encoded = format!("0x{}", hex::encode(sig.as_bytes()));

        let parsed = parse_signature(&encoded).unwrap();
        assert_eq!(recover_signer(&hash, &parsed).unwrap(), signer.address());
    }

    #[test]
    fn test_hash_binds_every_field() {
        let domain = TermsDomain::default();
        let user = Address::repeat_byte(0x11);
        let base = domain.signing_hash(user, 1_700_000_000);

        assert_ne!(base, domain.signing_hash(user, 1_700_000_001));
        assert_ne!(base, domain.signing_hash(Address::repeat_byte(0x22), 1_700_000_000));
        assert_ne!(base, TermsDomain::new("Vaultify", 84532).signing_hash(user, 1_700_000_000));
        assert_ne!(base, TermsDomain::new("Other", 8453).signing_hash(user, 1_700_000_000));
    }

    #[test]
    fn test_parse_signature_rejects_garbage() {
        assert!(parse_signature("0x1234").is_err());
        assert!(parse_signature("not hex at all").is_err());
        assert!(parse_signature(&format!("0x{}", "ab".repeat(64))).is_err());
    }
}
