use alloy::primitives::Address;
use chrono::Utc;
use std::{str::FromStr, sync::Arc};
use tracing::{info, warn};

use super::jwt::JwtHandler;
use super::typed_data::{parse_signature, recover_signer, TermsDomain};
use super::AuthError;
use crate::wallets::{is_valid_address, WalletMapper};

/// Signatures older than this are stale.
pub const MAX_SIGNATURE_AGE_SECS: i64 = 300;
/// Tolerated client clock skew into the future.
pub const MAX_CLOCK_SKEW_SECS: i64 = 60;

/// Issued on successful verification.
#[derive(Debug, Clone)]
pub struct Session {
    pub address: String,
    pub token: String,
    pub expires_in: usize,
    pub sub_wallet_address: Option<String>,
}

/// Acceptance window check, in unix seconds.
pub fn check_window(timestamp: i64, now: i64) -> Result<(), AuthError> {
    let age = now - timestamp;
    if age > MAX_SIGNATURE_AGE_SECS {
        return Err(AuthError::Expired);
    }
    if age < -MAX_CLOCK_SKEW_SECS {
        return Err(AuthError::FutureTimestamp);
    }
    Ok(())
}

/// Proof of possession over the EIP-712 terms message.
pub struct SignatureAuthenticator {
    domain: TermsDomain,
    jwt: Arc<JwtHandler>,
    wallets: Arc<WalletMapper>,
}

impl SignatureAuthenticator {
    pub fn new(domain: TermsDomain, jwt: Arc<JwtHandler>, wallets: Arc<WalletMapper>) -> Self {
        Self {
            domain,
            jwt,
            wallets,
        }
    }

    pub fn jwt(&self) -> &JwtHandler {
        &self.jwt
    }

    pub async fn verify(
        &self,
        address: &str,
        signature: &str,
        timestamp: i64,
    ) -> Result<Session, AuthError> {
        self.verify_at(address, signature, timestamp, Utc::now().timestamp())
            .await
    }

    pub async fn verify_at(
        &self,
        address: &str,
        signature: &str,
        timestamp: i64,
        now: i64,
    ) -> Result<Session, AuthError> {
        let address = address.trim();
        if !is_valid_address(address) || timestamp <= 0 {
            return Err(AuthError::Malformed);
        }
        let user = Address::from_str(address).map_err(|_| AuthError::Malformed)?;

        if let Err(e) = check_window(timestamp, now) {
            warn!(address = %address, timestamp, now, "signature rejected: {}", e);
            return Err(e);
        }

        let signature = parse_signature(signature).map_err(|e| {
            warn!(address = %address, "unparseable signature: {e:#}");
            AuthError::Malformed
        })?;

        let hash = self.domain.signing_hash(user, timestamp as u64);
        let signer = recover_signer(&hash, &signature).map_err(|e| {
            warn!(address = %address, "signature recovery failed: {e:#}");
            AuthError::InvalidSignature
        })?;

        if signer != user {
            warn!(address = %address, recovered = %signer, "signature from a different key");
            return Err(AuthError::InvalidSignature);
        }

        info!(address = %address, "signature verified");

        // Sub-wallet provisioning is best effort; the next call retries it.
        let sub_wallet_address = match self.wallets.get_or_create(address).await {
            Ok(mapping) => Some(mapping.sub_wallet_address),
            Err(e) => {
                warn!(address = %address, "sub-wallet creation deferred: {}", e);
                None
            }
        };

        let (token, expires_in) = self.jwt.generate_token(address).map_err(|e| {
            warn!("session token generation failed: {e:#}");
            AuthError::Internal
        })?;

        Ok(Session {
            address: address.to_lowercase(),
            token,
            expires_in,
            sub_wallet_address,
        })
    }
}
