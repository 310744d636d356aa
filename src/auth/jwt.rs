//! JWT Token Handler
//! Mission: Issue and validate wallet session tokens

use anyhow::{Context, Result};
use chrono::Utc;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Session claims. `sub` is the lower-cased wallet address.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Claims {
    pub sub: String,
    pub iat: usize,
    pub exp: usize,
}

/// One year.
pub const MAX_EXPIRATION_HOURS: i64 = 24 * 365;

/// JWT Handler for token operations
pub struct JwtHandler {
    secret: String,
    expiration_hours: i64,
}

impl JwtHandler {
    /// Create a new JWT handler with secret key
    pub fn new(secret: String) -> Self {
        Self {
            secret,
            expiration_hours: 24, // 24-hour tokens by default
        }
    }

    /// Rejects lifetimes outside `1..=MAX_EXPIRATION_HOURS`.
    pub fn with_expiration_hours(mut self, hours: i64) -> Result<Self> {
        anyhow::ensure!(
            (1..=MAX_EXPIRATION_HOURS).contains(&hours),
            "session lifetime must be between 1 and {} hours, got {}",
            MAX_EXPIRATION_HOURS,
            hours
        );
        self.expiration_hours = hours;
        Ok(self)
    }

    /// Generate a session token for a wallet address
    pub fn generate_token(&self, address: &str) -> Result<(String, usize)> {
        let now = Utc::now();
        let expiration = now
            .checked_add_signed(
                chrono::Duration::try_hours(self.expiration_hours)
                    .context("Invalid session lifetime")?,
            )
            .context("Invalid timestamp")?
            .timestamp() as usize;

        let expires_in = (self.expiration_hours * 3600) as usize;

        let claims = Claims {
            sub: address.to_lowercase(),
            iat: now.timestamp() as usize,
            exp: expiration,
        };

        debug!(
            "Generating session for {}, expires in {}h",
            claims.sub, self.expiration_hours
        );

        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .context("Failed to generate JWT")?;

        Ok((token, expires_in))
    }

    /// Validate a JWT token and extract claims
    pub fn validate_token(&self, token: &str) -> Result<Claims> {
        let decoded = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &Validation::default(),
        )
        .context("Invalid or expired token")?;

        debug!("Validated session for {}", decoded.claims.sub);

        Ok(decoded.claims)
    }
}
