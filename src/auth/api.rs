//! Authentication API Endpoints
//! Mission: Exchange a signed terms acceptance for a session token

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};

use super::authenticator::SignatureAuthenticator;

/// Shared auth state
#[derive(Clone)]
pub struct AuthState {
    pub authenticator: Arc<SignatureAuthenticator>,
}

pub fn auth_router(state: AuthState) -> Router {
    Router::new()
        .route("/api/auth/verify-signature", post(verify_signature))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
pub struct VerifySignatureRequest {
    pub address: String,
    pub signature: String,
    /// Unix seconds the client put in the signed message
    pub timestamp: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifySignatureResponse {
    pub success: bool,
    pub token: String,
    pub expires_in: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub_wallet_address: Option<String>,
}

/// Verify endpoint - POST /api/auth/verify-signature
pub async fn verify_signature(
    State(state): State<AuthState>,
    payload: Result<Json<VerifySignatureRequest>, JsonRejection>,
) -> Result<Json<VerifySignatureResponse>, AuthError> {
    let Json(payload) = payload.map_err(|e| {
        warn!("rejected verify-signature body: {}", e);
        AuthError::Malformed
    })?;

    info!(address = %payload.address, timestamp = payload.timestamp, "signature verification request");

    let session = state
        .authenticator
        .verify(&payload.address, &payload.signature, payload.timestamp)
        .await?;

    Ok(Json(VerifySignatureResponse {
        success: true,
        token: session.token,
        expires_in: session.expires_in,
        sub_wallet_address: session.sub_wallet_address,
    }))
}

/// Auth failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthError {
    Expired,
    FutureTimestamp,
    InvalidSignature,
    Malformed,
    Internal,
}

impl AuthError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::Expired | AuthError::FutureTimestamp | AuthError::InvalidSignature => {
                StatusCode::UNAUTHORIZED
            }
            AuthError::Malformed => StatusCode::BAD_REQUEST,
            AuthError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let message = match self {
            AuthError::Expired => "Signature expired. Please try again.",
            AuthError::FutureTimestamp => "Invalid timestamp. Please check your system clock.",
            AuthError::InvalidSignature => "Invalid signature",
            AuthError::Malformed => "Invalid request format",
            AuthError::Internal => "Verification failed",
        };
        f.write_str(message)
    }
}

impl std::error::Error for AuthError {}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        (
            self.status_code(),
            Json(json!({ "success": false, "error": self.to_string() })),
        )
            .into_response()
    }
}
