//! Service Errors
//! Mission: One failure vocabulary for wallets, portfolios and the ledger

use crate::chain::round_usd;
use crate::models::TransactionStatus;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::error;

/// Failures surfaced by the portfolio and wallet services.
///
/// Validation variants are raised before any state is touched. Domain
/// variants carry a user-facing message. `Storage` hides its detail from
/// API callers.
#[derive(Debug)]
pub enum ServiceError {
    InvalidAddress(String),
    InvalidWeights { total: f64 },
    InvalidAmount(f64),
    InvalidRequest(String),
    PortfolioNotFound(String),
    PortfolioInactive(String),
    InsufficientBalance { requested: f64, available: f64 },
    TransactionNotFound(String),
    TransactionFinalized { id: String, status: TransactionStatus },
    Settlement(String),
    Storage(anyhow::Error),
}

impl ServiceError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::InvalidAddress(_)
            | ServiceError::InvalidWeights { .. }
            | ServiceError::InvalidAmount(_)
            | ServiceError::InvalidRequest(_)
            | ServiceError::InsufficientBalance { .. } => StatusCode::BAD_REQUEST,
            ServiceError::PortfolioNotFound(_) | ServiceError::TransactionNotFound(_) => {
                StatusCode::NOT_FOUND
            }
            ServiceError::PortfolioInactive(_) | ServiceError::TransactionFinalized { .. } => {
                StatusCode::CONFLICT
            }
            ServiceError::Settlement(_) => StatusCode::BAD_GATEWAY,
            ServiceError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl std::fmt::Display for ServiceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServiceError::InvalidAddress(addr) => write!(
                f,
                "Invalid Ethereum address: {}. Must be a 20-byte hex value (40 hex characters).",
                addr
            ),
            ServiceError::InvalidWeights { total } => {
                write!(f, "Total weight must equal 100% (got {:.2}%)", total)
            }
            ServiceError::InvalidAmount(amount) => {
                write!(f, "Amount must be a positive number (got {})", amount)
            }
            ServiceError::InvalidRequest(reason) => write!(f, "Invalid request: {}", reason),
            ServiceError::PortfolioNotFound(id) => write!(f, "Portfolio not found: {}", id),
            ServiceError::PortfolioInactive(id) => write!(f, "Portfolio is disabled: {}", id),
            ServiceError::InsufficientBalance { available, .. } => write!(
                f,
                "Insufficient balance. Available: {:.2} USDC",
                round_usd(*available)
            ),
            ServiceError::TransactionNotFound(id) => write!(f, "Transaction not found: {}", id),
            ServiceError::TransactionFinalized { id, status } => write!(
                f,
                "Transaction {} is already {}",
                id,
                status.as_str()
            ),
            ServiceError::Settlement(detail) => write!(f, "Settlement failed: {}", detail),
            ServiceError::Storage(e) => write!(f, "Storage error: {:#}", e),
        }
    }
}

impl std::error::Error for ServiceError {}

impl From<anyhow::Error> for ServiceError {
    fn from(e: anyhow::Error) -> Self {
        ServiceError::Storage(e)
    }
}

impl From<rusqlite::Error> for ServiceError {
    fn from(e: rusqlite::Error) -> Self {
        ServiceError::Storage(e.into())
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = match &self {
            ServiceError::Storage(e) => {
                error!("storage failure: {:#}", e);
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };

        (status, Json(json!({ "success": false, "error": message }))).into_response()
    }
}
