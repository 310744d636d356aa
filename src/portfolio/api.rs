//! Portfolio HTTP handlers.

use axum::{
    body::Bytes,
    extract::{rejection::JsonRejection, Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use super::service::{NewPortfolio, OperationOutcome, PortfolioService};
use crate::error::ServiceError;
use crate::models::{Portfolio, PortfolioStats, Trade, Transaction};

const DEFAULT_PENDING_AGE_SECS: i64 = 300;
/// Ten years.
const MAX_PENDING_AGE_SECS: i64 = 10 * 365 * 24 * 3600;

#[derive(Clone)]
pub struct PortfolioState {
    pub service: Arc<PortfolioService>,
}

pub fn portfolio_router(state: PortfolioState) -> Router {
    Router::new()
        .route("/api/portfolios", get(list_portfolios).post(create_portfolio))
        .route("/api/admin/portfolios", post(create_portfolio))
        .route("/api/admin/transactions/pending", get(pending_transactions))
        .route("/api/portfolios/:id", get(get_portfolio))
        .route("/api/portfolios/:id/transactions", get(list_transactions))
        .route("/api/portfolios/:id/deposit", post(deposit))
        .route("/api/portfolios/:id/rebalance", post(rebalance))
        .route("/api/portfolios/:id/withdraw", post(withdraw))
        .route("/api/portfolios/:id/disable", post(disable))
        .with_state(state)
}

// ===== Request/Response Types =====

#[derive(Debug, Deserialize)]
pub struct OwnerQuery {
    pub address: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingQuery {
    pub older_than_secs: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DepositRequest {
    pub amount: f64,
    #[serde(default)]
    pub tx_hash: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RebalanceRequest {
    #[serde(default)]
    pub tx_hash: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct WithdrawRequest {
    pub amount: f64,
    pub recipient: String,
}

#[derive(Debug, Serialize)]
pub struct PortfolioListResponse {
    pub success: bool,
    pub portfolios: Vec<Portfolio>,
    pub stats: PortfolioStats,
}

#[derive(Debug, Serialize)]
pub struct PortfolioResponse {
    pub success: bool,
    pub portfolio: Portfolio,
}

#[derive(Debug, Serialize)]
pub struct TransactionsResponse {
    pub success: bool,
    pub count: usize,
    pub transactions: Vec<Transaction>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationResponse {
    pub success: bool,
    pub message: String,
    pub transaction_id: String,
    pub tx_hash: String,
    pub trades: Vec<Trade>,
    pub portfolio: Portfolio,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recipient: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usdc_balance: Option<f64>,
}

impl OperationResponse {
    fn from_outcome(message: &str, outcome: OperationOutcome) -> Self {
        Self {
            success: true,
            message: message.to_string(),
            transaction_id: outcome.transaction_id,
            tx_hash: outcome.settlement_ref,
            trades: outcome.trades,
            portfolio: outcome.portfolio,
            amount: None,
            recipient: None,
            usdc_balance: None,
        }
    }
}

fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ServiceError> {
    payload
        .map(|Json(v)| v)
        .map_err(|e| ServiceError::InvalidRequest(e.body_text()))
}

// ===== Route Handlers =====

/// GET /api/portfolios?address=0x...
async fn list_portfolios(
    State(state): State<PortfolioState>,
    Query(query): Query<OwnerQuery>,
) -> Result<Json<PortfolioListResponse>, ServiceError> {
    let address = query
        .address
        .filter(|a| !a.trim().is_empty())
        .ok_or_else(|| ServiceError::InvalidRequest("Address required".to_string()))?;

    let overview = state.service.list_portfolios(&address).await?;
    Ok(Json(PortfolioListResponse {
        success: true,
        portfolios: overview.portfolios,
        stats: overview.stats,
    }))
}

async fn create_portfolio(
    State(state): State<PortfolioState>,
    payload: Result<Json<NewPortfolio>, JsonRejection>,
) -> Result<Json<PortfolioResponse>, ServiceError> {
    let req = body(payload)?;
    let portfolio = state.service.create_portfolio(req).await?;
    Ok(Json(PortfolioResponse {
        success: true,
        portfolio,
    }))
}

async fn get_portfolio(
    State(state): State<PortfolioState>,
    Path(id): Path<String>,
) -> Result<Json<PortfolioResponse>, ServiceError> {
    let portfolio = state.service.get_portfolio(&id).await?;
    Ok(Json(PortfolioResponse {
        success: true,
        portfolio,
    }))
}

async fn list_transactions(
    State(state): State<PortfolioState>,
    Path(id): Path<String>,
) -> Result<Json<TransactionsResponse>, ServiceError> {
    let transactions = state.service.transactions(&id).await?;
    Ok(Json(TransactionsResponse {
        success: true,
        count: transactions.len(),
        transactions,
    }))
}

/// Ledger entries stuck in `pending`, for operator follow-up.
async fn pending_transactions(
    State(state): State<PortfolioState>,
    Query(query): Query<PendingQuery>,
) -> Result<Json<TransactionsResponse>, ServiceError> {
    let secs = query.older_than_secs.unwrap_or(DEFAULT_PENDING_AGE_SECS);
    if !(0..=MAX_PENDING_AGE_SECS).contains(&secs) {
        return Err(ServiceError::InvalidRequest(format!(
            "olderThanSecs must be between 0 and {}",
            MAX_PENDING_AGE_SECS
        )));
    }
    let age = Duration::try_seconds(secs).ok_or_else(|| {
        ServiceError::InvalidRequest("olderThanSecs is out of range".to_string())
    })?;

    let transactions = state.service.pending_transactions(age).await?;
    Ok(Json(TransactionsResponse {
        success: true,
        count: transactions.len(),
        transactions,
    }))
}

async fn deposit(
    State(state): State<PortfolioState>,
    Path(id): Path<String>,
    payload: Result<Json<DepositRequest>, JsonRejection>,
) -> Result<Json<OperationResponse>, ServiceError> {
    let req = body(payload)?;
    info!(portfolio_id = %id, amount = req.amount, "deposit requested");

    let outcome = state.service.deposit(&id, req.amount, req.tx_hash).await?;
    let mut response = OperationResponse::from_outcome("Deposit successful", outcome);
    response.amount = Some(req.amount);
    Ok(Json(response))
}

async fn rebalance(
    State(state): State<PortfolioState>,
    Path(id): Path<String>,
    payload: Bytes,
) -> Result<Json<OperationResponse>, ServiceError> {
    // The body is optional; when present it must parse.
    let req = if payload.iter().all(u8::is_ascii_whitespace) {
        RebalanceRequest::default()
    } else {
        serde_json::from_slice::<RebalanceRequest>(&payload)
            .map_err(|e| ServiceError::InvalidRequest(format!("Invalid request body: {}", e)))?
    };
    info!(portfolio_id = %id, funding_ref = ?req.tx_hash, "rebalance requested");

    let outcome = state.service.rebalance(&id, req.tx_hash).await?;
    Ok(Json(OperationResponse::from_outcome(
        "Portfolio rebalanced successfully",
        outcome,
    )))
}

async fn withdraw(
    State(state): State<PortfolioState>,
    Path(id): Path<String>,
    payload: Result<Json<WithdrawRequest>, JsonRejection>,
) -> Result<Json<OperationResponse>, ServiceError> {
    let req = body(payload)?;
    info!(portfolio_id = %id, amount = req.amount, recipient = %req.recipient, "withdraw requested");

    let outcome = state
        .service
        .withdraw(&id, req.amount, &req.recipient)
        .await?;
    let mut response = OperationResponse::from_outcome("Withdrawal successful", outcome);
    response.amount = Some(req.amount);
    response.recipient = Some(req.recipient);
    Ok(Json(response))
}

async fn disable(
    State(state): State<PortfolioState>,
    Path(id): Path<String>,
) -> Result<Json<OperationResponse>, ServiceError> {
    info!(portfolio_id = %id, "disable requested");

    let outcome = state.service.disable(&id).await?;
    let liquidated = outcome.value_before;
    let mut response = OperationResponse::from_outcome("Portfolio disabled successfully", outcome);
    response.usdc_balance = Some(liquidated);
    Ok(Json(response))
}
