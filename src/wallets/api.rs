use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::WalletMapper;
use crate::error::ServiceError;

#[derive(Clone)]
pub struct WalletState {
    pub mapper: Arc<WalletMapper>,
}

pub fn wallet_router(state: WalletState) -> Router {
    Router::new()
        .route("/api/wallets/sub-wallet", get(get_sub_wallet))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
pub struct SubWalletQuery {
    pub address: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubWalletData {
    pub user_address: String,
    pub sub_wallet_address: String,
    pub sub_wallet_id: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct SubWalletResponse {
    pub success: bool,
    pub data: SubWalletData,
}

/// GET /api/wallets/sub-wallet?address=0x...
async fn get_sub_wallet(
    State(state): State<WalletState>,
    Query(query): Query<SubWalletQuery>,
) -> Result<Json<SubWalletResponse>, ServiceError> {
    let address = query
        .address
        .filter(|a| !a.trim().is_empty())
        .ok_or_else(|| ServiceError::InvalidRequest("User address is required".to_string()))?;

    let mapping = state.mapper.get_or_create(&address).await?;

    Ok(Json(SubWalletResponse {
        success: true,
        data: SubWalletData {
            user_address: mapping.user_address,
            sub_wallet_address: mapping.sub_wallet_address,
            sub_wallet_id: mapping.sub_wallet_id,
            created_at: mapping.created_at,
        },
    }))
}
