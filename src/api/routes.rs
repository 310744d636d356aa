use anyhow::{Context, Result};
use axum::{
    extract::{Query, State},
    middleware,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, sync::Arc};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};

use crate::auth::{auth_router, AuthState, JwtHandler, SignatureAuthenticator, TermsDomain};
use crate::config::Config;
use crate::middleware::request_logging;
use crate::models::PriceQuote;
use crate::portfolio::{
    portfolio_router, PortfolioDb, PortfolioService, PortfolioState, SettlementExecutor,
    SimulatedSettlement,
};
use crate::pricing::{CacheStats, PriceOracle, SimulatedPriceSource};
use crate::wallets::{wallet_router, WalletMapper, WalletState, WalletStore};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub oracle: Arc<PriceOracle>,
    pub auth: AuthState,
    pub wallets: WalletState,
    pub portfolios: PortfolioState,
}

impl AppState {
    /// Wire every component from configuration.
    pub fn from_config(config: &Config) -> Result<Self> {
        let wallet_db = config.wallet_db();
        let portfolio_db = config.portfolio_db();
        info!(wallet_db = %wallet_db, portfolio_db = %portfolio_db, "Opening databases");

        let wallet_store = WalletStore::new(&wallet_db).context("Failed to open wallet store")?;
        let db = PortfolioDb::new(&portfolio_db).context("Failed to open portfolio store")?;

        let (secret, is_default) = config.jwt_secret();
        if is_default {
            warn!("JWT_SECRET not set, using the development secret");
        }
        let jwt = JwtHandler::new(secret)
            .with_expiration_hours(config.session_ttl_hours)
            .context("Invalid SESSION_TTL_HOURS")?;

        let oracle = Arc::new(PriceOracle::new(
            Arc::new(SimulatedPriceSource::new()),
            config.oracle_config(),
        ));
        let settlement = Arc::new(SimulatedSettlement::new(config.settlement_config()));

        Ok(Self::assemble(
            oracle,
            settlement,
            wallet_store,
            db,
            jwt,
            config.terms_domain(),
            config.chain_id,
        ))
    }

    /// Build the service graph from already-constructed parts.
    pub fn assemble(
        oracle: Arc<PriceOracle>,
        settlement: Arc<dyn SettlementExecutor>,
        wallet_store: WalletStore,
        db: PortfolioDb,
        jwt: JwtHandler,
        domain: TermsDomain,
        chain_id: u64,
    ) -> Self {
        let mapper = Arc::new(WalletMapper::new(wallet_store));
        let authenticator = Arc::new(SignatureAuthenticator::new(
            domain,
            Arc::new(jwt),
            mapper.clone(),
        ));
        let service = Arc::new(
            PortfolioService::new(db, oracle.clone(), settlement, chain_id)
                .with_wallets(mapper.clone()),
        );

        Self {
            oracle,
            auth: AuthState { authenticator },
            wallets: WalletState { mapper },
            portfolios: PortfolioState { service },
        }
    }
}

/// Build the full HTTP router
pub fn build_router(state: AppState) -> Router {
    let prices = Router::new()
        .route("/api/prices", get(get_prices))
        .with_state(state.oracle.clone());

    Router::new()
        .route("/health", get(health_check))
        .merge(prices)
        .merge(auth_router(state.auth))
        .merge(wallet_router(state.wallets))
        .merge(portfolio_router(state.portfolios))
        .layer(middleware::from_fn(request_logging))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

// ===== Route Handlers =====

/// Health check endpoint
async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// GET /api/prices?symbols=ETH,BTC
async fn get_prices(
    State(oracle): State<Arc<PriceOracle>>,
    Query(query): Query<PriceQuery>,
) -> Json<PricesResponse> {
    let symbols: Vec<String> = query
        .symbols
        .unwrap_or_default()
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();

    let prices = oracle.get_batch_prices(&symbols).await;
    Json(PricesResponse {
        success: true,
        prices,
        cache: oracle.cache_stats(),
    })
}

// ===== Request/Response Types =====

#[derive(Deserialize)]
struct PriceQuery {
    /// Comma-separated symbols
    symbols: Option<String>,
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

#[derive(Serialize)]
struct PricesResponse {
    success: bool,
    prices: HashMap<String, PriceQuote>,
    cache: CacheStats,
}
