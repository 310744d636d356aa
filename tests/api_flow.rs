//! End-to-end HTTP tests against the assembled router with in-memory stores,
//! fixed prices and deterministic settlement.

use alloy::primitives::Address;
use alloy::signers::{local::PrivateKeySigner, SignerSync};
use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

use vaultify_backend::auth::{JwtHandler, TermsDomain};
use vaultify_backend::portfolio::{DeterministicSettlement, PortfolioDb};
use vaultify_backend::pricing::{PriceOracle, PriceOracleConfig, StaticPriceSource};
use vaultify_backend::wallets::WalletStore;
use vaultify_backend::{build_router, AppState};

const OWNER: &str = "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266";
const TEST_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
const RECIPIENT: &str = "0x70997970C51812dc3A010C7d01b50e0d17dc79C8";

fn app() -> Router {
    let source = StaticPriceSource::new()
        .with_quote("ETH", 2000.0, 5.0)
        .with_quote("USDC", 1.0, 0.0);
    let oracle = Arc::new(PriceOracle::new(
        Arc::new(source),
        PriceOracleConfig {
            cache_enabled: false,
            ..PriceOracleConfig::default()
        },
    ));

    let state = AppState::assemble(
        oracle,
        Arc::new(DeterministicSettlement::new()),
        WalletStore::in_memory().unwrap(),
        PortfolioDb::in_memory().unwrap(),
        JwtHandler::new("integration-secret".to_string()),
        TermsDomain::default(),
        8453,
    );
    build_router(state)
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

async fn create_portfolio(app: &Router) -> String {
    let (status, body) = send(
        app,
        "POST",
        "/api/admin/portfolios",
        Some(json!({
            "name": "Core",
            "userAddress": OWNER,
            "assets": [
                {"symbol": "ETH", "address": "0x4200000000000000000000000000000000000006", "weight": 60},
                {"symbol": "USDC", "address": "0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913", "weight": 40}
            ]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    body["portfolio"]["id"].as_str().unwrap().to_string()
}

fn sign_terms(timestamp: i64) -> String {
    let signer: PrivateKeySigner = TEST_KEY.parse().unwrap();
    let user: Address = OWNER.parse().unwrap();
    let hash = TermsDomain::default().signing_hash(user, timestamp as u64);
    let sig = signer.sign_hash_sync(&hash).unwrap();
    format!("0x{}", hex::encode(sig.as_bytes()))
}

#[tokio::test]
async fn test_health() {
    let app = app();
    let (status, body) = send(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn test_create_deposit_list_and_ledger() {
    let app = app();
    let id = create_portfolio(&app).await;

    let (status, body) = send(
        &app,
        "POST",
        &format!("/api/portfolios/{id}/deposit"),
        Some(json!({"amount": 1000.0, "txHash": "0xfeed"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["success"], true);
    assert_eq!(body["amount"], 1000.0);
    assert_eq!(body["txHash"], format!("0x{:064x}", 1));
    let eth = &body["portfolio"]["assets"][0];
    assert_eq!(eth["symbol"], "ETH");
    assert!((eth["amount"].as_f64().unwrap() - 0.3).abs() < 1e-9);

    let (status, body) = send(&app, "GET", &format!("/api/portfolios?address={OWNER}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["portfolios"].as_array().unwrap().len(), 1);
    assert!((body["stats"]["totalValue"].as_f64().unwrap() - 1000.0).abs() < 1e-6);
    assert_eq!(body["stats"]["activeCount"], 1);

    let (status, body) = send(&app, "GET", &format!("/api/portfolios/{id}/transactions"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 1);
    assert_eq!(body["transactions"][0]["type"], "deposit");
    assert_eq!(body["transactions"][0]["status"], "completed");

    let (_, body) = send(&app, "GET", "/api/admin/transactions/pending?olderThanSecs=0", None).await;
    assert_eq!(body["count"], 0);
}

#[tokio::test]
async fn test_withdraw_over_balance_is_rejected() {
    let app = app();
    let id = create_portfolio(&app).await;
    send(
        &app,
        "POST",
        &format!("/api/portfolios/{id}/deposit"),
        Some(json!({"amount": 500.0})),
    )
    .await;

    let (status, body) = send(
        &app,
        "POST",
        &format!("/api/portfolios/{id}/withdraw"),
        Some(json!({"amount": 600.0, "recipient": RECIPIENT})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "Insufficient balance. Available: 500.00 USDC");

    let (status, body) = send(
        &app,
        "POST",
        &format!("/api/portfolios/{id}/withdraw"),
        Some(json!({"amount": 100.0, "recipient": RECIPIENT})),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert!((body["portfolio"]["totalValue"].as_f64().unwrap() - 400.0).abs() < 1e-6);
    assert_eq!(body["recipient"], RECIPIENT);
}

#[tokio::test]
async fn test_disable_then_rebalance_conflicts() {
    let app = app();
    let id = create_portfolio(&app).await;
    send(
        &app,
        "POST",
        &format!("/api/portfolios/{id}/deposit"),
        Some(json!({"amount": 250.0})),
    )
    .await;

    let (status, body) = send(&app, "POST", &format!("/api/portfolios/{id}/disable"), None).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["portfolio"]["isActive"], false);
    assert!((body["usdcBalance"].as_f64().unwrap() - 250.0).abs() < 1e-6);

    let (status, body) = send(&app, "POST", &format!("/api/portfolios/{id}/rebalance"), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_unknown_portfolio_is_not_found() {
    let app = app();
    let (status, _) = send(&app, "GET", "/api/portfolios/missing", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_verify_signature() {
    let app = app();
    let now = chrono::Utc::now().timestamp();

    let (status, body) = send(
        &app,
        "POST",
        "/api/auth/verify-signature",
        Some(json!({"address": OWNER, "signature": sign_terms(now), "timestamp": now})),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["success"], true);
    assert!(!body["token"].as_str().unwrap().is_empty());
    assert!(body["subWalletAddress"].is_string());

    let stale = now - 600;
    let (status, body) = send(
        &app,
        "POST",
        "/api/auth/verify-signature",
        Some(json!({"address": OWNER, "signature": sign_terms(stale), "timestamp": stale})),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_sub_wallet_is_stable() {
    let app = app();
    let uri = format!("/api/wallets/sub-wallet?address={OWNER}");

    let (status, first) = send(&app, "GET", &uri, None).await;
    assert_eq!(status, StatusCode::OK);
    let (_, second) = send(&app, "GET", &uri, None).await;
    assert_eq!(
        first["data"]["subWalletAddress"],
        second["data"]["subWalletAddress"]
    );

    let (status, _) = send(&app, "GET", "/api/wallets/sub-wallet?address=nope", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_prices_endpoint() {
    let app = app();
    let (status, body) = send(&app, "GET", "/api/prices?symbols=ETH,USDC", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["prices"]["ETH"]["priceUSD"], 2000.0);
    assert_eq!(body["prices"]["USDC"]["priceUSD"], 1.0);
}

#[tokio::test]
async fn test_pending_age_out_of_range_is_rejected() {
    let app = app();
    for secs in [i64::MAX.to_string(), "1000000000000000".to_string(), "-1".to_string()] {
        let (status, body) = send(
            &app,
            "GET",
            &format!("/api/admin/transactions/pending?olderThanSecs={secs}"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "olderThanSecs={secs}");
        assert_eq!(body["success"], false);
    }

    let (status, body) = send(&app, "GET", "/api/admin/transactions/pending", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 0);
}

#[tokio::test]
async fn test_rebalance_body_is_optional_but_checked() {
    let app = app();
    let id = create_portfolio(&app).await;
    let uri = format!("/api/portfolios/{id}/rebalance");

    let (status, _) = send(&app, "POST", &uri, None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(&app, "POST", &uri, Some(json!({"txHash": "0xabc"}))).await;
    assert_eq!(status, StatusCode::OK, "{body}");

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(&uri)
                .header("content-type", "application/json")
                .body(Body::from("{not json"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let (_, body) = send(&app, "GET", &format!("/api/portfolios/{id}/transactions"), None).await;
    assert_eq!(body["count"], 2);
}
