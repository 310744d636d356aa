use anyhow::{Context, Result};
use clap::Parser;
use tokio::net::TcpListener;
use tracing::info;

use vaultify_backend::{build_router, config::load_env, init_tracing, AppState, Config};

#[tokio::main]
async fn main() -> Result<()> {
    load_env();
    init_tracing();

    let config = Config::parse();
    info!(
        chain_id = config.chain_id,
        cache_enabled = config.price_cache_enabled,
        "Vaultify backend starting"
    );

    let state = AppState::from_config(&config)?;
    let app = build_router(state);

    let addr = config.bind_address();
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!("API server listening on {}", addr);

    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}
