//! Vaultify Backend Library
//!
//! Weighted crypto portfolios behind a REST API: price oracle, wallet
//! identities, signed-terms authentication, the portfolio engine and its
//! transaction ledger.

pub mod api;
pub mod auth;
pub mod chain;
pub mod config;
pub mod error;
pub mod locks;
pub mod middleware;
pub mod models;
pub mod portfolio;
pub mod pricing;
pub mod wallets;

pub use api::{build_router, AppState};
pub use config::Config;
pub use error::ServiceError;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize tracing; `RUST_LOG` overrides the default filter.
pub fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "vaultify_backend=debug,vaultify=debug,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
