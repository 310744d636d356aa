use clap::Parser;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::auth::TermsDomain;
use crate::portfolio::SimulatedSettlementConfig;
use crate::pricing::PriceOracleConfig;

const DEV_JWT_SECRET: &str = "vaultify-dev-secret-change-me";

#[derive(Parser, Debug, Clone)]
#[command(name = "vaultify")]
#[command(about = "Vaultify portfolio backend - weighted crypto baskets over a REST API")]
pub struct Config {
    /// Port to listen on
    #[arg(long, env = "PORT", default_value = "3000")]
    pub port: u16,

    /// Interface to bind
    #[arg(long, env = "BIND_ADDR", default_value = "0.0.0.0")]
    pub bind_addr: String,

    /// Portfolio / ledger SQLite file (relative paths resolve against the crate dir)
    #[arg(long, env = "PORTFOLIO_DB_PATH")]
    pub portfolio_db_path: Option<String>,

    /// Wallet identity SQLite file
    #[arg(long, env = "WALLET_DB_PATH")]
    pub wallet_db_path: Option<String>,

    /// HS256 secret for session tokens
    #[arg(long, env = "JWT_SECRET")]
    pub jwt_secret: Option<String>,

    /// Session token lifetime in hours
    #[arg(long, env = "SESSION_TTL_HOURS", default_value = "24")]
    pub session_ttl_hours: i64,

    /// Price cache time-to-live in milliseconds
    #[arg(long, env = "PRICE_CACHE_DURATION_MS", default_value = "60000")]
    pub price_cache_duration_ms: u64,

    #[arg(long, env = "PRICE_CACHE_ENABLED", default_value = "true", action = clap::ArgAction::Set)]
    pub price_cache_enabled: bool,

    /// Chain the terms signature and settlement token are bound to
    #[arg(long, env = "CHAIN_ID", default_value = "8453")]
    pub chain_id: u64,

    #[arg(long, env = "EIP712_DOMAIN_NAME", default_value = "Vaultify")]
    pub eip712_domain_name: String,

    #[arg(long, env = "SETTLEMENT_DELAY_WITHDRAW_MS", default_value = "1500")]
    pub settlement_delay_withdraw_ms: u64,

    #[arg(long, env = "SETTLEMENT_DELAY_REBALANCE_MS", default_value = "2000")]
    pub settlement_delay_rebalance_ms: u64,

    #[arg(long, env = "SETTLEMENT_DELAY_DISABLE_MS", default_value = "2500")]
    pub settlement_delay_disable_ms: u64,
}

impl Config {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.bind_addr, self.port)
    }

    pub fn portfolio_db(&self) -> String {
        resolve_data_path(self.portfolio_db_path.clone(), "vaultify_portfolios.db")
    }

    pub fn wallet_db(&self) -> String {
        resolve_data_path(self.wallet_db_path.clone(), "vaultify_wallets.db")
    }

    /// Configured secret, or the development default (`true` in the second slot).
    pub fn jwt_secret(&self) -> (String, bool) {
        match self.jwt_secret.as_deref().map(str::trim) {
            Some(s) if !s.is_empty() => (s.to_string(), false),
            _ => (DEV_JWT_SECRET.to_string(), true),
        }
    }

    pub fn oracle_config(&self) -> PriceOracleConfig {
        PriceOracleConfig {
            cache_enabled: self.price_cache_enabled,
            cache_ttl: Duration::from_millis(self.price_cache_duration_ms),
        }
    }

    pub fn settlement_config(&self) -> SimulatedSettlementConfig {
        SimulatedSettlementConfig::from_millis(
            self.settlement_delay_withdraw_ms,
            self.settlement_delay_rebalance_ms,
            self.settlement_delay_disable_ms,
        )
    }

    pub fn terms_domain(&self) -> TermsDomain {
        TermsDomain::new(self.eip712_domain_name.clone(), self.chain_id)
    }
}

/// Absolute paths pass through; relative ones anchor at the crate directory,
/// not the caller's cwd.
pub fn resolve_data_path(env_value: Option<String>, default_filename: &str) -> String {
    let base = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    let Some(raw) = env_value.filter(|v| !v.trim().is_empty()) else {
        return base.join(default_filename).to_string_lossy().to_string();
    };

    let p = PathBuf::from(raw);
    if p.is_absolute() {
        return p.to_string_lossy().to_string();
    }

    base.join(p).to_string_lossy().to_string()
}

/// Load `.env` from the cwd search path, then from the crate directory.
pub fn load_env() {
    let _ = dotenv::dotenv();

    let manifest_dir = Path::new(env!("CARGO_MANIFEST_DIR"));
    let candidate = manifest_dir.join(".env");
    if candidate.exists() {
        let _ = dotenv::from_path(&candidate);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::parse_from(["vaultify"]);
        assert_eq!(config.chain_id, 8453);
        assert_eq!(config.session_ttl_hours, 24);
        assert!(config.price_cache_enabled);
        assert_eq!(config.oracle_config().cache_ttl, Duration::from_secs(60));
        assert_eq!(
            config.settlement_config().rebalance_delay,
            Duration::from_millis(2000)
        );
        assert_eq!(config.terms_domain().name, "Vaultify");
    }

    #[test]
    fn test_flags_override_and_delays_clamp() {
        let config = Config::parse_from([
            "vaultify",
            "--port",
            "8080",
            "--price-cache-enabled",
            "false",
            "--settlement-delay-disable-ms",
            "999999",
            "--jwt-secret",
            "s3cret",
        ]);
        assert_eq!(config.bind_address(), "0.0.0.0:8080");
        assert!(!config.price_cache_enabled);
        assert_eq!(config.settlement_config().disable_delay, Duration::from_secs(10));
        assert_eq!(config.jwt_secret(), ("s3cret".to_string(), false));
    }

    #[test]
    fn test_resolve_data_path() {
        let base = env!("CARGO_MANIFEST_DIR");
        assert_eq!(
            resolve_data_path(None, "x.db"),
            PathBuf::from(base).join("x.db").to_string_lossy()
        );
        assert_eq!(
            resolve_data_path(Some("/tmp/abs.db".into()), "x.db"),
            "/tmp/abs.db"
        );
        assert_eq!(
            resolve_data_path(Some("data/rel.db".into()), "x.db"),
            PathBuf::from(base).join("data/rel.db").to_string_lossy()
        );
    }
}
