use anyhow::{anyhow, Result};
use chrono::Utc;
use parking_lot::RwLock;
use std::{
    collections::{HashMap, HashSet},
    sync::atomic::{AtomicUsize, Ordering},
};

use crate::models::PriceQuote;

/// Backing fetcher behind the oracle cache.
#[async_trait::async_trait]
pub trait PriceSource: Send + Sync {
    async fn fetch_quote(&self, symbol: &str) -> Result<PriceQuote>;
}

/// Demo source: fixed base prices with a bounded, time-driven drift.
///
/// Prices move by at most ±5% around the base and the 24h change stays
/// within ±10%. Symbols without a base price are an error.
#[derive(Debug, Clone)]
pub struct SimulatedPriceSource {
    base_prices: HashMap<String, f64>,
}

impl Default for SimulatedPriceSource {
    fn default() -> Self {
        let base_prices = [
            ("ETH", 1900.0),
            ("BTC", 38000.0),
            ("SOL", 100.0),
            ("UNI", 10.0),
            ("AAVE", 125.0),
            ("USDC", 1.0),
            ("USDT", 1.0),
            ("DAI", 1.0),
            ("MATIC", 0.8),
            ("LINK", 15.0),
            ("ARB", 1.2),
        ]
        .into_iter()
        .map(|(s, p)| (s.to_string(), p))
        .collect();

        Self { base_prices }
    }
}

impl SimulatedPriceSource {
    pub fn new() -> Self {
        Self::default()
    }

    fn quote_at(&self, symbol: &str, now_ms: i64) -> Option<PriceQuote> {
        let key = symbol.trim().to_uppercase();
        let base = *self.base_prices.get(&key)?;

        let t = now_ms as f64;
        let drift = (t / 10_000.0).sin() * 0.05;
        let change_24h = (t / 20_000.0 + key.len() as f64).sin() * 10.0;

        Some(PriceQuote {
            symbol: key,
            price_usd: base * (1.0 + drift),
            change_24h,
            fetched_at: Utc::now(),
        })
    }
}

#[async_trait::async_trait]
impl PriceSource for SimulatedPriceSource {
    async fn fetch_quote(&self, symbol: &str) -> Result<PriceQuote> {
        self.quote_at(symbol, Utc::now().timestamp_millis())
            .ok_or_else(|| anyhow!("no price source for symbol {}", symbol))
    }
}

/// Deterministic source with fixed quotes.
///
/// Symbols marked as failing return an error; every call is counted so cache
/// behaviour can be observed.
#[derive(Default)]
pub struct StaticPriceSource {
    quotes: RwLock<HashMap<String, (f64, f64)>>,
    failing: RwLock<HashSet<String>>,
    fetches: AtomicUsize,
}

impl StaticPriceSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_quote(self, symbol: &str, price_usd: f64, change_24h: f64) -> Self {
        self.set_quote(symbol, price_usd, change_24h);
        self
    }

    pub fn with_failure(self, symbol: &str) -> Self {
        self.failing.write().insert(symbol.trim().to_uppercase());
        self
    }

    pub fn set_quote(&self, symbol: &str, price_usd: f64, change_24h: f64) {
        self.quotes
            .write()
            .insert(symbol.trim().to_uppercase(), (price_usd, change_24h));
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl PriceSource for StaticPriceSource {
    async fn fetch_quote(&self, symbol: &str) -> Result<PriceQuote> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let key = symbol.trim().to_uppercase();

        if self.failing.read().contains(&key) {
            return Err(anyhow!("price fetch failed for {}", key));
        }

        let (price_usd, change_24h) = self
            .quotes
            .read()
            .get(&key)
            .copied()
            .ok_or_else(|| anyhow!("unknown symbol {}", key))?;

        Ok(PriceQuote {
            symbol: key,
            price_usd,
            change_24h,
            fetched_at: Utc::now(),
        })
    }
}
