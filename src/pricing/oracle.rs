use futures_util::future::join_all;
use parking_lot::RwLock;
use serde::Serialize;
use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
    time::{Duration, Instant},
};
use tracing::{debug, warn};

use super::source::PriceSource;
use crate::models::PriceQuote;

#[derive(Debug, Clone)]
pub struct PriceOracleConfig {
    pub cache_enabled: bool,
    /// Maximum age of a cached quote
    pub cache_ttl: Duration,
}

impl Default for PriceOracleConfig {
    fn default() -> Self {
        Self {
            cache_enabled: true,
            cache_ttl: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub size: usize,
    pub entries: Vec<String>,
}

struct CachedQuote {
    quote: PriceQuote,
    stored_at: Instant,
}

/// Price oracle with a per-symbol TTL cache.
///
/// Reads and refreshes are independent per symbol. Two callers may both miss
/// and both fetch the same symbol; the later write wins, which is fine for
/// approximate prices.
pub struct PriceOracle {
    source: Arc<dyn PriceSource>,
    config: PriceOracleConfig,
    cache: RwLock<HashMap<String, CachedQuote>>,
}

impl PriceOracle {
    pub fn new(source: Arc<dyn PriceSource>, config: PriceOracleConfig) -> Self {
        Self {
            source,
            config,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Quote for one symbol. Never fails: unknown symbols and fetch errors
    /// yield a zero quote.
    pub async fn get_price(&self, symbol: &str) -> PriceQuote {
        let key = symbol.trim().to_uppercase();

        if self.config.cache_enabled {
            if let Some(cached) = self.cache.read().get(&key) {
                if cached.stored_at.elapsed() < self.config.cache_ttl {
                    debug!(symbol = %key, "price cache hit");
                    return cached.quote.clone();
                }
            }
        }

        match self.source.fetch_quote(&key).await {
            Ok(quote) => {
                if self.config.cache_enabled {
                    self.cache.write().insert(
                        key,
                        CachedQuote {
                            quote: quote.clone(),
                            stored_at: Instant::now(),
                        },
                    );
                }
                quote
            }
            Err(e) => {
                warn!(symbol = %key, "price fetch failed, using zero quote: {e:#}");
                PriceQuote::zero(&key)
            }
        }
    }

    /// Quotes for many symbols, fetched concurrently and joined before
    /// returning. Keyed by the caller's symbol strings.
    pub async fn get_batch_prices(&self, symbols: &[String]) -> HashMap<String, PriceQuote> {
        let unique: HashSet<&String> = symbols.iter().collect();
        debug!(count = unique.len(), "fetching batch prices");

        let lookups = unique
            .into_iter()
            .map(|symbol| async move { (symbol.clone(), self.get_price(symbol).await) });

        join_all(lookups).await.into_iter().collect()
    }

    pub fn clear_cache(&self) {
        self.cache.write().clear();
    }

    pub fn cache_stats(&self) -> CacheStats {
        let cache = self.cache.read();
        let mut entries: Vec<String> = cache.keys().cloned().collect();
        entries.sort();
        CacheStats {
            size: cache.len(),
            entries,
        }
    }
}
