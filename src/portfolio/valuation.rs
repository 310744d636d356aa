use std::collections::HashMap;
use tracing::warn;

use crate::models::{Portfolio, PortfolioStats, PriceQuote};
use crate::pricing::PriceOracle;

/// Recompute per-asset and portfolio figures from held amounts and quotes.
///
/// Pure: the input is not modified and nothing is persisted. Assets without
/// a quote are valued at zero.
pub fn valuate(portfolio: &Portfolio, prices: &HashMap<String, PriceQuote>) -> Portfolio {
    let mut out = portfolio.clone();
    let mut total_value = 0.0;
    let mut total_change = 0.0;

    for asset in out.assets.iter_mut() {
        let (price, change_pct) = match prices.get(&asset.symbol) {
            Some(q) => (q.price_usd, q.change_24h),
            None => {
                warn!(symbol = %asset.symbol, portfolio_id = %portfolio.id, "no price data");
                (0.0, 0.0)
            }
        };

        let value = asset.amount * price;
        total_value += value;
        total_change += value * (change_pct / 100.0);

        asset.current_value = value;
        asset.price_usd = price;
        asset.change_24h = change_pct;
    }

    out.total_value = total_value;
    out.change_24h = total_change;
    out.change_24h_percentage = percentage(total_change, total_value);
    out
}

/// Fetch quotes for every held symbol in one batch, then [`valuate`].
pub async fn valuate_with_oracle(oracle: &PriceOracle, portfolio: &Portfolio) -> Portfolio {
    let symbols: Vec<String> = portfolio.assets.iter().map(|a| a.symbol.clone()).collect();
    let prices = oracle.get_batch_prices(&symbols).await;
    valuate(portfolio, &prices)
}

/// Totals across already-valuated portfolios.
pub fn aggregate(portfolios: &[Portfolio]) -> PortfolioStats {
    let total_value: f64 = portfolios.iter().map(|p| p.total_value).sum();
    let change_24h: f64 = portfolios.iter().map(|p| p.change_24h).sum();

    PortfolioStats {
        total_value,
        change_24h,
        change_24h_percentage: percentage(change_24h, total_value),
        active_count: portfolios.iter().filter(|p| p.is_active).count(),
        total_count: portfolios.len(),
    }
}

pub(crate) fn percentage(change: f64, total: f64) -> f64 {
    if total > 0.0 {
        change / total * 100.0
    } else {
        0.0
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::models::Asset;
    use chrono::Utc;

    pub(crate) fn sample_portfolio() -> Portfolio {
        let mut eth = Asset::new("ETH", "Ethereum", "0x4200000000000000000000000000000000000006", 60.0);
        eth.amount = 1.0;
        let mut usdc = Asset::new("USDC", "USD Coin", crate::chain::USDC_BASE, 40.0);
        usdc.amount = 1000.0;

        let now = Utc::now();
        Portfolio {
            id: "pf-1".to_string(),
            name: "Blue chips".to_string(),
            owner_address: "0x70997970c51812dc3a010c7d01b50e0d17dc79c8".to_string(),
            smart_account_address: "0x0000000000000000000000000000000000000abc".to_string(),
            total_value: 0.0,
            change_24h: 0.0,
            change_24h_percentage: 0.0,
            is_active: true,
            assets: vec![eth, usdc],
            created_at: now,
            updated_at: now,
        }
    }

    pub(crate) fn quotes(entries: &[(&str, f64, f64)]) -> HashMap<String, PriceQuote> {
        entries
            .iter()
            .map(|(s, p, c)| {
                (
                    s.to_string(),
                    PriceQuote {
                        symbol: s.to_string(),
                        price_usd: *p,
                        change_24h: *c,
                        fetched_at: Utc::now(),
                    },
                )
            })
            .collect()
    }

    #[test]
    fn test_example_scenario_total() {
        let p = valuate(&sample_portfolio(), &quotes(&[("ETH", 2000.0, 0.0), ("USDC", 1.0, 0.0)]));
        assert!((p.total_value - 3000.0).abs() < 1e-9);
        assert!((p.assets[0].current_value - 2000.0).abs() < 1e-9);
        assert!((p.assets[1].current_value - 1000.0).abs() < 1e-9);
        assert_eq!(p.assets[0].price_usd, 2000.0);
    }

    #[test]
    fn test_change_figures() {
        let p = valuate(
            &sample_portfolio(),
            &quotes(&[("ETH", 2000.0, 10.0), ("USDC", 1.0, 0.0)]),
        );
        // 2000 * 10% = 200 on a 3000 basket
        assert!((p.change_24h - 200.0).abs() < 1e-9);
        assert!((p.change_24h_percentage - 200.0 / 3000.0 * 100.0).abs() < 1e-9);
        assert_eq!(p.assets[0].change_24h, 10.0);
    }

    #[test]
    fn test_valuate_is_idempotent() {
        let prices = quotes(&[("ETH", 1875.5, -3.2), ("USDC", 0.9999, 0.01)]);
        let once = valuate(&sample_portfolio(), &prices);
        let twice = valuate(&once, &prices);
        assert_eq!(once.total_value, twice.total_value);
        assert_eq!(once.change_24h, twice.change_24h);
        assert_eq!(once.assets, twice.assets);
    }

    #[test]
    fn test_missing_quote_is_zero_and_empty_portfolio_has_zero_percentage() {
        let p = valuate(&sample_portfolio(), &quotes(&[("USDC", 1.0, 0.0)]));
        assert_eq!(p.assets[0].current_value, 0.0);
        assert_eq!(p.assets[0].price_usd, 0.0);
        assert!((p.total_value - 1000.0).abs() < 1e-9);

        let mut empty = sample_portfolio();
        for a in empty.assets.iter_mut() {
            a.amount = 0.0;
        }
        let p = valuate(&empty, &quotes(&[("ETH", 2000.0, 5.0), ("USDC", 1.0, 0.0)]));
        assert_eq!(p.total_value, 0.0);
        assert_eq!(p.change_24h_percentage, 0.0);
    }

    #[test]
    fn test_aggregate_stats() {
        let prices = quotes(&[("ETH", 2000.0, 10.0), ("USDC", 1.0, 0.0)]);
        let a = valuate(&sample_portfolio(), &prices);
        let mut b = a.clone();
        b.is_active = false;
        b.total_value = 0.0;
        b.change_24h = 0.0;

        let stats = aggregate(&[a, b]);
        assert!((stats.total_value - 3000.0).abs() < 1e-9);
        assert!((stats.change_24h - 200.0).abs() < 1e-9);
        assert_eq!(stats.active_count, 1);
        assert_eq!(stats.total_count, 2);

        assert_eq!(aggregate(&[]), PortfolioStats::default());
    }
}
