//! Holdings transformations for the mutating portfolio operations.
//!
//! Every function takes an already-valuated portfolio and returns the new
//! holdings, the notional trades and the amount recorded on the ledger. They
//! are deterministic and never touch storage.

use crate::error::ServiceError;
use crate::models::{Asset, Portfolio, Trade, TradeAction};

use super::valuation::percentage;

/// Amounts smaller than this are treated as no trade.
const TRADE_EPSILON: f64 = 1e-12;

#[derive(Debug, Clone)]
pub struct Transformation {
    pub portfolio: Portfolio,
    pub trades: Vec<Trade>,
    pub ledger_amount: f64,
}

/// Holdings that put `weight`% of `total_value` in each asset at its current price.
/// Unpriced assets get a zero amount but keep their target value.
pub fn target_allocation(total_value: f64, assets: &[Asset]) -> Vec<Asset> {
    assets
        .iter()
        .map(|asset| {
            let target_value = total_value * (asset.weight / 100.0);
            let amount = if asset.price_usd > 0.0 {
                target_value / asset.price_usd
            } else {
                0.0
            };
            Asset {
                amount,
                current_value: target_value,
                ..asset.clone()
            }
        })
        .collect()
}

pub fn rebalance(current: &Portfolio) -> Transformation {
    let assets = target_allocation(current.total_value, &current.assets);

    let trades = assets
        .iter()
        .filter(|a| a.current_value > 0.0)
        .map(|a| Trade {
            asset: a.symbol.clone(),
            action: TradeAction::Buy,
            amount: a.amount,
            usd_value: a.current_value,
        })
        .collect();

    let mut portfolio = current.clone();
    portfolio.assets = assets;
    refresh_change(&mut portfolio);

    Transformation {
        portfolio,
        trades,
        ledger_amount: current.total_value,
    }
}

/// Add `amount` USD and reallocate the enlarged basket to target weights.
pub fn deposit(current: &Portfolio, amount: f64) -> Result<Transformation, ServiceError> {
    if !amount.is_finite() || amount <= 0.0 {
        return Err(ServiceError::InvalidAmount(amount));
    }

    let new_total = current.total_value + amount;
    let assets = target_allocation(new_total, &current.assets);

    let trades = current
        .assets
        .iter()
        .zip(assets.iter())
        .filter_map(|(before, after)| {
            let delta = after.amount - before.amount;
            if delta.abs() < TRADE_EPSILON {
                return None;
            }
            let action = if delta > 0.0 {
                TradeAction::Buy
            } else {
                TradeAction::Sell
            };
            Some(Trade {
                asset: after.symbol.clone(),
                action,
                amount: delta.abs(),
                usd_value: delta.abs() * after.price_usd,
            })
        })
        .collect();

    let mut portfolio = current.clone();
    portfolio.assets = assets;
    portfolio.total_value = new_total;
    refresh_change(&mut portfolio);

    Ok(Transformation {
        portfolio,
        trades,
        ledger_amount: amount,
    })
}

/// Shrink every holding by the same ratio so that `amount` USD leaves the basket.
pub fn withdraw(current: &Portfolio, amount: f64) -> Result<Transformation, ServiceError> {
    if !amount.is_finite() || amount <= 0.0 {
        return Err(ServiceError::InvalidAmount(amount));
    }
    if amount > current.total_value {
        return Err(ServiceError::InsufficientBalance {
            requested: amount,
            available: current.total_value,
        });
    }

    let ratio = amount / current.total_value;
    let keep = 1.0 - ratio;

    let trades = current
        .assets
        .iter()
        .filter(|a| a.amount * ratio > 0.0)
        .map(|a| Trade {
            asset: a.symbol.clone(),
            action: TradeAction::Sell,
            amount: a.amount * ratio,
            usd_value: a.current_value * ratio,
        })
        .collect();

    let mut portfolio = current.clone();
    for asset in portfolio.assets.iter_mut() {
        asset.amount *= keep;
        asset.current_value *= keep;
    }
    portfolio.total_value = current.total_value - amount;
    refresh_change(&mut portfolio);

    Ok(Transformation {
        portfolio,
        trades,
        ledger_amount: amount,
    })
}

/// Liquidate everything and deactivate. Ledger amount is the liquidated value.
pub fn disable(current: &Portfolio) -> Transformation {
    let trades = current
        .assets
        .iter()
        .filter(|a| a.amount > 0.0)
        .map(|a| Trade {
            asset: a.symbol.clone(),
            action: TradeAction::Sell,
            amount: a.amount,
            usd_value: a.current_value,
        })
        .collect();

    let mut portfolio = current.clone();
    for asset in portfolio.assets.iter_mut() {
        asset.amount = 0.0;
        asset.current_value = 0.0;
    }
    portfolio.total_value = 0.0;
    portfolio.change_24h = 0.0;
    portfolio.change_24h_percentage = 0.0;
    portfolio.is_active = false;

    Transformation {
        portfolio,
        trades,
        ledger_amount: current.total_value,
    }
}

fn refresh_change(portfolio: &mut Portfolio) {
    portfolio.change_24h = portfolio
        .assets
        .iter()
        .map(|a| a.current_value * (a.change_24h / 100.0))
        .sum();
    portfolio.change_24h_percentage = percentage(portfolio.change_24h, portfolio.total_value);
}
