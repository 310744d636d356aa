use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single holding inside a portfolio
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Asset {
    pub symbol: String,
    pub name: String,
    /// On-chain token contract
    pub address: String,
    /// Target share of portfolio value, 0..=100
    pub weight: f64,
    pub amount: f64,
    pub current_value: f64,
    #[serde(rename = "priceUSD")]
    pub price_usd: f64,
    pub change_24h: f64,
}

impl Asset {
    pub fn new(symbol: &str, name: &str, address: &str, weight: f64) -> Self {
        Self {
            symbol: symbol.to_string(),
            name: name.to_string(),
            address: address.to_string(),
            weight,
            amount: 0.0,
            current_value: 0.0,
            price_usd: 0.0,
            change_24h: 0.0,
        }
    }
}

/// A named, weighted basket of assets owned by one address
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Portfolio {
    pub id: String,
    pub name: String,
    #[serde(rename = "userAddress")]
    pub owner_address: String,
    /// Custodial settlement address generated at creation
    pub smart_account_address: String,
    pub total_value: f64,
    pub change_24h: f64,
    pub change_24h_percentage: f64,
    pub is_active: bool,
    pub assets: Vec<Asset>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Ledger entry kinds
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Deposit,
    Withdraw,
    Rebalance,
    Disable,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Deposit => "deposit",
            TransactionKind::Withdraw => "withdraw",
            TransactionKind::Rebalance => "rebalance",
            TransactionKind::Disable => "disable",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "deposit" => Some(TransactionKind::Deposit),
            "withdraw" => Some(TransactionKind::Withdraw),
            "rebalance" => Some(TransactionKind::Rebalance),
            "disable" => Some(TransactionKind::Disable),
            _ => None,
        }
    }
}

/// Ledger entry lifecycle: pending -> completed | failed
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Pending,
    Completed,
    Failed,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Completed => "completed",
            TransactionStatus::Failed => "failed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Some(TransactionStatus::Pending),
            "completed" => Some(TransactionStatus::Completed),
            "failed" => Some(TransactionStatus::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, TransactionStatus::Pending)
    }
}

/// Auditable record of one mutating operation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: String,
    pub portfolio_id: String,
    #[serde(rename = "userAddress")]
    pub owner_address: String,
    #[serde(rename = "type")]
    pub kind: TransactionKind,
    pub amount: f64,
    pub status: TransactionStatus,
    #[serde(rename = "txHash", skip_serializing_if = "Option::is_none")]
    pub settlement_ref: Option<String>,
    #[serde(rename = "errorMessage", skip_serializing_if = "Option::is_none")]
    pub error_detail: Option<String>,
    #[serde(rename = "timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finalized_at: Option<DateTime<Utc>>,
}

/// Current USD price for one symbol. Never persisted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PriceQuote {
    pub symbol: String,
    #[serde(rename = "priceUSD")]
    pub price_usd: f64,
    pub change_24h: f64,
    pub fetched_at: DateTime<Utc>,
}

impl PriceQuote {
    /// Fallback quote for unknown symbols and failed fetches
    pub fn zero(symbol: &str) -> Self {
        Self {
            symbol: symbol.to_string(),
            price_usd: 0.0,
            change_24h: 0.0,
            fetched_at: Utc::now(),
        }
    }
}

/// Primary address -> custodial sub-address link
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserWalletMapping {
    /// Lower-cased primary address
    pub user_address: String,
    pub sub_wallet_address: String,
    pub sub_wallet_id: String,
    pub created_at: DateTime<Utc>,
    pub last_used: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TradeAction {
    Buy,
    Sell,
}

/// Notional trade reported by a mutating operation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Trade {
    pub asset: String,
    pub action: TradeAction,
    pub amount: f64,
    pub usd_value: f64,
}

/// Aggregate figures across all of an owner's portfolios
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioStats {
    pub total_value: f64,
    pub change_24h: f64,
    pub change_24h_percentage: f64,
    pub active_count: usize,
    pub total_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_round_trip_through_str() {
        for kind in [
            TransactionKind::Deposit,
            TransactionKind::Withdraw,
            TransactionKind::Rebalance,
            TransactionKind::Disable,
        ] {
            assert_eq!(TransactionKind::from_str(kind.as_str()), Some(kind));
        }
        assert_eq!(TransactionKind::from_str("REBALANCE"), Some(TransactionKind::Rebalance));
        assert_eq!(TransactionKind::from_str("swap"), None);
    }

    #[test]
    fn test_only_pending_is_non_terminal() {
        assert!(!TransactionStatus::Pending.is_terminal());
        assert!(TransactionStatus::Completed.is_terminal());
        assert!(TransactionStatus::Failed.is_terminal());
    }

    #[test]
    fn test_asset_serializes_with_api_field_names() {
        let asset = Asset::new("ETH", "Ether", "0x0000000000000000000000000000000000000001", 60.0);
        let json = serde_json::to_value(&asset).unwrap();
        assert_eq!(json["priceUSD"], 0.0);
        assert_eq!(json["currentValue"], 0.0);
        assert_eq!(json["change24h"], 0.0);
    }

    #[test]
    fn test_trade_action_serialization() {
        let json = serde_json::to_string(&TradeAction::Sell).unwrap();
        assert_eq!(json, r#""sell""#);
    }
}
