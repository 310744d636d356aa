use chrono::Duration;
use futures_util::future::join_all;
use serde::Deserialize;
use std::{collections::HashSet, sync::Arc};
use tracing::{error, info, warn};
use uuid::Uuid;

use super::db::{now_millis, PortfolioDb};
use super::engine::{self, Transformation};
use super::ledger::TransactionLedger;
use super::settlement::{SettlementExecutor, SettlementRequest, SettlementStatus};
use super::valuation::{aggregate, valuate_with_oracle};
use crate::chain::{to_base_units, usdc_address, USDC_DECIMALS};
use crate::error::ServiceError;
use crate::locks::KeyedLocks;
use crate::models::{
    Asset, Portfolio, PortfolioStats, Trade, Transaction, TransactionKind, TransactionStatus,
};
use crate::pricing::PriceOracle;
use crate::wallets::{generate_address, validate_address, WalletMapper};

/// Allowed deviation of the weight sum from 100.
pub const WEIGHT_TOLERANCE: f64 = 0.01;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAsset {
    pub symbol: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(alias = "address")]
    pub contract_address: String,
    pub weight: f64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPortfolio {
    pub name: String,
    #[serde(alias = "userAddress")]
    pub owner_address: String,
    pub assets: Vec<NewAsset>,
}

#[derive(Debug, Clone)]
pub struct OperationOutcome {
    pub transaction_id: String,
    pub settlement_ref: String,
    pub trades: Vec<Trade>,
    pub portfolio: Portfolio,
    /// Value before the operation, after repricing
    pub value_before: f64,
}

#[derive(Debug, Clone)]
pub struct PortfolioOverview {
    pub portfolios: Vec<Portfolio>,
    pub stats: PortfolioStats,
}

/// Settlement inputs that come from the request rather than the holdings.
#[derive(Debug, Clone, Default)]
struct SettlementContext {
    recipient: Option<String>,
    funding_ref: Option<String>,
}

pub struct PortfolioService {
    db: PortfolioDb,
    ledger: TransactionLedger,
    oracle: Arc<PriceOracle>,
    settlement: Arc<dyn SettlementExecutor>,
    wallets: Option<Arc<WalletMapper>>,
    locks: KeyedLocks,
    chain_id: u64,
}

impl PortfolioService {
    pub fn new(
        db: PortfolioDb,
        oracle: Arc<PriceOracle>,
        settlement: Arc<dyn SettlementExecutor>,
        chain_id: u64,
    ) -> Self {
        Self {
            ledger: TransactionLedger::new(db.clone()),
            db,
            oracle,
            settlement,
            wallets: None,
            locks: KeyedLocks::new(),
            chain_id,
        }
    }

    /// Make sure owners have a sub-wallet when they create a portfolio.
    pub fn with_wallets(mut self, wallets: Arc<WalletMapper>) -> Self {
        self.wallets = Some(wallets);
        self
    }

    pub async fn create_portfolio(&self, req: NewPortfolio) -> Result<Portfolio, ServiceError> {
        let name = req.name.trim();
        if name.is_empty() {
            return Err(ServiceError::InvalidRequest("Portfolio name is required".to_string()));
        }
        let owner = validate_address(&req.owner_address)?.to_lowercase();
        let assets = validate_assets(&req.assets)?;

        if let Some(wallets) = &self.wallets {
            let mapping = wallets.get_or_create(&owner).await?;
            info!(owner = %owner, sub_wallet = %mapping.sub_wallet_address, "owner sub-wallet ready");
        }

        let now = now_millis();
        let portfolio = Portfolio {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            owner_address: owner,
            smart_account_address: generate_address()?,
            total_value: 0.0,
            change_24h: 0.0,
            change_24h_percentage: 0.0,
            is_active: true,
            assets,
            created_at: now,
            updated_at: now,
        };

        self.db.create_portfolio(&portfolio).await?;
        info!(
            portfolio_id = %portfolio.id,
            owner = %portfolio.owner_address,
            assets = portfolio.assets.len(),
            "portfolio created"
        );
        Ok(portfolio)
    }

    /// All of an owner's portfolios at current prices, with totals.
    pub async fn list_portfolios(&self, owner_address: &str) -> Result<PortfolioOverview, ServiceError> {
        let owner = validate_address(owner_address)?.to_lowercase();
        let stored = self.db.list_by_owner(&owner).await?;

        let portfolios =
            join_all(stored.iter().map(|p| valuate_with_oracle(&self.oracle, p))).await;
        let stats = aggregate(&portfolios);

        Ok(PortfolioOverview { portfolios, stats })
    }

    pub async fn get_portfolio(&self, portfolio_id: &str) -> Result<Portfolio, ServiceError> {
        let stored = self.load(portfolio_id).await?;
        Ok(valuate_with_oracle(&self.oracle, &stored).await)
    }

    pub async fn transactions(&self, portfolio_id: &str) -> Result<Vec<Transaction>, ServiceError> {
        self.load(portfolio_id).await?;
        self.ledger.list_for_portfolio(portfolio_id).await
    }

    pub async fn pending_transactions(&self, older_than: Duration) -> Result<Vec<Transaction>, ServiceError> {
        self.ledger.pending_older_than(older_than).await
    }

    pub async fn deposit(
        &self,
        portfolio_id: &str,
        amount: f64,
        funding_ref: Option<String>,
    ) -> Result<OperationOutcome, ServiceError> {
        let ctx = SettlementContext {
            funding_ref,
            ..Default::default()
        };
        self.run_operation(portfolio_id, TransactionKind::Deposit, ctx, |p| {
            engine::deposit(p, amount)
        })
        .await
    }

    pub async fn rebalance(
        &self,
        portfolio_id: &str,
        funding_ref: Option<String>,
    ) -> Result<OperationOutcome, ServiceError> {
        let ctx = SettlementContext {
            funding_ref,
            ..Default::default()
        };
        self.run_operation(portfolio_id, TransactionKind::Rebalance, ctx, |p| {
            Ok(engine::rebalance(p))
        })
        .await
    }

    pub async fn withdraw(
        &self,
        portfolio_id: &str,
        amount: f64,
        recipient: &str,
    ) -> Result<OperationOutcome, ServiceError> {
        let recipient = validate_address(recipient)?;
        let ctx = SettlementContext {
            recipient: Some(recipient),
            ..Default::default()
        };
        self.run_operation(portfolio_id, TransactionKind::Withdraw, ctx, |p| {
            engine::withdraw(p, amount)
        })
        .await
    }

    pub async fn disable(&self, portfolio_id: &str) -> Result<OperationOutcome, ServiceError> {
        self.run_operation(
            portfolio_id,
            TransactionKind::Disable,
            SettlementContext::default(),
            |p| Ok(engine::disable(p)),
        )
        .await
    }

    async fn load(&self, portfolio_id: &str) -> Result<Portfolio, ServiceError> {
        self.db
            .get_portfolio(portfolio_id)
            .await?
            .ok_or_else(|| ServiceError::PortfolioNotFound(portfolio_id.to_string()))
    }

    /// Shared shape of every mutating operation:
    /// reprice, transform, open ledger entry, settle, persist, finalize.
    ///
    /// Runs under the portfolio's lock. Validation failures in `transform`
    /// happen before anything is written.
    async fn run_operation<F>(
        &self,
        portfolio_id: &str,
        kind: TransactionKind,
        ctx: SettlementContext,
        transform: F,
    ) -> Result<OperationOutcome, ServiceError>
    where
        F: FnOnce(&Portfolio) -> Result<Transformation, ServiceError> + Send,
    {
        let _guard = self.locks.lock(portfolio_id).await;

        let stored = self.load(portfolio_id).await?;
        if !stored.is_active && kind != TransactionKind::Disable {
            return Err(ServiceError::PortfolioInactive(portfolio_id.to_string()));
        }

        let current = valuate_with_oracle(&self.oracle, &stored).await;
        let Transformation {
            mut portfolio,
            trades,
            ledger_amount,
        } = transform(&current)?;
        portfolio.updated_at = now_millis();

        let request = SettlementRequest {
            portfolio_id: portfolio.id.clone(),
            kind,
            settlement_address: portfolio.smart_account_address.clone(),
            amount_usd: ledger_amount,
            amount_base_units: to_base_units(ledger_amount, USDC_DECIMALS)
                .map_err(|e| ServiceError::InvalidRequest(e.to_string()))?,
            token_address: usdc_address(self.chain_id).to_string(),
            recipient: ctx.recipient,
            funding_ref: ctx.funding_ref,
            trades: trades.clone(),
        };

        let entry = self
            .ledger
            .open(&portfolio.id, &portfolio.owner_address, kind, ledger_amount)
            .await?;

        let receipt = match self.settlement.settle(&request).await {
            Ok(receipt) if receipt.status == SettlementStatus::Confirmed => receipt,
            Ok(receipt) => {
                let detail = receipt
                    .detail
                    .unwrap_or_else(|| "settlement rejected".to_string());
                return Err(self
                    .fail_entry(&entry.id, Some(&receipt.reference), detail)
                    .await);
            }
            Err(e) => {
                return Err(self.fail_entry(&entry.id, None, format!("{e:#}")).await);
            }
        };

        if let Err(e) = self.db.update_holdings(&portfolio).await {
            error!(
                transaction_id = %entry.id,
                portfolio_id,
                settlement_ref = %receipt.reference,
                "holdings update failed after settlement, ledger entry left pending: {e:#}"
            );
            return Err(ServiceError::Storage(e));
        }

        if let Err(e) = self
            .ledger
            .finalize(&entry.id, TransactionStatus::Completed, Some(&receipt.reference), None)
            .await
        {
            error!(
                transaction_id = %entry.id,
                portfolio_id,
                "ledger finalize failed, entry left pending: {}",
                e
            );
            return Err(e);
        }

        info!(
            portfolio_id,
            kind = kind.as_str(),
            amount = ledger_amount,
            trades = trades.len(),
            total_value = portfolio.total_value,
            "operation completed"
        );

        Ok(OperationOutcome {
            transaction_id: entry.id,
            settlement_ref: receipt.reference,
            trades,
            portfolio,
            value_before: current.total_value,
        })
    }

    async fn fail_entry(
        &self,
        transaction_id: &str,
        settlement_ref: Option<&str>,
        detail: String,
    ) -> ServiceError {
        warn!(transaction_id, "settlement failed: {}", detail);
        if let Err(e) = self
            .ledger
            .finalize(transaction_id, TransactionStatus::Failed, settlement_ref, Some(&detail))
            .await
        {
            error!(transaction_id, "could not mark ledger entry failed, left pending: {}", e);
        }
        ServiceError::Settlement(detail)
    }
}

/// Asset list checks for a new portfolio. Returns the assets to store.
pub fn validate_assets(assets: &[NewAsset]) -> Result<Vec<Asset>, ServiceError> {
    if assets.is_empty() {
        return Err(ServiceError::InvalidRequest(
            "A portfolio needs at least one asset".to_string(),
        ));
    }

    let mut seen = HashSet::new();
    let mut out = Vec::with_capacity(assets.len());

    for a in assets {
        let symbol = a.symbol.trim();
        if symbol.is_empty() {
            return Err(ServiceError::InvalidRequest("Asset symbol is required".to_string()));
        }
        if !seen.insert(symbol.to_uppercase()) {
            return Err(ServiceError::InvalidRequest(format!(
                "Duplicate asset symbol: {}",
                symbol
            )));
        }
        if !a.weight.is_finite() || !(0.0..=100.0).contains(&a.weight) {
            return Err(ServiceError::InvalidRequest(format!(
                "Weight for {} must be between 0 and 100",
                symbol
            )));
        }
        let contract = validate_address(&a.contract_address)?;
        let name = a
            .name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .unwrap_or(symbol);

        out.push(Asset::new(symbol, name, &contract, a.weight));
    }

    let total: f64 = out.iter().map(|a| a.weight).sum();
    if (total - 100.0).abs() > WEIGHT_TOLERANCE {
        return Err(ServiceError::InvalidWeights { total });
    }

    Ok(out)
}
