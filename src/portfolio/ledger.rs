use chrono::Duration;
use tracing::{debug, info};
use uuid::Uuid;

use super::db::{now_millis, PortfolioDb};
use crate::error::ServiceError;
use crate::models::{Transaction, TransactionKind, TransactionStatus};

/// Audit trail of mutating operations.
///
/// Each entry is opened `pending` and closed exactly once as `completed` or
/// `failed`. Closed entries never change again.
#[derive(Clone)]
pub struct TransactionLedger {
    db: PortfolioDb,
}

impl TransactionLedger {
    pub fn new(db: PortfolioDb) -> Self {
        Self { db }
    }

    pub async fn open(
        &self,
        portfolio_id: &str,
        owner_address: &str,
        kind: TransactionKind,
        amount: f64,
    ) -> Result<Transaction, ServiceError> {
        let entry = Transaction {
            id: format!("tx_{}", Uuid::new_v4().simple()),
            portfolio_id: portfolio_id.to_string(),
            owner_address: owner_address.to_string(),
            kind,
            amount,
            status: TransactionStatus::Pending,
            settlement_ref: None,
            error_detail: None,
            created_at: now_millis(),
            finalized_at: None,
        };

        self.db.insert_transaction(&entry).await?;
        debug!(transaction_id = %entry.id, portfolio_id, kind = kind.as_str(), amount, "ledger entry opened");
        Ok(entry)
    }

    pub async fn finalize(
        &self,
        transaction_id: &str,
        status: TransactionStatus,
        settlement_ref: Option<&str>,
        error_detail: Option<&str>,
    ) -> Result<Transaction, ServiceError> {
        if !status.is_terminal() {
            return Err(ServiceError::InvalidRequest(
                "a ledger entry can only be finalized as completed or failed".to_string(),
            ));
        }

        let moved = self
            .db
            .finalize_transaction(transaction_id, status, settlement_ref, error_detail, now_millis())
            .await?;

        let entry = self
            .db
            .get_transaction(transaction_id)
            .await?
            .ok_or_else(|| ServiceError::TransactionNotFound(transaction_id.to_string()))?;

        if !moved {
            return Err(ServiceError::TransactionFinalized {
                id: entry.id,
                status: entry.status,
            });
        }

        info!(
            transaction_id,
            status = status.as_str(),
            settlement_ref = settlement_ref.unwrap_or("-"),
            "ledger entry finalized"
        );
        Ok(entry)
    }

    pub async fn get(&self, transaction_id: &str) -> Result<Option<Transaction>, ServiceError> {
        Ok(self.db.get_transaction(transaction_id).await?)
    }

    pub async fn list_for_portfolio(&self, portfolio_id: &str) -> Result<Vec<Transaction>, ServiceError> {
        Ok(self.db.list_transactions(portfolio_id).await?)
    }

    /// Entries that have stayed pending for at least `age`.
    pub async fn pending_older_than(&self, age: Duration) -> Result<Vec<Transaction>, ServiceError> {
        let cutoff = now_millis().checked_sub_signed(age).ok_or_else(|| {
            ServiceError::InvalidRequest("Pending age is out of range".to_string())
        })?;
        Ok(self.db.list_pending_before(cutoff).await?)
    }
}
