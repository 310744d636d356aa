use anyhow::Result;
use num_bigint::BigUint;
use parking_lot::Mutex;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::time::{sleep, Duration};
use tracing::debug;

use crate::models::{Trade, TransactionKind};

/// Longest simulated confirmation wait we allow.
pub const MAX_SETTLEMENT_DELAY: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct SettlementRequest {
    pub portfolio_id: String,
    pub kind: TransactionKind,
    /// Custodial account the trades run from
    pub settlement_address: String,
    pub amount_usd: f64,
    /// `amount_usd` in stablecoin base units
    pub amount_base_units: BigUint,
    pub token_address: String,
    pub recipient: Option<String>,
    /// User-submitted transfer funding this operation
    pub funding_ref: Option<String>,
    pub trades: Vec<Trade>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SettlementStatus {
    Confirmed,
    Rejected,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettlementReceipt {
    pub reference: String,
    pub status: SettlementStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Carries out the trades of one operation and reports a reference.
#[async_trait::async_trait]
pub trait SettlementExecutor: Send + Sync {
    async fn settle(&self, req: &SettlementRequest) -> Result<SettlementReceipt>;
}

/// Per-operation confirmation delays for the simulated executor
#[derive(Debug, Clone)]
pub struct SimulatedSettlementConfig {
    pub withdraw_delay: Duration,
    pub rebalance_delay: Duration,
    pub disable_delay: Duration,
}

impl SimulatedSettlementConfig {
    pub fn from_millis(withdraw_ms: u64, rebalance_ms: u64, disable_ms: u64) -> Self {
        Self {
            withdraw_delay: Duration::from_millis(withdraw_ms),
            rebalance_delay: Duration::from_millis(rebalance_ms),
            disable_delay: Duration::from_millis(disable_ms),
        }
        .clamped()
    }

    /// No waiting at all.
    pub fn instant() -> Self {
        Self::from_millis(0, 0, 0)
    }

    fn clamped(mut self) -> Self {
        self.withdraw_delay = self.withdraw_delay.min(MAX_SETTLEMENT_DELAY);
        self.rebalance_delay = self.rebalance_delay.min(MAX_SETTLEMENT_DELAY);
        self.disable_delay = self.disable_delay.min(MAX_SETTLEMENT_DELAY);
        self
    }

    /// Deposits reallocate like a rebalance and wait as long.
    pub fn delay_for(&self, kind: TransactionKind) -> Duration {
        match kind {
            TransactionKind::Withdraw => self.withdraw_delay,
            TransactionKind::Rebalance | TransactionKind::Deposit => self.rebalance_delay,
            TransactionKind::Disable => self.disable_delay,
        }
    }
}

/// Stand-in for an on-chain broadcaster: waits, then confirms with a random
/// 32-byte reference.
pub struct SimulatedSettlement {
    config: SimulatedSettlementConfig,
}

impl SimulatedSettlement {
    pub fn new(config: SimulatedSettlementConfig) -> Self {
        Self { config }
    }
}

#[async_trait::async_trait]
impl SettlementExecutor for SimulatedSettlement {
    async fn settle(&self, req: &SettlementRequest) -> Result<SettlementReceipt> {
        let delay = self.config.delay_for(req.kind);
        debug!(
            portfolio_id = %req.portfolio_id,
            kind = req.kind.as_str(),
            base_units = %req.amount_base_units,
            trades = req.trades.len(),
            delay_ms = delay.as_millis() as u64,
            "simulating settlement"
        );
        sleep(delay).await;

        let bytes: [u8; 32] = rand::thread_rng().gen();
        Ok(SettlementReceipt {
            reference: format!("0x{}", hex::encode(bytes)),
            status: SettlementStatus::Confirmed,
            detail: None,
        })
    }
}

/// Predictable executor: references count up from `0x…01`, and it can be
/// told to reject everything.
#[derive(Default)]
pub struct DeterministicSettlement {
    counter: AtomicU64,
    reject_with: Option<String>,
    requests: Mutex<Vec<SettlementRequest>>,
}

impl DeterministicSettlement {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rejecting(reason: &str) -> Self {
        Self {
            reject_with: Some(reason.to_string()),
            ..Self::default()
        }
    }

    /// Every request seen so far, in order.
    pub fn requests(&self) -> Vec<SettlementRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait::async_trait]
impl SettlementExecutor for DeterministicSettlement {
    async fn settle(&self, req: &SettlementRequest) -> Result<SettlementReceipt> {
        self.requests.lock().push(req.clone());
        let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        let reference = format!("0x{:064x}", n);

        Ok(match &self.reject_with {
            Some(reason) => SettlementReceipt {
                reference,
                status: SettlementStatus::Rejected,
                detail: Some(reason.clone()),
            },
            None => SettlementReceipt {
                reference,
                status: SettlementStatus::Confirmed,
                detail: None,
            },
        })
    }
}
