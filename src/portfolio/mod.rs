//! Portfolio Engine
//! Mission: Value weighted baskets and run deposit, rebalance, withdraw and
//! disable through one audited pipeline
//!
//! Layout:
//! - `valuation`: pure repricing of holdings
//! - `engine`: pure holdings transformations per operation
//! - `ledger`: pending -> completed | failed audit entries
//! - `settlement`: where trades leave the process
//! - `service`: the pipeline tying the above to storage
//! - `api`: HTTP surface

pub mod api;
pub mod db;
pub mod engine;
pub mod ledger;
pub mod service;
pub mod settlement;
pub mod valuation;

pub use api::{portfolio_router, PortfolioState};
pub use db::PortfolioDb;
pub use ledger::TransactionLedger;
pub use service::{NewAsset, NewPortfolio, OperationOutcome, PortfolioOverview, PortfolioService};
pub use settlement::{
    DeterministicSettlement, SettlementExecutor, SettlementReceipt, SettlementRequest,
    SettlementStatus, SimulatedSettlement, SimulatedSettlementConfig,
};
pub use valuation::{aggregate, valuate};
