//! Wallet Identity
//! Mission: One custodial sub-address per user, created exactly once

pub mod address;
pub mod api;
pub mod mapper;
pub mod store;

pub use address::{generate_address, is_valid_address, normalize_address, validate_address};
pub use api::{wallet_router, WalletState};
pub use mapper::WalletMapper;
pub use store::WalletStore;
