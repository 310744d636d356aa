//! Price Oracle
//!
//! Current USD price and 24h change per asset symbol, served from a per-symbol
//! time-bounded cache in front of a pluggable `PriceSource`.

pub mod oracle;
pub mod source;

pub use oracle::{CacheStats, PriceOracle, PriceOracleConfig};
pub use source::{PriceSource, SimulatedPriceSource, StaticPriceSource};
