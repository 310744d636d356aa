//! REST API surface: one router per subsystem merged under shared layers.

pub mod routes;

pub use routes::{build_router, AppState};
