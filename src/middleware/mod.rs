//! HTTP middleware: request logging with request ids.

pub mod logging;

pub use logging::{request_logging, REQUEST_ID_HEADER};
