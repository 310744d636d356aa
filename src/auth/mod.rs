//! Authentication Module
//! Mission: Wallet proof of possession via EIP-712 signatures, JWT sessions

pub mod api;
pub mod authenticator;
pub mod jwt;
pub mod typed_data;

pub use api::{auth_router, AuthError, AuthState};
pub use authenticator::{check_window, Session, SignatureAuthenticator};
pub use jwt::{Claims, JwtHandler};
pub use typed_data::TermsDomain;
