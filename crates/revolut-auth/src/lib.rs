//! Revolut API authentication library
//!
//! Resolves the API environment from credential prefixes, exchanges grants at
//! the token endpoint and keeps sessions that hand out valid access tokens.
//! The crate knows nothing about business endpoints; `revolut-api` builds on
//! the [`Session`] trait.
//!
//! Credential flow:
//! 1. Sign a client assertion once with `jwt::sign_assertion()`
//! 2. Exchange the one-time authorization code via a `TokenProvider`
//! 3. Persist the resulting pair with `credentials::SessionFile::save()`
//! 4. On later runs rebuild a `RenewableSession` from the stored pair
//! 5. The session renews its access token whenever it is missing or expired

pub mod clock;
pub mod constants;
pub mod credentials;
pub mod environment;
pub mod error;
pub mod jwt;
pub mod session;
pub mod token;

pub use clock::{Clock, ManualClock, SystemClock};
pub use constants::*;
pub use credentials::{SessionFile, StoredSession};
pub use environment::{Environment, resolve_environment};
pub use error::{Error, Result};
pub use jwt::{DEFAULT_ASSERTION_LIFETIME, sign_assertion};
pub use session::{
    FixedTokenSession, RenewableSession, Session, SessionOptions, TokenFuture, TokenProvider,
    TokenStatus,
};
pub use token::{ClientCredentials, Grant, TokenClient, TokenResponse};
