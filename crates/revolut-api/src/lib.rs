//! Revolut business and merchant API clients
//!
//! Builds on `revolut-auth` sessions. Every request goes through
//! [`RequestExecutor`], which attaches the session's current token and maps
//! non-2xx responses to an [`ApiError`] with a fixed [`ErrorKind`]. Callers
//! branch on the kind, never on message text.
//!
//! Request path:
//! 1. Client method builds the path and optional query/body
//! 2. Executor asks the session for a token (renewing if expired)
//! 3. Response 204 becomes `None`, 2xx is parsed with exact decimals
//! 4. Anything else is classified by status and message

pub mod business;
pub mod classify;
pub mod error;
pub mod executor;
pub mod merchant;
pub mod metrics;
pub mod models;

pub use business::{BusinessClient, TransactionFilter};
pub use classify::{NO_MESSAGE, classify, classify_response};
pub use error::{ApiError, Error, ErrorFamily, ErrorKind, Result};
pub use executor::{ClientConfig, RequestExecutor};
pub use merchant::{MerchantClient, OrderUpdate};
pub use models::{
    Account, Counterparty, CounterpartyAccount, Direction, Order, Transaction, TransactionLeg,
    TransactionType,
};
