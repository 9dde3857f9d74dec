//! Error types for credential and token operations

use std::time::Duration;

/// Errors from environment resolution, token exchange and session upkeep.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Unrecognized credential prefix or otherwise unusable configuration.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The token endpoint rejected the grant.
    #[error("token exchange failed ({status}): {message}")]
    TokenExchange { status: u16, message: String },

    #[error("token endpoint timed out after {0:?}")]
    Timeout(Duration),

    #[error("HTTP request failed: {0}")]
    Http(String),

    /// The token endpoint answered 200 with a body we cannot use.
    #[error("invalid token response: {0}")]
    InvalidResponse(String),

    #[error("{0} doesn't support refreshing an access token")]
    RenewalUnsupported(&'static str),

    #[error("credential parse error: {0}")]
    CredentialParse(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("assertion signing failed: {0}")]
    Signing(String),
}

impl Error {
    /// Whether a caller may reasonably retry the same operation unchanged.
    pub fn is_transient(&self) -> bool {
        match self {
            Error::TokenExchange { status, .. } => *status >= 500,
            Error::Timeout(_) | Error::Http(_) => true,
            _ => false,
        }
    }
}

/// Result alias for auth operations.
pub type Result<T> = std::result::Result<T, Error>;
