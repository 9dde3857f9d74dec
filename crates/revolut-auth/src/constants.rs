//! Revolut API constants
//!
//! Credential prefixes are issued by Revolut and treated as opaque markers:
//! the prefix alone decides which environment a token belongs to.

use std::time::Duration;

/// Prefix carried by every production credential (tokens and auth codes)
pub const PRODUCTION_PREFIX: &str = "oa_prod";

/// Prefix carried by every sandbox credential
pub const SANDBOX_PREFIX: &str = "oa_sand";

/// Business API base URL for production credentials
pub const PRODUCTION_BASE_URL: &str = "https://b2b.revolut.com/api/1.0/";

/// Business API base URL for sandbox credentials
pub const SANDBOX_BASE_URL: &str = "https://sandbox-b2b.revolut.com/api/1.0/";

/// Merchant API base URL (production)
pub const MERCHANT_PRODUCTION_BASE_URL: &str = "https://merchant.revolut.com/api/1.0/";

/// Merchant API base URL (sandbox)
pub const MERCHANT_SANDBOX_BASE_URL: &str = "https://sandbox-merchant.revolut.com/api/1.0/";

/// Token endpoint, relative to the environment base URL
pub const TOKEN_PATH: &str = "auth/token";

/// Fixed `client_assertion_type` sent with every token exchange
pub const CLIENT_ASSERTION_TYPE: &str = "urn:ietf:params:oauth:client-assertion-type:jwt-bearer";

/// Audience claim of the signed client assertion
pub const ASSERTION_AUDIENCE: &str = "https://revolut.com";

/// Per-request timeout applied when the caller does not pick one
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
