//! Environment resolution from credential prefixes
//!
//! Every Revolut credential starts with a prefix naming the environment it was
//! issued for. The prefix alone picks the API base URL and the live flag; an
//! unknown prefix is a configuration error, never a silent default.

use reqwest::Url;

use crate::constants::{
    MERCHANT_PRODUCTION_BASE_URL, MERCHANT_SANDBOX_BASE_URL, PRODUCTION_BASE_URL,
    PRODUCTION_PREFIX, SANDBOX_BASE_URL, SANDBOX_PREFIX,
};
use crate::error::{Error, Result};

/// API base URL plus whether requests touch real money.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Environment {
    base_url: String,
    is_live: bool,
}

impl Environment {
    /// Derive the environment from a credential's prefix.
    pub fn resolve(credential: &str) -> Result<Self> {
        if credential.is_empty() {
            return Err(Error::Configuration("credential is empty".into()));
        }
        if credential.starts_with(PRODUCTION_PREFIX) {
            Ok(Self::production())
        } else if credential.starts_with(SANDBOX_PREFIX) {
            Ok(Self::sandbox())
        } else {
            Err(Error::Configuration(format!(
                "credential matches neither production ({PRODUCTION_PREFIX}) nor sandbox ({SANDBOX_PREFIX}) environment"
            )))
        }
    }

    pub fn production() -> Self {
        Self {
            base_url: PRODUCTION_BASE_URL.into(),
            is_live: true,
        }
    }

    pub fn sandbox() -> Self {
        Self {
            base_url: SANDBOX_BASE_URL.into(),
            is_live: false,
        }
    }

    /// Merchant API environment. Merchant keys carry no prefix, so the caller
    /// states which side it wants.
    pub fn merchant(sandbox: bool) -> Self {
        if sandbox {
            Self {
                base_url: MERCHANT_SANDBOX_BASE_URL.into(),
                is_live: false,
            }
        } else {
            Self {
                base_url: MERCHANT_PRODUCTION_BASE_URL.into(),
                is_live: true,
            }
        }
    }

    /// Explicit base URL, e.g. a mock server or an egress proxy.
    ///
    /// A trailing slash is appended when missing so relative paths join
    /// underneath the base instead of replacing its last segment.
    pub fn custom(base_url: &str, is_live: bool) -> Result<Self> {
        let mut base_url = base_url.trim().to_string();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }
        Url::parse(&base_url)
            .map_err(|e| Error::Configuration(format!("invalid base URL {base_url}: {e}")))?;
        Ok(Self { base_url, is_live })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn is_live(&self) -> bool {
        self.is_live
    }

    /// Resolve a relative API path against the base URL.
    pub fn join(&self, path: &str) -> Result<Url> {
        Url::parse(&self.base_url)
            .and_then(|base| base.join(path))
            .map_err(|e| Error::Configuration(format!("cannot join {path} onto {}: {e}", self.base_url)))
    }
}

/// Pure prefix lookup: `oa_prod…` is production, `oa_sand…` is sandbox.
pub fn resolve_environment(credential: &str) -> Result<Environment> {
    Environment::resolve(credential)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn production_prefix_is_live() {
        let env = resolve_environment("oa_prod_mx4sDGo356ZndtVsOq16SBri").unwrap();
        assert!(env.is_live());
        assert_eq!(env.base_url(), PRODUCTION_BASE_URL);
    }

    #[test]
    fn sandbox_prefix_is_not_live() {
        let env = resolve_environment("oa_sand_mx4sDGo356ZndtVsOq16SBri").unwrap();
        assert!(!env.is_live());
        assert_eq!(env.base_url(), SANDBOX_BASE_URL);
    }

    #[test]
    fn suffix_does_not_influence_result() {
        for suffix in ["", "x", "_0123456789", "-with-dashes", "ÜnïcødÉ"] {
            assert_eq!(
                resolve_environment(&format!("oa_prod{suffix}")).unwrap(),
                Environment::production()
            );
            assert_eq!(
                resolve_environment(&format!("oa_sand{suffix}")).unwrap(),
                Environment::sandbox()
            );
        }
    }

    #[test]
    fn unknown_prefixes_are_configuration_errors() {
        for credential in ["whatever", "prod_abc", "sand_abc", "OA_PROD_abc", "oa_pro", " oa_prod"] {
            let err = resolve_environment(credential).unwrap_err();
            assert!(
                matches!(err, Error::Configuration(_)),
                "{credential} must be rejected, got {err:?}"
            );
        }
    }

    #[test]
    fn empty_credential_is_rejected() {
        assert!(matches!(
            resolve_environment(""),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn error_message_does_not_echo_the_credential() {
        let err = resolve_environment("secret-token-value").unwrap_err();
        assert!(!err.to_string().contains("secret-token-value"));
    }

    #[test]
    fn resolution_is_idempotent() {
        let a = resolve_environment("oa_sand_token").unwrap();
        let b = resolve_environment("oa_sand_token").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn join_places_paths_under_api_version() {
        let url = Environment::sandbox().join("auth/token").unwrap();
        assert_eq!(url.as_str(), "https://sandbox-b2b.revolut.com/api/1.0/auth/token");
    }

    #[test]
    fn custom_base_url_gets_trailing_slash() {
        let env = Environment::custom("http://127.0.0.1:8080/api/1.0", false).unwrap();
        assert_eq!(env.base_url(), "http://127.0.0.1:8080/api/1.0/");
        assert_eq!(
            env.join("accounts").unwrap().as_str(),
            "http://127.0.0.1:8080/api/1.0/accounts"
        );
    }

    #[test]
    fn custom_base_url_must_parse() {
        assert!(matches!(
            Environment::custom("not a url", false),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn merchant_environment_follows_sandbox_flag() {
        assert!(!Environment::merchant(true).is_live());
        assert_eq!(Environment::merchant(true).base_url(), MERCHANT_SANDBOX_BASE_URL);
        assert!(Environment::merchant(false).is_live());
        assert_eq!(Environment::merchant(false).base_url(), MERCHANT_PRODUCTION_BASE_URL);
    }
}
