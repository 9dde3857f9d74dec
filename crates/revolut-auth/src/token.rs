//! Token endpoint exchange
//!
//! Both grants POST a form to `{base_url}/auth/token`. Every request carries
//! the client assertion fields (client id, the fixed JWT-bearer assertion
//! type and the signed assertion) merged with the grant parameters:
//! 1. `authorization_code` with the one-time `code`
//! 2. `refresh_token` with the held `refresh_token`
//!
//! No retries happen here. Failures carry the HTTP status and the endpoint's
//! `error` / `error_description` fields.

use std::time::Duration;

use common::Secret;
use reqwest::{StatusCode, Url};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::constants::{CLIENT_ASSERTION_TYPE, TOKEN_PATH};
use crate::environment::Environment;
use crate::error::{Error, Result};

/// Client identity presented on every token exchange.
#[derive(Debug, Clone)]
pub struct ClientCredentials {
    pub client_id: String,
    /// Signed JWT proving the client identity (see [`crate::jwt`]).
    pub assertion: Secret<String>,
}

impl ClientCredentials {
    pub fn new(client_id: impl Into<String>, assertion: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            assertion: Secret::new(assertion.into()),
        }
    }
}

/// Grant-specific parameters of a token exchange.
#[derive(Debug, Clone, Copy)]
pub enum Grant<'a> {
    AuthorizationCode { code: &'a str },
    RefreshToken { refresh_token: &'a str },
}

impl Grant<'_> {
    pub fn grant_type(&self) -> &'static str {
        match self {
            Grant::AuthorizationCode { .. } => "authorization_code",
            Grant::RefreshToken { .. } => "refresh_token",
        }
    }

    fn parameter(&self) -> (&'static str, &str) {
        match self {
            Grant::AuthorizationCode { code } => ("code", *code),
            Grant::RefreshToken { refresh_token } => ("refresh_token", *refresh_token),
        }
    }
}

/// Successful token endpoint response.
///
/// `expires_in` is a lifetime in seconds from the response time. A missing
/// `refresh_token` means the previous one stays valid.
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub expires_in: u64,
    #[serde(default)]
    pub refresh_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenErrorResponse {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
}

/// HTTP client bound to one environment's token endpoint.
#[derive(Debug, Clone)]
pub struct TokenClient {
    http: reqwest::Client,
    token_url: Url,
    timeout: Duration,
}

impl TokenClient {
    pub fn new(http: reqwest::Client, environment: &Environment, timeout: Duration) -> Result<Self> {
        Ok(Self {
            http,
            token_url: environment.join(TOKEN_PATH)?,
            timeout,
        })
    }

    pub fn token_url(&self) -> &Url {
        &self.token_url
    }

    /// Run one exchange against the token endpoint.
    pub async fn exchange(
        &self,
        credentials: &ClientCredentials,
        grant: Grant<'_>,
    ) -> Result<TokenResponse> {
        let grant_type = grant.grant_type();
        let (grant_key, grant_value) = grant.parameter();
        let form = [
            ("client_id", credentials.client_id.as_str()),
            ("client_assertion_type", CLIENT_ASSERTION_TYPE),
            ("client_assertion", credentials.assertion.expose().as_str()),
            ("grant_type", grant_type),
            (grant_key, grant_value),
        ];
        debug!(
            url = %self.token_url,
            grant_type,
            fields = ?form.iter().map(|(k, _)| *k).collect::<Vec<_>>(),
            "token request"
        );

        let response = self
            .http
            .post(self.token_url.clone())
            .timeout(self.timeout)
            .form(&form)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| self.transport_error(e))?;

        if status != StatusCode::OK {
            let message = error_message(&body);
            warn!(status = status.as_u16(), grant_type, %message, "token endpoint rejected grant");
            metrics::counter!("revolut_token_exchanges_total", "grant" => grant_type, "outcome" => "rejected")
                .increment(1);
            return Err(Error::TokenExchange {
                status: status.as_u16(),
                message,
            });
        }

        let token = serde_json::from_str::<TokenResponse>(&body)
            .map_err(|e| Error::InvalidResponse(e.to_string()))?;
        info!(
            grant_type,
            expires_in = token.expires_in,
            rotated_refresh = token.refresh_token.is_some(),
            "token exchange succeeded"
        );
        metrics::counter!("revolut_token_exchanges_total", "grant" => grant_type, "outcome" => "ok")
            .increment(1);
        Ok(token)
    }

    /// Exchange a one-time authorization code for the first token pair.
    pub async fn exchange_code(
        &self,
        credentials: &ClientCredentials,
        code: &str,
    ) -> Result<TokenResponse> {
        self.exchange(credentials, Grant::AuthorizationCode { code })
            .await
    }

    /// Obtain a fresh access token with a refresh token.
    pub async fn refresh_token(
        &self,
        credentials: &ClientCredentials,
        refresh_token: &str,
    ) -> Result<TokenResponse> {
        self.exchange(credentials, Grant::RefreshToken { refresh_token })
            .await
    }

    fn transport_error(&self, e: reqwest::Error) -> Error {
        if e.is_timeout() {
            Error::Timeout(self.timeout)
        } else {
            Error::Http(format!("token request failed: {e}"))
        }
    }
}

/// `error`, plus `": " + error_description` when present. Non-JSON bodies are
/// reported as-is.
fn error_message(body: &str) -> String {
    match serde_json::from_str::<TokenErrorResponse>(body) {
        Ok(TokenErrorResponse {
            error: None,
            error_description: None,
        }) => body.trim().to_string(),
        Ok(TokenErrorResponse {
            error: Some(error),
            error_description: Some(description),
        }) => format!("{error}: {description}"),
        Ok(TokenErrorResponse {
            error,
            error_description,
        }) => error.or(error_description).unwrap_or_default(),
        Err(_) if body.trim().is_empty() => String::from("<no body>"),
        Err(_) => body.trim().to_string(),
    }
}
