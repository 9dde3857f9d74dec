//! Authenticated request execution
//!
//! Every call pulls the current token from the session (renewing it first if
//! needed), sends the request with `Authorization: Bearer <token>` and turns
//! the response into parsed JSON, `None` for 204, or a classified
//! [`ApiError`](crate::error::ApiError). Nothing is retried here.

use std::time::{Duration, Instant};

use reqwest::{Method, StatusCode, Url};
use revolut_auth::{DEFAULT_TIMEOUT, Environment, Session};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, error};

use crate::classify::classify_response;
use crate::error::{Error, Result};
use crate::metrics;

/// Client-side knobs shared by the API clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientConfig {
    /// Applied to every request, token exchanges excluded.
    pub timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl ClientConfig {
    pub fn with_timeout(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub fn validate(&self) -> Result<()> {
        if self.timeout.is_zero() {
            return Err(revolut_auth::Error::Configuration("timeout must be greater than zero".into()).into());
        }
        Ok(())
    }
}

/// Sends requests on behalf of one session.
pub struct RequestExecutor {
    session: Box<dyn Session>,
    http: reqwest::Client,
    timeout: Duration,
}

impl RequestExecutor {
    pub fn new(session: Box<dyn Session>, config: ClientConfig) -> Result<Self> {
        Self::with_http(session, reqwest::Client::new(), config)
    }

    /// Reuse an existing connection pool.
    pub fn with_http(
        session: Box<dyn Session>,
        http: reqwest::Client,
        config: ClientConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            session,
            http,
            timeout: config.timeout,
        })
    }

    pub fn session(&self) -> &dyn Session {
        self.session.as_ref()
    }

    pub fn environment(&self) -> &Environment {
        self.session.environment()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run one request. `body` is sent as JSON only when present.
    pub async fn execute(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<Option<Value>> {
        self.send(method, path, &[], body).await
    }

    pub async fn get(&self, path: &str, query: &[(&str, String)]) -> Result<Option<Value>> {
        self.send(Method::GET, path, query, None).await
    }

    pub async fn post(&self, path: &str, body: &impl Serialize) -> Result<Option<Value>> {
        let body = to_value(body)?;
        self.send(Method::POST, path, &[], Some(&body)).await
    }

    pub async fn patch(&self, path: &str, body: &impl Serialize) -> Result<Option<Value>> {
        let body = to_value(body)?;
        self.send(Method::PATCH, path, &[], Some(&body)).await
    }

    pub async fn delete(&self, path: &str) -> Result<Option<Value>> {
        self.send(Method::DELETE, path, &[], None).await
    }

    /// GET a resource and decode it into `T`.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        match self.get(path, query).await? {
            Some(value) => decode(value),
            None => Err(Error::Decode(format!("{path} returned no content"))),
        }
    }

    fn url(&self, path: &str) -> Result<Url> {
        let base = self.environment().base_url();
        Url::parse(base)
            .and_then(|base| base.join(path.trim_start_matches('/')))
            .map_err(|e| Error::InvalidRequest(format!("cannot resolve {path} against {base}: {e}")))
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&Value>,
    ) -> Result<Option<Value>> {
        let url = self.url(path)?;
        let token = self.session.current_token().await?;

        debug!(%method, path, "request");
        if let Some(body) = body {
            debug!(path, body = %body, "request body");
        }

        let mut request = self
            .http
            .request(method.clone(), url.clone())
            .timeout(self.timeout)
            .bearer_auth(token);
        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let started = Instant::now();
        let response = request.send().await.map_err(|e| self.transport_error(&url, e))?;
        let status = response.status();

        if status == StatusCode::NO_CONTENT {
            metrics::record_request(method.as_str(), status.as_u16(), started.elapsed().as_secs_f64());
            debug!(%method, path, status = status.as_u16(), "no content");
            return Ok(None);
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| self.transport_error(&url, e))?;
        metrics::record_request(method.as_str(), status.as_u16(), started.elapsed().as_secs_f64());
        let parsed = serde_json::from_slice::<Value>(&bytes);

        if !status.is_success() {
            let err = classify_response(status.as_u16(), parsed.as_ref().ok());
            error!(
                status = status.as_u16(),
                %url,
                kind = %err.kind,
                message = %err.message,
                "request failed"
            );
            metrics::record_classified(err.kind);
            return Err(err.into());
        }

        let value = parsed.map_err(|e| {
            metrics::record_error("decode");
            Error::Decode(format!("{path}: {e}"))
        })?;
        debug!(path, result = %value, "response");
        Ok(Some(value))
    }

    fn transport_error(&self, url: &Url, e: reqwest::Error) -> Error {
        if e.is_timeout() {
            error!(%url, timeout = ?self.timeout, "request timed out");
            metrics::record_error("timeout");
            Error::Timeout(self.timeout)
        } else {
            error!(%url, error = %e, "request failed before a response arrived");
            metrics::record_error("transport");
            Error::Transport(e.to_string())
        }
    }
}

/// Serialize a request body. Decimals stay exact.
pub fn to_value(body: &impl Serialize) -> Result<Value> {
    serde_json::to_value(body).map_err(|e| Error::InvalidRequest(format!("serializing body: {e}")))
}

/// Decode a parsed response into a model.
pub fn decode<T: DeserializeOwned>(value: Value) -> Result<T> {
    serde_json::from_value(value).map_err(|e| Error::Decode(e.to_string()))
}
