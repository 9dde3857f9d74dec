//! Session state machine
//!
//! A session hands out a valid access token on demand. Three variants:
//! - [`FixedTokenSession`] wraps a pre-obtained token and cannot renew it.
//! - [`RenewableSession`] holds a refresh token and renews the access token
//!   whenever it is missing or expired.
//! - [`TokenProvider`] starts from a one-time authorization code, exchanges it
//!   on first access, then renews like a [`RenewableSession`].
//!
//! Token states for the renewable variants:
//! - NoToken → Valid (exchange success)
//! - NoToken → NoToken (exchange failure, error surfaced)
//! - Valid → Expired (time passes the expiry instant; expiry == now is expired)
//! - Expired → Valid (refresh success)
//! - Expired → Expired (refresh failure, error surfaced)
//!
//! The whole "check expiry, maybe renew, read token" sequence runs under one
//! async mutex, so concurrent callers never trigger duplicate renewals.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use common::Secret;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::clock::{Clock, SystemClock};
use crate::constants::DEFAULT_TIMEOUT;
use crate::credentials::StoredSession;
use crate::environment::Environment;
use crate::error::{Error, Result};
use crate::token::{ClientCredentials, TokenClient, TokenResponse};

/// Boxed future returned by [`Session`] token accessors.
pub type TokenFuture<'a> = Pin<Box<dyn Future<Output = Result<String>> + Send + 'a>>;

/// Anything that can produce a valid access token on demand.
///
/// Uses `Pin<Box<dyn Future>>` return types so clients can hold `Box<dyn Session>`.
pub trait Session: Send + Sync {
    /// Variant name for logging and error messages.
    fn kind(&self) -> &'static str;

    /// Environment the session's credentials belong to.
    fn environment(&self) -> &Environment;

    /// Current valid access token, renewing first when needed.
    fn current_token(&self) -> TokenFuture<'_>;

    /// Renew unconditionally and return the new access token.
    fn refresh_access_token(&self) -> TokenFuture<'_>;
}

impl<S: Session + ?Sized> Session for Arc<S> {
    fn kind(&self) -> &'static str {
        (**self).kind()
    }

    fn environment(&self) -> &Environment {
        (**self).environment()
    }

    fn current_token(&self) -> TokenFuture<'_> {
        (**self).current_token()
    }

    fn refresh_access_token(&self) -> TokenFuture<'_> {
        (**self).refresh_access_token()
    }
}

/// Observable token state of a renewable session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenStatus {
    NoToken,
    Valid,
    Expired,
}

/// Knobs shared by the renewable variants.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Overrides the prefix-derived environment (mock servers, proxies).
    pub environment: Option<Environment>,
    /// Timeout for each token endpoint request.
    pub timeout: Duration,
    pub http: reqwest::Client,
    pub clock: Arc<dyn Clock>,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            environment: None,
            timeout: DEFAULT_TIMEOUT,
            http: reqwest::Client::new(),
            clock: Arc::new(SystemClock),
        }
    }
}

/// Session around an access token obtained elsewhere. Lives as long as the
/// token does; renewal is unsupported.
pub struct FixedTokenSession {
    environment: Environment,
    token: Secret<String>,
}

impl FixedTokenSession {
    /// Wrap a token, deriving the environment from its prefix.
    pub fn new(access_token: impl Into<String>) -> Result<Self> {
        let token = access_token.into();
        let environment = Environment::resolve(&token)?;
        Ok(Self {
            environment,
            token: Secret::new(token),
        })
    }

    /// Wrap a token for an explicitly chosen environment. Merchant secret keys
    /// carry no prefix and come through here.
    pub fn with_environment(access_token: impl Into<String>, environment: Environment) -> Result<Self> {
        let token = access_token.into();
        if token.is_empty() {
            return Err(Error::Configuration("access token is empty".into()));
        }
        Ok(Self {
            environment,
            token: Secret::new(token),
        })
    }
}

impl Session for FixedTokenSession {
    fn kind(&self) -> &'static str {
        "FixedTokenSession"
    }

    fn environment(&self) -> &Environment {
        &self.environment
    }

    fn current_token(&self) -> TokenFuture<'_> {
        let token = self.token.expose().clone();
        Box::pin(async move { Ok(token) })
    }

    fn refresh_access_token(&self) -> TokenFuture<'_> {
        Box::pin(async { Err(Error::RenewalUnsupported("FixedTokenSession")) })
    }
}

struct TokenState {
    access_token: Option<Secret<String>>,
    /// Unix milliseconds. `None` with a token present counts as expired.
    expires_at: Option<u64>,
    refresh_token: Option<Secret<String>>,
    auth_code: Option<Secret<String>>,
    auth_code_spent: bool,
}

impl TokenState {
    fn status(&self, now: u64) -> TokenStatus {
        match (&self.access_token, self.expires_at) {
            (None, _) => TokenStatus::NoToken,
            (Some(_), Some(expires_at)) if now < expires_at => TokenStatus::Valid,
            (Some(_), _) => TokenStatus::Expired,
        }
    }

    /// Store a successful exchange. Expiry counts from `issued_at`, taken
    /// before the request was sent.
    fn apply(&mut self, response: TokenResponse, issued_at: u64) -> String {
        let lifetime_millis = response.expires_in.saturating_mul(1000);
        if let Some(rotated) = response.refresh_token {
            self.refresh_token = Some(Secret::new(rotated));
        }
        self.expires_at = Some(issued_at.saturating_add(lifetime_millis));
        self.access_token = Some(Secret::new(response.access_token.clone()));
        response.access_token
    }
}

/// Shared machinery of the renewable variants.
struct Lifecycle {
    kind: &'static str,
    environment: Environment,
    credentials: ClientCredentials,
    token_client: TokenClient,
    clock: Arc<dyn Clock>,
    state: Mutex<TokenState>,
}

impl Lifecycle {
    fn build(
        kind: &'static str,
        seed: &str,
        credentials: ClientCredentials,
        options: SessionOptions,
        state: TokenState,
    ) -> Result<Self> {
        if seed.is_empty() {
            return Err(Error::Configuration(format!("{kind} requires a non-empty credential")));
        }
        if credentials.client_id.is_empty() || credentials.assertion.expose().is_empty() {
            return Err(Error::Configuration(format!(
                "{kind} requires a client id and a signed assertion"
            )));
        }
        let environment = match options.environment {
            Some(environment) => environment,
            None => Environment::resolve(seed)?,
        };
        let token_client = TokenClient::new(options.http, &environment, options.timeout)?;
        Ok(Self {
            kind,
            environment,
            credentials,
            token_client,
            clock: options.clock,
            state: Mutex::new(state),
        })
    }

    async fn current_token(&self) -> Result<String> {
        let mut state = self.state.lock().await;
        let status = state.status(self.clock.now_millis());
        if status == TokenStatus::Valid
            && let Some(token) = &state.access_token
        {
            return Ok(token.expose().clone());
        }
        debug!(session = self.kind, ?status, "access token unusable, renewing");
        self.renew(&mut state).await
    }

    async fn force_renew(&self) -> Result<String> {
        let mut state = self.state.lock().await;
        self.renew(&mut state).await
    }

    async fn renew(&self, state: &mut TokenState) -> Result<String> {
        let issued_at = self.clock.now_millis();
        let response = match (&state.refresh_token, &state.auth_code) {
            (Some(refresh), _) => {
                self.token_client
                    .refresh_token(&self.credentials, refresh.expose())
                    .await?
            }
            (None, Some(code)) if !state.auth_code_spent => {
                let response = self
                    .token_client
                    .exchange_code(&self.credentials, code.expose())
                    .await?;
                state.auth_code_spent = true;
                response
            }
            (None, _) => {
                return Err(Error::Configuration(format!(
                    "{} has no refresh token and its authorization code is spent",
                    self.kind
                )));
            }
        };
        let token = state.apply(response, issued_at);
        info!(
            session = self.kind,
            expires_at = state.expires_at.unwrap_or_default(),
            "access token renewed"
        );
        Ok(token)
    }

    async fn status(&self) -> TokenStatus {
        self.state.lock().await.status(self.clock.now_millis())
    }

    async fn stored(&self) -> Option<StoredSession> {
        let state = self.state.lock().await;
        let refresh_token = state.refresh_token.as_ref()?.expose().clone();
        Some(StoredSession {
            client_id: self.credentials.client_id.clone(),
            jwt: self.credentials.assertion.expose().clone(),
            refresh_token,
            access_token: state.access_token.as_ref().map(|t| t.expose().clone()),
            access_token_expires: state.expires_at,
        })
    }
}

/// Long-term session that renews its access token with a refresh token.
pub struct RenewableSession {
    inner: Lifecycle,
}

impl RenewableSession {
    /// Session with default options; the environment comes from the refresh
    /// token's prefix. No network call happens until the first token access.
    pub fn new(refresh_token: impl Into<String>, credentials: ClientCredentials) -> Result<Self> {
        Self::with_options(refresh_token, credentials, SessionOptions::default())
    }

    pub fn with_options(
        refresh_token: impl Into<String>,
        credentials: ClientCredentials,
        options: SessionOptions,
    ) -> Result<Self> {
        let refresh_token = refresh_token.into();
        let inner = Lifecycle::build(
            "RenewableSession",
            &refresh_token,
            credentials,
            options,
            TokenState {
                access_token: None,
                expires_at: None,
                refresh_token: Some(Secret::new(refresh_token.clone())),
                auth_code: None,
                auth_code_spent: false,
            },
        )?;
        Ok(Self { inner })
    }

    /// Seed a previously obtained access token.
    ///
    /// Without `expires_at` (unix millis) the token counts as expired, so the
    /// first access renews it.
    pub fn with_access_token(mut self, access_token: impl Into<String>, expires_at: Option<u64>) -> Self {
        let state = self.inner.state.get_mut();
        state.access_token = Some(Secret::new(access_token.into()));
        state.expires_at = expires_at;
        self
    }

    /// Rebuild a session persisted with [`RenewableSession::to_stored`].
    pub fn from_stored(stored: &StoredSession, options: SessionOptions) -> Result<Self> {
        let session = Self::with_options(
            stored.refresh_token.clone(),
            ClientCredentials::new(stored.client_id.clone(), stored.jwt.clone()),
            options,
        )?;
        Ok(match &stored.access_token {
            Some(token) => session.with_access_token(token.clone(), stored.access_token_expires),
            None => session,
        })
    }

    pub fn client_id(&self) -> &str {
        &self.inner.credentials.client_id
    }

    pub async fn status(&self) -> TokenStatus {
        self.inner.status().await
    }

    /// Currently held refresh token (after any rotation).
    pub async fn refresh_token(&self) -> String {
        self.inner
            .state
            .lock()
            .await
            .refresh_token
            .as_ref()
            .map(|t| t.expose().clone())
            .unwrap_or_default()
    }

    /// Snapshot for persistence.
    pub async fn to_stored(&self) -> StoredSession {
        match self.inner.stored().await {
            Some(stored) => stored,
            None => StoredSession {
                client_id: self.inner.credentials.client_id.clone(),
                jwt: self.inner.credentials.assertion.expose().clone(),
                refresh_token: String::new(),
                access_token: None,
                access_token_expires: None,
            },
        }
    }
}

impl Session for RenewableSession {
    fn kind(&self) -> &'static str {
        self.inner.kind
    }

    fn environment(&self) -> &Environment {
        &self.inner.environment
    }

    fn current_token(&self) -> TokenFuture<'_> {
        Box::pin(self.inner.current_token())
    }

    fn refresh_access_token(&self) -> TokenFuture<'_> {
        Box::pin(self.inner.force_renew())
    }
}

/// Obtains the first token pair by spending an authorization code.
///
/// The code is single-use. Once exchanged, the provider renews with the
/// refresh token it received and never sends the code again. The intended
/// flow is to call [`TokenProvider::bootstrap`], persist the result and
/// continue with a [`RenewableSession`].
pub struct TokenProvider {
    inner: Lifecycle,
}

impl TokenProvider {
    pub fn new(auth_code: impl Into<String>, credentials: ClientCredentials) -> Result<Self> {
        Self::with_options(auth_code, credentials, SessionOptions::default())
    }

    pub fn with_options(
        auth_code: impl Into<String>,
        credentials: ClientCredentials,
        options: SessionOptions,
    ) -> Result<Self> {
        let auth_code = auth_code.into();
        let inner = Lifecycle::build(
            "TokenProvider",
            &auth_code,
            credentials,
            options,
            TokenState {
                access_token: None,
                expires_at: None,
                refresh_token: None,
                auth_code: Some(Secret::new(auth_code.clone())),
                auth_code_spent: false,
            },
        )?;
        Ok(Self { inner })
    }

    /// Whether the authorization code has been exchanged.
    pub async fn auth_code_spent(&self) -> bool {
        self.inner.state.lock().await.auth_code_spent
    }

    pub async fn status(&self) -> TokenStatus {
        self.inner.status().await
    }

    /// Make sure a token pair is held and return it in persistable form.
    pub async fn bootstrap(&self) -> Result<StoredSession> {
        self.inner.current_token().await?;
        self.inner.stored().await.ok_or_else(|| {
            Error::InvalidResponse("token endpoint issued no refresh token for the authorization code".into())
        })
    }
}

impl Session for TokenProvider {
    fn kind(&self) -> &'static str {
        self.inner.kind
    }

    fn environment(&self) -> &Environment {
        &self.inner.environment
    }

    fn current_token(&self) -> TokenFuture<'_> {
        Box::pin(self.inner.current_token())
    }

    fn refresh_access_token(&self) -> TokenFuture<'_> {
        Box::pin(self.inner.force_renew())
    }
}

#[cfg(test)]
impl std::fmt::Debug for RenewableSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenewableSession").finish_non_exhaustive()
    }
}
