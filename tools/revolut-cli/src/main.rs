//! Revolut command line tool
//!
//! Thin wrapper over the client crates:
//! 1. Resolves credentials from flags, env vars, the config file and the
//!    stored session file
//! 2. Builds the longest-lived session they allow
//! 3. Runs one command and prints JSON to stdout
//! 4. With `-w`, writes the (possibly rotated) session back to disk

mod cli;
mod config;

use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::Parser;
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use revolut_api::{BusinessClient, ClientConfig, TransactionFilter};
use revolut_auth::{
    ClientCredentials, DEFAULT_ASSERTION_LIFETIME, Environment, FixedTokenSession,
    RenewableSession, Session, SessionFile, SessionOptions, StoredSession, TokenProvider,
    sign_assertion,
};
use serde::Serialize;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::{Cli, Command};
use crate::config::{Config, SessionSpec};

/// Session built from the configuration, kept concrete so renewable state
/// can be persisted after the command.
enum CliSession {
    Renewable(Arc<RenewableSession>),
    Fixed(Arc<FixedTokenSession>),
}

impl CliSession {
    fn shared(&self) -> Box<dyn Session> {
        match self {
            CliSession::Renewable(session) => Box::new(session.clone()),
            CliSession::Fixed(session) => Box::new(session.clone()),
        }
    }
}

fn init_tracing(verbosity: u8) {
    let fallback = match verbosity {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_env("LOG_LEVEL")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(fallback));

    let registry = tracing_subscriber::registry().with(filter);
    if std::env::var("LOG_FORMAT").is_ok_and(|f| f == "json") {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

fn install_metrics() -> Result<PrometheusHandle> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Full("revolut_api_request_duration_seconds".to_string()),
            revolut_api::metrics::DURATION_BUCKETS,
        )
        .context("configuring histogram buckets")?
        .install_recorder()
        .context("installing Prometheus recorder")
}

fn print_json(value: &impl Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn session_options(config: &Config, seed: &str) -> Result<SessionOptions> {
    let mut options = SessionOptions {
        timeout: config.timeout(),
        ..SessionOptions::default()
    };
    if let Some(base_url) = &config.base_url {
        let is_live = Environment::resolve(seed).is_ok_and(|env| env.is_live());
        options.environment = Some(Environment::custom(base_url, is_live)?);
    }
    Ok(options)
}

/// Build the session: a stored session file wins, then the key combinations.
async fn build_session(config: &Config, session_file: &SessionFile) -> Result<CliSession> {
    if let Some(stored) = session_file.load().await? {
        info!(path = %session_file.path().display(), "resuming stored session");
        let options = session_options(config, &stored.refresh_token)?;
        let session = RenewableSession::from_stored(&stored, options)?;
        return Ok(CliSession::Renewable(Arc::new(session)));
    }

    match config.session_spec()? {
        SessionSpec::Renewable {
            client_id,
            jwt,
            refresh_token,
            access_token,
        } => {
            let options = session_options(config, refresh_token)?;
            let mut session = RenewableSession::with_options(
                refresh_token,
                ClientCredentials::new(client_id, jwt),
                options,
            )?;
            if let Some(access_token) = access_token {
                // Expiry unknown; the first use renews it.
                session = session.with_access_token(access_token, None);
            }
            Ok(CliSession::Renewable(Arc::new(session)))
        }
        SessionSpec::Provider {
            client_id,
            jwt,
            auth_code,
        } => {
            let credentials = ClientCredentials::new(client_id, jwt);
            let provider = TokenProvider::with_options(
                auth_code,
                credentials,
                session_options(config, auth_code)?,
            )?;
            let stored = provider
                .bootstrap()
                .await
                .context("exchanging authorization code")?;
            // The code is spent; persist right away so the pair isn't lost.
            session_file.save(&stored).await?;
            warn!(
                path = %session_file.path().display(),
                "authorization code exchanged; session saved, remove auth_code from config"
            );
            let options = session_options(config, &stored.refresh_token)?;
            let session = RenewableSession::from_stored(&stored, options)?;
            Ok(CliSession::Renewable(Arc::new(session)))
        }
        SessionSpec::Fixed { access_token } => {
            let session = match &config.base_url {
                Some(_) => {
                    let environment = session_options(config, access_token)?
                        .environment
                        .context("base_url configured but not applied")?;
                    FixedTokenSession::with_environment(access_token, environment)?
                }
                None => FixedTokenSession::new(access_token)?,
            };
            Ok(CliSession::Fixed(Arc::new(session)))
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let (config_path, explicit) = Config::resolve_path(cli.config.as_deref());
    debug!(path = %config_path.display(), "loading configuration");
    let mut config = Config::load(&config_path, explicit)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;
    config.apply_overrides(&cli.overrides);

    if let Command::Jwt { key, issuer } = &cli.command {
        let client_id = config
            .client_id
            .as_deref()
            .context("jwt needs a client id (--client-id or client_id in config)")?;
        let pem = std::fs::read(key).with_context(|| format!("reading {}", key.display()))?;
        println!(
            "{}",
            sign_assertion(&pem, issuer, client_id, DEFAULT_ASSERTION_LIFETIME)?
        );
        return Ok(());
    }

    let session_file = SessionFile::new(config.session_file());
    let session = build_session(&config, &session_file).await?;
    let client = BusinessClient::new(
        session.shared(),
        ClientConfig::with_timeout(config.timeout()),
    )?;
    info!(live = client.is_live(), "client ready");

    match &cli.command {
        Command::Token => {
            let CliSession::Renewable(renewable) = &session else {
                bail!("a fixed access token cannot be renewed");
            };
            renewable.refresh_access_token().await?;
            print_json(&renewable.to_stored().await)?;
        }
        Command::Accounts => print_json(&client.accounts().await?)?,
        Command::Counterparties => print_json(&client.counterparties().await?)?,
        Command::Transactions {
            from,
            to,
            tx_type,
            counterparty,
        } => {
            let filter = TransactionFilter {
                counterparty: counterparty.clone(),
                from: *from,
                to: *to,
                tx_type: *tx_type,
            };
            print_json(&client.transactions(&filter).await?)?;
        }
        Command::Jwt { .. } => {}
    }

    if cli.write {
        match &session {
            CliSession::Renewable(renewable) => {
                let stored: StoredSession = renewable.to_stored().await;
                session_file.save(&stored).await?;
                info!(path = %session_file.path().display(), "session written");
            }
            CliSession::Fixed(_) => warn!("-w ignored: a fixed access token has nothing to persist"),
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_tracing(cli.verbose);
    let metrics = if cli.metrics {
        Some(install_metrics()?)
    } else {
        None
    };

    let result = run(cli).await;

    if let Some(handle) = metrics {
        eprintln!("{}", handle.render());
    }
    result
}
