//! Configuration types and loading
//!
//! Precedence: CLI flags > env vars > config file > defaults. Secrets may
//! live in the TOML file but are better passed through the environment:
//! `REVOLUT_ACCESS_TOKEN`, `REVOLUT_REFRESH_TOKEN`, `REVOLUT_JWT` and
//! `REVOLUT_AUTH_CODE`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use common::Secret;
use serde::Deserialize;

pub const DEFAULT_CONFIG_PATH: &str = "revolut.toml";
pub const DEFAULT_SESSION_FILE: &str = "revolut-session.json";

const COMBINATIONS: &str = "(client_id, jwt, refresh_token), (client_id, jwt, auth_code) or (access_token)";

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub jwt: Option<Secret<String>>,
    #[serde(default)]
    pub refresh_token: Option<Secret<String>>,
    #[serde(default)]
    pub access_token: Option<Secret<String>>,
    #[serde(default)]
    pub auth_code: Option<Secret<String>>,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    /// Where `-w` persists the renewed session; also read on startup.
    #[serde(default)]
    pub session_file: Option<PathBuf>,
    /// Replaces the prefix-derived API base URL.
    #[serde(default)]
    pub base_url: Option<String>,
}

fn default_timeout() -> u64 {
    10
}

impl Default for Config {
    fn default() -> Self {
        Self {
            client_id: None,
            jwt: None,
            refresh_token: None,
            access_token: None,
            auth_code: None,
            timeout_secs: default_timeout(),
            session_file: None,
            base_url: None,
        }
    }
}

/// Credential flags; each beats the environment and the config file.
#[derive(Debug, Default, Clone, PartialEq, Eq, clap::Args)]
pub struct Overrides {
    /// Business API client id
    #[arg(short = 'u', long, global = true)]
    pub client_id: Option<String>,
    /// Signed client assertion
    #[arg(short, long, global = true)]
    pub jwt: Option<String>,
    #[arg(short, long, global = true)]
    pub refresh_token: Option<String>,
    /// Access token used as is, never renewed
    #[arg(short, long, global = true)]
    pub access_token: Option<String>,
    /// One-time authorization code
    #[arg(short = 't', long, global = true)]
    pub auth_code: Option<String>,
}

/// Which session the available credentials allow.
#[cfg_attr(test, derive(Debug))]
pub enum SessionSpec<'a> {
    Renewable {
        client_id: &'a str,
        jwt: &'a str,
        refresh_token: &'a str,
        access_token: Option<&'a str>,
    },
    Provider {
        client_id: &'a str,
        jwt: &'a str,
        auth_code: &'a str,
    },
    Fixed {
        access_token: &'a str,
    },
}

impl Config {
    /// Load the TOML file, overlay env vars and validate.
    ///
    /// A missing file is only an error when the path was asked for
    /// explicitly; the default location may be absent.
    pub fn load(path: &Path, explicit: bool) -> common::Result<Self> {
        let mut config = match std::fs::read_to_string(path) {
            Ok(contents) => toml::from_str(&contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound && !explicit => Config::default(),
            Err(e) => return Err(e.into()),
        };
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    fn apply_env(&mut self) {
        let secret = |key: &str| {
            std::env::var(key)
                .ok()
                .filter(|v| !v.is_empty())
                .map(Secret::new)
        };
        if let Some(token) = secret("REVOLUT_ACCESS_TOKEN") {
            self.access_token = Some(token);
        }
        if let Some(token) = secret("REVOLUT_REFRESH_TOKEN") {
            self.refresh_token = Some(token);
        }
        if let Some(jwt) = secret("REVOLUT_JWT") {
            self.jwt = Some(jwt);
        }
        if let Some(code) = secret("REVOLUT_AUTH_CODE") {
            self.auth_code = Some(code);
        }
    }

    pub fn validate(&self) -> common::Result<()> {
        if self.timeout_secs == 0 {
            return Err(common::Error::Config(
                "timeout_secs must be greater than 0".into(),
            ));
        }
        if let Some(base_url) = &self.base_url
            && !base_url.starts_with("http://")
            && !base_url.starts_with("https://")
        {
            return Err(common::Error::Config(format!(
                "base_url must start with http:// or https://, got: {base_url}"
            )));
        }
        Ok(())
    }

    /// Apply CLI flags on top of file and env values.
    pub fn apply_overrides(&mut self, overrides: &Overrides) {
        if let Some(client_id) = &overrides.client_id {
            self.client_id = Some(client_id.clone());
        }
        if let Some(jwt) = &overrides.jwt {
            self.jwt = Some(Secret::new(jwt.clone()));
        }
        if let Some(token) = &overrides.refresh_token {
            self.refresh_token = Some(Secret::new(token.clone()));
        }
        if let Some(token) = &overrides.access_token {
            self.access_token = Some(Secret::new(token.clone()));
        }
        if let Some(code) = &overrides.auth_code {
            self.auth_code = Some(Secret::new(code.clone()));
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn session_file(&self) -> PathBuf {
        self.session_file
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_SESSION_FILE))
    }

    /// Pick the longest-lived session the credentials allow.
    pub fn session_spec(&self) -> common::Result<SessionSpec<'_>> {
        let client_id = self.client_id.as_deref().filter(|s| !s.is_empty());

        match (
            client_id,
            expose(&self.jwt),
            expose(&self.refresh_token),
            expose(&self.auth_code),
            expose(&self.access_token),
        ) {
            (Some(client_id), Some(jwt), Some(refresh_token), _, access_token) => {
                Ok(SessionSpec::Renewable {
                    client_id,
                    jwt,
                    refresh_token,
                    access_token,
                })
            }
            (Some(client_id), Some(jwt), None, Some(auth_code), _) => Ok(SessionSpec::Provider {
                client_id,
                jwt,
                auth_code,
            }),
            (_, _, _, _, Some(access_token)) => Ok(SessionSpec::Fixed { access_token }),
            _ => Err(common::Error::Config(format!(
                "not enough data to build a session; config requires one of {COMBINATIONS}"
            ))),
        }
    }

    /// Resolve the config file path from `-c` / `REVOLUT_CONFIG`. The flag
    /// says whether the path was given explicitly.
    pub fn resolve_path(cli_path: Option<&str>) -> (PathBuf, bool) {
        match cli_path {
            Some(p) => (PathBuf::from(p), true),
            None => (PathBuf::from(DEFAULT_CONFIG_PATH), false),
        }
    }
}

fn expose(secret: &Option<Secret<String>>) -> Option<&str> {
    secret
        .as_ref()
        .map(|s| s.expose().as_str())
        .filter(|s| !s.is_empty())
}
