//! Command line parsing

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{ArgAction, Parser, Subcommand};
use revolut_api::TransactionType;

use crate::config::Overrides;

/// Revolut Business command line client
#[derive(Debug, Parser)]
#[command(name = "revolut", version, about, long_about = None)]
#[command(after_help = "Credentials must form one of: (client_id, jwt, refresh_token), \
(client_id, jwt, auth_code) or (access_token). Flags override the environment, \
which overrides the config file.")]
pub struct Cli {
    /// Config file [default: revolut.toml]
    #[arg(short, long, env = "REVOLUT_CONFIG", global = true)]
    pub config: Option<String>,

    /// More log output (-v info, -vv debug); LOG_LEVEL and RUST_LOG win
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Write the (possibly rotated) session back to the session file
    #[arg(short, long, global = true)]
    pub write: bool,

    /// Print Prometheus metrics to stderr on exit
    #[arg(long, global = true)]
    pub metrics: bool,

    #[command(flatten)]
    pub overrides: Overrides,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Renew (or bootstrap) the session and print it
    Token,
    /// List accounts
    Accounts,
    /// List counterparties
    Counterparties,
    /// List transactions
    Transactions {
        /// First day, YYYY-MM-DD
        #[arg(long, value_parser = parse_date)]
        from: Option<NaiveDate>,
        /// Last day, YYYY-MM-DD
        #[arg(long, value_parser = parse_date)]
        to: Option<NaiveDate>,
        /// Transaction type, e.g. card_payment
        #[arg(long = "type", value_parser = parse_tx_type)]
        tx_type: Option<TransactionType>,
        /// Counterparty id
        #[arg(long)]
        counterparty: Option<String>,
    },
    /// Print a signed client assertion (uses --client-id / client_id)
    Jwt {
        /// RSA private key, PEM
        #[arg(long)]
        key: PathBuf,
        /// Redirect URI domain registered with the certificate
        #[arg(long)]
        issuer: String,
    },
}

fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|e| format!("expected YYYY-MM-DD: {e}"))
}

fn parse_tx_type(raw: &str) -> Result<TransactionType, String> {
    raw.parse()
}
