//! Command-line arguments and environment configuration.

use std::path::PathBuf;
use std::time::Duration;

use clap::{ArgAction, Parser, Subcommand};

pub const DEFAULT_DATA_DIR: &str = "./pocketledger-data";
pub const DEFAULT_PROBE_INTERVAL_SECS: u64 = 15;

/// Keeps the local PocketLedger store in sync with the data API.
///
/// Every option can also be set through the environment, optionally loaded
/// from a `.env` file in the working directory.
#[derive(Parser, Debug, Clone)]
#[clap(author, version, about)]
pub struct Args {
    /// Base URL of the data API, e.g. https://api.pocketledger.app
    #[clap(long, env = "DATA_API_URL", value_name = "URL")]
    pub api_url: Option<String>,

    /// Directory holding the local database
    #[clap(
        long,
        env = "POCKETLEDGER_DATA_DIR",
        value_name = "DIR",
        default_value = DEFAULT_DATA_DIR
    )]
    pub data_dir: PathBuf,

    /// Seconds between connectivity probes
    #[clap(
        long,
        env = "POCKETLEDGER_PROBE_INTERVAL_SECS",
        value_name = "SECONDS",
        default_value_t = DEFAULT_PROBE_INTERVAL_SECS,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub probe_interval_secs: u64,

    /// Retry draining with backoff while changes remain queued
    #[clap(
        long,
        env = "POCKETLEDGER_RETRY_INTERVAL",
        value_name = "BOOL",
        default_value_t = true,
        action = ArgAction::Set
    )]
    pub retry_interval: bool,

    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Probe connectivity and drain the queue whenever the API becomes reachable
    Run,
    /// Drain the queue once and print the report
    Drain,
    /// Show the cached snapshot and the pending queue
    Status,
    /// Store the API token used for background sync
    Login { token: String },
    /// Forget the stored API token
    Logout,
    /// Drop every queued change without sending it
    ClearQueue,
}

/// Settings the runtime needs, resolved from [`Args`].
#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub api_url: Option<String>,
    pub data_dir: PathBuf,
    pub probe_interval: Duration,
    pub retry_while_pending: bool,
}

impl AgentConfig {
    pub fn data_dir_str(&self) -> String {
        self.data_dir.to_string_lossy().to_string()
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            api_url: None,
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            probe_interval: Duration::from_secs(DEFAULT_PROBE_INTERVAL_SECS),
            retry_while_pending: true,
        }
    }
}

impl From<&Args> for AgentConfig {
    fn from(args: &Args) -> Self {
        Self {
            api_url: normalize_api_url(args.api_url.as_deref()),
            data_dir: args.data_dir.clone(),
            probe_interval: Duration::from_secs(args.probe_interval_secs),
            retry_while_pending: args.retry_interval,
        }
    }
}

fn normalize_api_url(raw: Option<&str>) -> Option<String> {
    raw.map(|v| v.trim().trim_end_matches('/').to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_url_is_trimmed_and_blank_is_ignored() {
        assert_eq!(
            normalize_api_url(Some(" https://api.example.com/ ")),
            Some("https://api.example.com".to_string())
        );
        assert_eq!(normalize_api_url(Some("   ")), None);
        assert_eq!(normalize_api_url(None), None);
    }

    #[test]
    fn flags_override_defaults() {
        let args = Args::try_parse_from([
            "pocketledger-sync-agent",
            "--api-url",
            "http://localhost:8080/",
            "--data-dir",
            "/tmp/ledger",
            "--probe-interval-secs",
            "3",
            "--retry-interval",
            "false",
            "run",
        ])
        .expect("parse args");

        let config = AgentConfig::from(&args);
        assert_eq!(config.api_url.as_deref(), Some("http://localhost:8080"));
        assert_eq!(config.data_dir, PathBuf::from("/tmp/ledger"));
        assert_eq!(config.probe_interval, Duration::from_secs(3));
        assert!(!config.retry_while_pending);
        assert_eq!(args.command, Command::Run);
    }

    #[test]
    fn zero_probe_interval_is_rejected() {
        let result = Args::try_parse_from([
            "pocketledger-sync-agent",
            "--probe-interval-secs",
            "0",
            "status",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn login_takes_a_token() {
        let args = Args::try_parse_from(["pocketledger-sync-agent", "login", "abc123"])
            .expect("parse args");
        assert_eq!(
            args.command,
            Command::Login {
                token: "abc123".to_string()
            }
        );
    }
}
