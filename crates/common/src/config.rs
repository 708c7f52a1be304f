use std::path::PathBuf;
use std::time::Duration;

use crate::{Error, Result};

/// Settings shared by every binary, loaded from the environment at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Root of the `<YYYYMMDD>/<TICKER>.log` tree.
    pub bars_dir: PathBuf,

    // Notifications
    pub telegram_token: Option<String>,
    pub notify_recipients: Vec<String>,

    /// Optional TOML file with strategy parameters.
    pub strategy_config_path: Option<PathBuf>,
}

impl Config {
    /// Load from environment variables, reading `.env` first if present.
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv(); // ignore error if .env not present

        Config {
            bars_dir: optional_env("BARS_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("bars")),
            telegram_token: optional_env("TELEGRAM_TOKEN").filter(|t| !t.is_empty()),
            notify_recipients: optional_env("NOTIFY_RECIPIENTS")
                .map(|v| split_list(&v))
                .unwrap_or_default(),
            strategy_config_path: optional_env("STRATEGY_CONFIG_PATH").map(PathBuf::from),
        }
    }
}

/// Provider connection settings, only needed by the ingestion daemon.
#[derive(Debug, Clone)]
pub struct StreamConfig {
    pub api_base_url: String,
    pub barcharts_uri: String,
    pub access_token: String,
    /// Connect timeout and per-read timeout of the streaming request.
    pub request_timeout: Duration,
    /// `barsback` sent on every (re)connect.
    pub backlog: u32,
}

impl StreamConfig {
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv();

        Ok(StreamConfig {
            api_base_url: required_env("API_BASE_URL")?,
            barcharts_uri: optional_env("API_STREAM_BARCHARTS_URI")
                .unwrap_or_else(|| "stream/barcharts".to_string()),
            access_token: required_env("ACCESS_TOKEN")?,
            request_timeout: Duration::from_secs(parse_env("REQUEST_TIMEOUT_SECS", 10)?),
            backlog: parse_env("STREAM_BACKLOG", 10)?,
        })
    }
}

/// Split a comma-separated list, dropping blanks.
pub fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn required_env(key: &str) -> Result<String> {
    std::env::var(key).map_err(|_| {
        Error::Config(format!(
            "Required environment variable '{key}' is not set. Check your .env file."
        ))
    })
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> Result<T> {
    match optional_env(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| Error::Config(format!("{key} must be numeric, got: '{raw}'"))),
        None => Ok(default),
    }
}
