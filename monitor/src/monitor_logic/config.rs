use anyhow::{Context, Result};
use clap::Parser;
use lib_lockfeed::FeedConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const CONFIG_FILE_NAME: &str = "hot_accounts_monitor.conf";

#[derive(Parser, Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
#[clap(about = "Live console monitor for hot-account lock contention", version)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[clap(long, env = "LOCK_MONITOR_CONFIG_PATH", help = "Path to the JSON configuration file.")]
    pub config_path: Option<PathBuf>,

    #[clap(long, env = "LOCK_MONITOR_LOG_DIR", help = "Directory for log files.")]
    pub log_dir: Option<PathBuf>,

    #[clap(long, env = "LOCK_MONITOR_LOG_LEVEL", help = "Logging level (trace, debug, info, warn, error).")]
    pub log_level: Option<String>,

    #[clap(long, env = "LOCK_API_URL", help = "Base URL of the lock contention REST API.")]
    pub api_url: Option<String>,

    #[clap(long, env = "LOCK_WS_URL", help = "WebSocket URL of the hot-accounts stream.")]
    pub ws_url: Option<String>,

    #[clap(long, env = "LOCK_POLL_INTERVAL_MS", help = "Interval in milliseconds between REST polls.")]
    pub poll_interval_ms: Option<u64>,

    #[clap(long, env = "LOCK_RECONNECT_DELAY_MS", help = "Fixed delay in milliseconds before reconnecting the stream.")]
    pub reconnect_delay_ms: Option<u64>,

    #[clap(long, env = "LOCK_HOT_ACCOUNTS_LIMIT", help = "Number of hot accounts requested per poll.")]
    pub hot_accounts_limit: Option<u32>,

    #[clap(long, env = "LOCK_WINDOW_MINUTES", help = "Aggregation window in minutes.")]
    pub window_minutes: Option<u32>,

    #[clap(long, env = "LOCK_REQUEST_TIMEOUT_MS", help = "Per-request HTTP timeout in milliseconds.")]
    pub request_timeout_ms: Option<u64>,

    #[clap(long, env = "LOCK_HTTP_RETRIES", help = "Retries for transient HTTP failures.")]
    pub http_retries: Option<u32>,

    #[clap(long, env = "LOCK_MONITOR_TOP", help = "Number of accounts shown in the console summary.")]
    pub top: Option<usize>,
}

impl Config {
    // 'other' overrides 'self' for Some values
    fn merge(self, other: Config) -> Config {
        Config {
            config_path: other.config_path.or(self.config_path),
            log_dir: other.log_dir.or(self.log_dir),
            log_level: other.log_level.or(self.log_level),
            api_url: other.api_url.or(self.api_url),
            ws_url: other.ws_url.or(self.ws_url),
            poll_interval_ms: other.poll_interval_ms.or(self.poll_interval_ms),
            reconnect_delay_ms: other.reconnect_delay_ms.or(self.reconnect_delay_ms),
            hot_accounts_limit: other.hot_accounts_limit.or(self.hot_accounts_limit),
            window_minutes: other.window_minutes.or(self.window_minutes),
            request_timeout_ms: other.request_timeout_ms.or(self.request_timeout_ms),
            http_retries: other.http_retries.or(self.http_retries),
            top: other.top.or(self.top),
        }
    }

    pub fn defaults() -> Config {
        let feed = FeedConfig::default();
        Config {
            log_dir: Some(PathBuf::from("./logs")),
            log_level: Some("info".to_string()),
            api_url: Some(feed.api_url),
            ws_url: Some(feed.ws_url),
            poll_interval_ms: Some(feed.poll_interval.as_millis() as u64),
            reconnect_delay_ms: Some(feed.reconnect_delay.as_millis() as u64),
            hot_accounts_limit: Some(feed.hot_accounts_limit),
            window_minutes: Some(feed.window_minutes),
            request_timeout_ms: Some(feed.request_timeout.as_millis() as u64),
            http_retries: Some(feed.http_retries),
            top: Some(10),
            ..Default::default()
        }
    }

    pub fn log_dir(&self) -> &Path {
        self.log_dir.as_deref().unwrap_or(Path::new("./logs"))
    }

    pub fn log_level(&self) -> &str {
        self.log_level.as_deref().unwrap_or("info")
    }

    pub fn top(&self) -> usize {
        self.top.unwrap_or(10)
    }

    /// Settings for the live feed; unset fields keep the library defaults.
    pub fn feed_config(&self) -> FeedConfig {
        let mut feed = FeedConfig::default();
        if let Some(url) = &self.api_url {
            feed.api_url = url.clone();
        }
        if let Some(url) = &self.ws_url {
            feed.ws_url = url.clone();
        }
        if let Some(ms) = self.poll_interval_ms.filter(|ms| *ms > 0) {
            feed.poll_interval = Duration::from_millis(ms);
        }
        if let Some(ms) = self.reconnect_delay_ms.filter(|ms| *ms > 0) {
            feed.reconnect_delay = Duration::from_millis(ms);
        }
        if let Some(limit) = self.hot_accounts_limit {
            feed.hot_accounts_limit = limit;
        }
        if let Some(window) = self.window_minutes {
            feed.window_minutes = window;
        }
        if let Some(ms) = self.request_timeout_ms.filter(|ms| *ms > 0) {
            feed.request_timeout = Duration::from_millis(ms);
        }
        if let Some(retries) = self.http_retries {
            feed.http_retries = retries;
        }
        feed
    }
}

/// Defaults, then the JSON config file, then environment and CLI.
pub fn load_config() -> Result<Config> {
    // A missing .env is normal.
    let _ = dotenvy::dotenv();
    layer_config(Config::parse())
}

fn layer_config(cli: Config) -> Result<Config> {
    let mut current_config = Config::defaults();

    if let Some(path) = resolve_config_file(cli.config_path.as_deref()) {
        let file_config = read_config_file(&path)?;
        current_config = current_config.merge(file_config);
        current_config.config_path = Some(path);
    }

    Ok(current_config.merge(cli))
}

/// An explicit path is always used; otherwise the working directory is
/// searched first, then the user's config directory.
fn resolve_config_file(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    let local = PathBuf::from(CONFIG_FILE_NAME);
    if local.exists() {
        return Some(local);
    }
    dirs::config_dir()
        .map(|dir| dir.join("lockfeed").join(CONFIG_FILE_NAME))
        .filter(|path| path.exists())
}

fn read_config_file(path: &Path) -> Result<Config> {
    let config_str =
        fs::read_to_string(path).with_context(|| format!("Failed to read config file: {}", path.display()))?;
    serde_json::from_str::<Config>(&config_str)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}
