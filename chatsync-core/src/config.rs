//! Configuration loading and management
//!
//! Configuration is loaded from `~/.config/chatsync/config.toml`
//!
//! This module follows the XDG Base Directory Specification:
//! - Config: `$XDG_CONFIG_HOME/chatsync/` (~/.config/chatsync/)
//! - State/Logs: `$XDG_STATE_HOME/chatsync/` (~/.local/state/chatsync/)

use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Returns a best-effort home directory path.
fn home_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Returns XDG_CONFIG_HOME or ~/.config
fn xdg_config_home() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".config"))
}

/// Returns XDG_STATE_HOME or ~/.local/state
fn xdg_state_home() -> PathBuf {
    std::env::var("XDG_STATE_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/state"))
}

/// Main configuration struct
#[derive(Debug, Deserialize, Default, Clone)]
pub struct Config {
    /// Backend endpoints
    #[serde(default)]
    pub server: ServerConfig,

    /// Timers for polling, reconciliation and reconnects
    #[serde(default)]
    pub sync: SyncConfig,

    /// Upload gating
    #[serde(default)]
    pub upload: UploadConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Where the conversation backend lives.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// REST root, e.g. `http://localhost:8000`
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Path prefix for versioned endpoints
    #[serde(default = "default_api_prefix")]
    pub api_prefix: String,

    /// Socket.IO WebSocket endpoint
    #[serde(default = "default_realtime_url")]
    pub realtime_url: String,

    /// HTTP request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Page size used when listing conversations
    #[serde(default = "default_list_page_size")]
    pub list_page_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_prefix: default_api_prefix(),
            realtime_url: default_realtime_url(),
            timeout_secs: default_timeout(),
            list_page_size: default_list_page_size(),
        }
    }
}

impl ServerConfig {
    /// Validate configuration, returning error message if invalid
    pub fn validate(&self) -> Result<()> {
        let base = self.base_url.trim();
        if base.is_empty() {
            return Err(Error::Config("server.base_url must not be empty".to_string()));
        }
        if !(base.starts_with("http://") || base.starts_with("https://")) {
            return Err(Error::Config(format!(
                "server.base_url must be an http(s) URL, got {}",
                base
            )));
        }
        let realtime = self.realtime_url.trim();
        if !(realtime.starts_with("ws://") || realtime.starts_with("wss://")) {
            return Err(Error::Config(format!(
                "server.realtime_url must be a ws(s) URL, got {}",
                realtime
            )));
        }
        if self.list_page_size == 0 {
            return Err(Error::Config(
                "server.list_page_size must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Base URL joined with the API prefix, without a trailing slash.
    pub fn api_root(&self) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            self.api_prefix.trim_matches('/')
        )
        .trim_end_matches('/')
        .to_string()
    }
}

fn default_base_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_api_prefix() -> String {
    "/api/v1".to_string()
}

fn default_realtime_url() -> String {
    "ws://localhost:8000/socket.io/?EIO=4&transport=websocket".to_string()
}

fn default_timeout() -> u64 {
    30
}

fn default_list_page_size() -> usize {
    20
}

/// Timer configuration for the sync engine
#[derive(Debug, Deserialize, Clone)]
pub struct SyncConfig {
    /// Polling interval while documents are processing
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,

    /// Delay between a `doc_processed` push and the reconciling re-fetch
    #[serde(default = "default_reconcile_delay")]
    pub reconcile_delay_ms: u64,

    /// Reconnect attempts before the realtime channel gives up
    #[serde(default = "default_reconnect_attempts")]
    pub reconnect_attempts: u32,

    /// Fixed delay between reconnect attempts
    #[serde(default = "default_reconnect_delay")]
    pub reconnect_delay_ms: u64,

    /// How long a transient notification stays visible
    #[serde(default = "default_notification_ttl")]
    pub notification_ttl_ms: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval(),
            reconcile_delay_ms: default_reconcile_delay(),
            reconnect_attempts: default_reconnect_attempts(),
            reconnect_delay_ms: default_reconnect_delay(),
            notification_ttl_ms: default_notification_ttl(),
        }
    }
}

impl SyncConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn reconcile_delay(&self) -> Duration {
        Duration::from_millis(self.reconcile_delay_ms)
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    pub fn notification_ttl(&self) -> Duration {
        Duration::from_millis(self.notification_ttl_ms)
    }
}

fn default_poll_interval() -> u64 {
    3000
}

fn default_reconcile_delay() -> u64 {
    1000
}

fn default_reconnect_attempts() -> u32 {
    5
}

fn default_reconnect_delay() -> u64 {
    1000
}

fn default_notification_ttl() -> u64 {
    4000
}

/// Upload gating
#[derive(Debug, Deserialize, Clone)]
pub struct UploadConfig {
    /// Accepted file extensions (case-insensitive, without the dot)
    #[serde(default = "default_allowed_extensions")]
    pub allowed_extensions: Vec<String>,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            allowed_extensions: default_allowed_extensions(),
        }
    }
}

fn default_allowed_extensions() -> Vec<String> {
    vec!["pdf".to_string()]
}

/// Logging configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Maximum number of log files to keep
    #[serde(default = "default_max_log_files")]
    pub max_files: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            max_files: default_max_log_files(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_log_files() -> usize {
    5
}

impl Config {
    /// Load configuration from the default path
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        if !config_path.exists() {
            tracing::info!("No config file found at {:?}, using defaults", config_path);
            return Ok(Config::default());
        }

        Self::load_from(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read config file {:?}: {}", path, e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse config: {}", e)))?;

        config.server.validate()?;
        Ok(config)
    }

    /// Returns the default config file path
    ///
    /// `$XDG_CONFIG_HOME/chatsync/config.toml` (~/.config/chatsync/config.toml)
    pub fn config_path() -> PathBuf {
        xdg_config_home().join("chatsync").join("config.toml")
    }

    /// Returns the state directory path (for logs)
    ///
    /// `$XDG_STATE_HOME/chatsync/` (~/.local/state/chatsync/)
    pub fn state_dir() -> PathBuf {
        xdg_state_home().join("chatsync")
    }

    /// Returns the log file path
    pub fn log_path() -> PathBuf {
        Self::state_dir().join("chatsync.log")
    }

    /// Ensure XDG base directory environment variables are set.
    ///
    /// This is mainly for CLI binaries that want explicit, stable path behavior
    /// before invoking other components that read these env vars.
    pub fn ensure_xdg_env() {
        let home = home_dir();

        if std::env::var("XDG_STATE_HOME").is_err() {
            std::env::set_var("XDG_STATE_HOME", home.join(".local/state"));
        }

        if std::env::var("XDG_CONFIG_HOME").is_err() {
            std::env::set_var("XDG_CONFIG_HOME", home.join(".config"));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.server.base_url, "http://localhost:8000");
        assert_eq!(config.sync.poll_interval_ms, 3000);
        assert_eq!(config.sync.reconcile_delay_ms, 1000);
        assert_eq!(config.sync.reconnect_attempts, 5);
        assert_eq!(config.upload.allowed_extensions, vec!["pdf".to_string()]);
        assert!(config.server.validate().is_ok());
    }

    #[test]
    fn test_parse_config() {
        let toml = r#"
[server]
base_url = "https://chat.example.com/"
realtime_url = "wss://chat.example.com/socket.io/?EIO=4&transport=websocket"

[sync]
poll_interval_ms = 500
reconnect_attempts = 2

[upload]
allowed_extensions = ["pdf", "txt"]

[logging]
level = "debug"
"#;
        let config: Config = toml::from_str(toml).unwrap();

        assert_eq!(config.server.api_root(), "https://chat.example.com/api/v1");
        assert_eq!(config.sync.poll_interval(), Duration::from_millis(500));
        assert_eq!(config.sync.reconnect_attempts, 2);
        // Unset fields keep their defaults
        assert_eq!(config.sync.reconcile_delay_ms, 1000);
        assert_eq!(config.upload.allowed_extensions.len(), 2);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_server_validation() {
        let config = ServerConfig {
            base_url: "".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = ServerConfig {
            base_url: "ftp://example.com".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = ServerConfig {
            realtime_url: "http://localhost:8000/socket.io/".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_api_root_with_empty_prefix() {
        let config = ServerConfig {
            api_prefix: "".to_string(),
            ..Default::default()
        };
        assert_eq!(config.api_root(), "http://localhost:8000");
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[sync]\nnotification_ttl_ms = 10").unwrap();

        let config = Config::load_from(file.path()).unwrap();
        assert_eq!(config.sync.notification_ttl(), Duration::from_millis(10));
    }

    #[test]
    fn test_load_from_rejects_bad_server() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[server]\nrealtime_url = \"nope\"").unwrap();

        assert!(Config::load_from(file.path()).is_err());
    }
}
