//! Application configuration.

use crate::error::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::path::Path;
use vwap_feed::{DubiousFilter, DEFAULT_SENTINEL_PRICE};
use vwap_ws::{ConnectionConfig, LEVEL2_CHANNEL};

/// Used when neither `--config` nor `VWAP_CONFIG` is given.
pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Environment variable naming the config file.
pub const CONFIG_ENV_VAR: &str = "VWAP_CONFIG";

/// Main application configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Feed WebSocket URL.
    #[serde(default = "default_ws_url")]
    pub ws_url: String,
    /// Instruments to subscribe to.
    #[serde(default = "default_product_ids")]
    pub product_ids: Vec<String>,
    /// Samples kept per instrument.
    #[serde(default = "default_window_size")]
    pub window_size: usize,
    /// Aggregate changes at sentinel prices instead of dropping them.
    #[serde(default)]
    pub keep_dubious: bool,
    /// Prices treated as dubious.
    #[serde(default = "default_dubious_prices")]
    pub dubious_prices: Vec<f64>,
    /// Buffered payloads between transport and ingestion.
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
    /// Statistics summary interval.
    #[serde(default = "default_stats_interval_secs")]
    pub stats_interval_secs: u64,
    #[serde(default)]
    pub websocket: WsConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

fn default_ws_url() -> String {
    "wss://ws-feed-public.sandbox.exchange.coinbase.com".to_string()
}

fn default_product_ids() -> Vec<String> {
    ["BTC-USD", "ETH-USD", "ETH-BTC"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_window_size() -> usize {
    200
}

fn default_dubious_prices() -> Vec<f64> {
    vec![DEFAULT_SENTINEL_PRICE]
}

fn default_channel_capacity() -> usize {
    1000
}

fn default_stats_interval_secs() -> u64 {
    60
}

/// WebSocket configuration subset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WsConfig {
    /// Maximum reconnection attempts (0 = infinite).
    pub max_reconnect_attempts: u32,
    /// Base delay for reconnection backoff (ms).
    pub reconnect_base_delay_ms: u64,
    /// Backoff cap (ms).
    pub reconnect_max_delay_ms: u64,
    /// Quiet period before a ping is sent (ms).
    pub heartbeat_interval_ms: u64,
    /// Time allowed for the pong (ms).
    pub heartbeat_timeout_ms: u64,
}

impl Default for WsConfig {
    fn default() -> Self {
        Self {
            max_reconnect_attempts: 0,
            reconnect_base_delay_ms: 1000,
            reconnect_max_delay_ms: 60000,
            heartbeat_interval_ms: 30000,
            heartbeat_timeout_ms: 10000,
        }
    }
}

impl From<WsConfig> for ConnectionConfig {
    fn from(cfg: WsConfig) -> Self {
        Self {
            url: String::new(),       // Set separately
            product_ids: Vec::new(), // Set separately
            channels: vec![LEVEL2_CHANNEL.to_string()],
            max_reconnect_attempts: cfg.max_reconnect_attempts,
            reconnect_base_delay_ms: cfg.reconnect_base_delay_ms,
            reconnect_max_delay_ms: cfg.reconnect_max_delay_ms,
            heartbeat_interval_ms: cfg.heartbeat_interval_ms,
            heartbeat_timeout_ms: cfg.heartbeat_timeout_ms,
        }
    }
}

/// Telemetry configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Default log filter, overridden by `RUST_LOG`.
    pub log_level: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            ws_url: default_ws_url(),
            product_ids: default_product_ids(),
            window_size: default_window_size(),
            keep_dubious: false,
            dubious_prices: default_dubious_prices(),
            channel_capacity: default_channel_capacity(),
            stats_interval_secs: default_stats_interval_secs(),
            websocket: WsConfig::default(),
            telemetry: TelemetryConfig::default(),
        }
    }
}

/// Command-line values that take precedence over the file.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub ws_url: Option<String>,
    pub product_ids: Option<Vec<String>>,
    pub window_size: Option<usize>,
    /// Only ever switches filtering off.
    pub keep_dubious: bool,
    pub log_level: Option<String>,
}

impl AppConfig {
    /// Resolve the config path (argument > `VWAP_CONFIG` > default) and load it.
    ///
    /// A missing file is an error when the path was given explicitly; a
    /// missing default file yields the built-in defaults.
    pub fn load(path: Option<&str>) -> AppResult<Self> {
        let explicit = path
            .map(str::to_string)
            .or_else(|| std::env::var(CONFIG_ENV_VAR).ok());

        match explicit {
            Some(path) => Self::from_file(&path),
            None if Path::new(DEFAULT_CONFIG_PATH).exists() => {
                Self::from_file(DEFAULT_CONFIG_PATH)
            }
            None => Ok(Self::default()),
        }
    }

    /// Load from a specific file.
    pub fn from_file(path: &str) -> AppResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| AppError::Config(format!("Failed to read config {path}: {e}")))?;

        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> AppResult<Self> {
        toml::from_str(content)
            .map_err(|e| AppError::Config(format!("Failed to parse config: {e}")))
    }

    pub fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(url) = overrides.ws_url {
            self.ws_url = url;
        }
        if let Some(ids) = overrides.product_ids {
            self.product_ids = ids
                .into_iter()
                .map(|id| id.trim().to_string())
                .filter(|id| !id.is_empty())
                .collect();
        }
        if let Some(size) = overrides.window_size {
            self.window_size = size;
        }
        if overrides.keep_dubious {
            self.keep_dubious = true;
        }
        if let Some(level) = overrides.log_level {
            self.telemetry.log_level = level;
        }
    }

    /// Reject settings the pipeline cannot start with.
    pub fn validate(&self) -> AppResult<()> {
        if self.window_size == 0 {
            return Err(AppError::Config(
                "window_size must be greater than zero".to_string(),
            ));
        }
        if self.product_ids.is_empty() {
            return Err(AppError::Config("product_ids must not be empty".to_string()));
        }
        if self.product_ids.iter().any(|id| id.trim().is_empty()) {
            return Err(AppError::Config(
                "product_ids must not contain empty ids".to_string(),
            ));
        }
        if !(self.ws_url.starts_with("ws://") || self.ws_url.starts_with("wss://")) {
            return Err(AppError::Config(format!(
                "ws_url must be a ws:// or wss:// URL, got {:?}",
                self.ws_url
            )));
        }
        if self.channel_capacity == 0 {
            return Err(AppError::Config(
                "channel_capacity must be greater than zero".to_string(),
            ));
        }
        if self.stats_interval_secs == 0 {
            return Err(AppError::Config(
                "stats_interval_secs must be greater than zero".to_string(),
            ));
        }
        if self.websocket.heartbeat_interval_ms == 0 {
            return Err(AppError::Config(
                "websocket.heartbeat_interval_ms must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Transport settings for the configured feed.
    pub fn connection_config(&self) -> ConnectionConfig {
        let mut config: ConnectionConfig = self.websocket.clone().into();
        config.url = self.ws_url.clone();
        config.product_ids = self.product_ids.clone();
        config
    }

    pub fn dubious_filter(&self) -> DubiousFilter {
        DubiousFilter::new(!self.keep_dubious, self.dubious_prices.clone())
    }
}
