//! Configuration module for EnvDash-RS
//!
//! All tunables live in a single [`DashboardConfig`] loaded from a TOML file.
//! Every section has defaults, so an empty file (or no file at all) yields a
//! dashboard that starts in simulated mode with the campus channel table.
//!
//! # App Data Location
//!
//! Configuration and log files are stored in the platform-appropriate location:
//! - **Linux**: `~/.local/share/envdash-rs/`
//! - **macOS**: `~/Library/Application Support/envdash-rs/`
//! - **Windows**: `%APPDATA%\envdash-rs\`
//!
//! # Example
//!
//! ```toml
//! [broker]
//! host = "192.168.1.20"
//! port = 1883
//! client_id = "envdash-lab"
//!
//! [history]
//! capacity = 30
//!
//! [fallback]
//! failure_threshold = 3
//! ```
//!
//! Core types never read files; `main.rs` loads the config and hands the
//! values to constructors.

use crate::error::{EnvDashError, Result, ResultExt};
use crate::mode::DEFAULT_FAILURE_THRESHOLD;
use crate::registry::{default_channels, Channel, ChannelRegistry};
use crate::scheduler::{DEFAULT_CHART_INTERVAL_MS, DEFAULT_VALUE_INTERVAL_MS};
use crate::simulator::DEFAULT_SIM_TICK_MS;
use crate::store::DEFAULT_HISTORY_CAPACITY;
use crate::transport::{BackoffPolicy, DEFAULT_QUEUE_CAPACITY};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Application identifier for data directories
pub const APP_ID: &str = env!("CARGO_PKG_NAME");

/// Config filename inside the app data directory
pub const CONFIG_FILE: &str = "envdash.toml";

/// Default MQTT port
pub const DEFAULT_BROKER_PORT: u16 = 1883;

/// Default MQTT keep-alive in seconds
pub const DEFAULT_KEEP_ALIVE_SECS: u64 = 30;

/// Default time allowed for the broker to acknowledge a connection
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 5000;

// ==================== App Data Directory ====================

/// Get the application data directory path
pub fn app_data_dir() -> Option<PathBuf> {
    dirs_next::data_dir().map(|p| p.join(APP_ID))
}

/// Ensure the app data directory exists
pub fn ensure_app_data_dir() -> Result<PathBuf> {
    let dir = app_data_dir().ok_or_else(|| {
        EnvDashError::Config("Could not determine app data directory".to_string())
    })?;

    if !dir.exists() {
        std::fs::create_dir_all(&dir).map_err(|e| {
            EnvDashError::Config(format!("Failed to create app data directory: {}", e))
        })?;
    }

    Ok(dir)
}

/// Get the path to the default config file
pub fn default_config_path() -> Option<PathBuf> {
    app_data_dir().map(|p| p.join(CONFIG_FILE))
}

// ==================== Sections ====================

/// MQTT broker endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrokerConfig {
    pub host: String,
    pub port: u16,
    pub client_id: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub keep_alive_secs: u64,
    /// A connection not acknowledged within this time counts as a failure
    pub connect_timeout_ms: u64,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: DEFAULT_BROKER_PORT,
            client_id: "envdash-rs".to_string(),
            username: None,
            password: None,
            keep_alive_secs: DEFAULT_KEEP_ALIVE_SECS,
            connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT_MS,
        }
    }
}

impl BrokerConfig {
    /// `host:port` for logging
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn keep_alive(&self) -> Duration {
        Duration::from_secs(self.keep_alive_secs.max(1))
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms.max(1))
    }
}

/// Chart history settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Samples kept per chart channel
    pub capacity: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_HISTORY_CAPACITY,
        }
    }
}

/// Snapshot cadences
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RefreshConfig {
    pub value_interval_ms: u64,
    pub chart_interval_ms: u64,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            value_interval_ms: DEFAULT_VALUE_INTERVAL_MS,
            chart_interval_ms: DEFAULT_CHART_INTERVAL_MS,
        }
    }
}

impl RefreshConfig {
    pub fn value_interval(&self) -> Duration {
        Duration::from_millis(self.value_interval_ms)
    }

    pub fn chart_interval(&self) -> Duration {
        Duration::from_millis(self.chart_interval_ms)
    }
}

/// Synthetic generator settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Interval between synthetic samples
    pub tick_ms: u64,
    /// Fixed RNG seed for reproducible runs
    pub seed: Option<u64>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            tick_ms: DEFAULT_SIM_TICK_MS,
            seed: None,
        }
    }
}

impl SimulationConfig {
    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }
}

/// Automatic fallback to simulated mode
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FallbackConfig {
    /// Consecutive connect failures before switching to simulated
    pub failure_threshold: u32,
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
        }
    }
}

/// Transport event queue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    pub capacity: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

/// Log output
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Also write a daily rolling log file
    pub file: bool,
    /// Directory for log files (defaults to the app data directory)
    pub directory: Option<PathBuf>,
}

// ==================== Dashboard Config ====================

/// Complete dashboard configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    /// Broker endpoint; `None` starts the dashboard in simulated mode
    pub broker: Option<BrokerConfig>,
    pub history: HistoryConfig,
    pub refresh: RefreshConfig,
    pub simulation: SimulationConfig,
    pub fallback: FallbackConfig,
    pub backoff: BackoffPolicy,
    pub queue: QueueConfig,
    pub logging: LoggingConfig,
    /// Channel table
    pub channels: Vec<Channel>,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            broker: None,
            history: HistoryConfig::default(),
            refresh: RefreshConfig::default(),
            simulation: SimulationConfig::default(),
            fallback: FallbackConfig::default(),
            backoff: BackoffPolicy::default(),
            queue: QueueConfig::default(),
            logging: LoggingConfig::default(),
            channels: default_channels(),
        }
    }
}

impl DashboardConfig {
    /// Default config pointed at a broker
    pub fn with_broker(host: impl Into<String>, port: u16) -> Self {
        Self {
            broker: Some(BrokerConfig {
                host: host.into(),
                port,
                ..BrokerConfig::default()
            }),
            ..Self::default()
        }
    }

    /// Parse a config from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to TOML text
    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Load a config file from disk
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            EnvDashError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        Self::from_toml_str(&content).context(format!("Failed to load config file {:?}", path))
    }

    /// Load a config file, returning defaults if it is missing
    ///
    /// A file that exists but is invalid is still an error.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::info!("No config at {:?}, using defaults", path);
            return Ok(Self::default());
        }
        Self::load(path)
    }

    /// Save the config to disk as TOML
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                EnvDashError::Config(format!("Failed to create config directory: {}", e))
            })?;
        }

        let content = self.to_toml_string()?;
        std::fs::write(path, content).map_err(|e| {
            EnvDashError::Config(format!("Failed to write config file {:?}: {}", path, e))
        })
    }

    /// Check every section for values the dashboard cannot run with
    pub fn validate(&self) -> Result<()> {
        if let Some(broker) = &self.broker {
            if broker.host.trim().is_empty() {
                return Err(EnvDashError::Config("broker host must not be empty".into()));
            }
            if broker.port == 0 {
                return Err(EnvDashError::Config("broker port must not be 0".into()));
            }
            if broker.client_id.trim().is_empty() {
                return Err(EnvDashError::Config("broker client_id must not be empty".into()));
            }
        }

        if self.history.capacity == 0 {
            return Err(EnvDashError::BufferCapacityMisconfigured(self.history.capacity));
        }
        if self.refresh.value_interval_ms == 0 || self.refresh.chart_interval_ms == 0 {
            return Err(EnvDashError::Config("refresh intervals must be positive".into()));
        }
        if self.simulation.tick_ms == 0 {
            return Err(EnvDashError::Config("simulation tick must be positive".into()));
        }
        if self.fallback.failure_threshold == 0 {
            return Err(EnvDashError::Config("failure_threshold must be at least 1".into()));
        }
        if self.queue.capacity == 0 {
            return Err(EnvDashError::Config("queue capacity must be positive".into()));
        }

        let backoff = &self.backoff;
        if backoff.base_ms == 0 || backoff.base_ms > backoff.cap_ms {
            return Err(EnvDashError::Config(format!(
                "backoff base {} ms must be positive and not exceed cap {} ms",
                backoff.base_ms, backoff.cap_ms
            )));
        }
        if !(backoff.multiplier.is_finite() && backoff.multiplier >= 1.0) {
            return Err(EnvDashError::Config("backoff multiplier must be >= 1".into()));
        }
        if !(0.0..=1.0).contains(&backoff.jitter) {
            return Err(EnvDashError::Config("backoff jitter must be within 0..=1".into()));
        }

        self.registry().map(|_| ())
    }

    /// Build the channel registry described by this config
    pub fn registry(&self) -> Result<ChannelRegistry> {
        ChannelRegistry::new(self.channels.clone())
    }

    /// Directory for rolling log files
    pub fn log_directory(&self) -> Option<PathBuf> {
        self.logging
            .directory
            .clone()
            .or_else(|| app_data_dir().map(|p| p.join("logs")))
    }
}
