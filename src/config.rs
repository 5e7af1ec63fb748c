//! Configuration management for webrate.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{Result, WebrateError};
use crate::ratelimit::{ErrorPolicy, KeyPolicyKind, Quota};

/// Prefix for environment variable overrides, e.g. `WEBRATE__LIMITER__WINDOW_SECS`.
const ENV_PREFIX: &str = "WEBRATE";

/// Main configuration for webrate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebrateConfig {
    /// Rate limiter configuration
    #[serde(default)]
    pub limiter: LimiterConfig,

    /// In-memory store configuration
    #[serde(default)]
    pub store: StoreConfig,

    /// How to treat requests when the store fails
    pub on_store_error: ErrorPolicy,
}

/// Rate limiter configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimiterConfig {
    /// Requests allowed per window (at least 1)
    #[serde(default = "default_requests_per_window")]
    pub requests_per_window: u64,

    /// Window length in seconds (at least 1)
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,

    /// HTTP methods subject to limiting; others always pass
    #[serde(default)]
    pub methods: Vec<String>,

    /// How requests are grouped into keys
    #[serde(default)]
    pub key_policy: KeyPolicyKind,

    /// Header carrying the client address, instead of the remote address
    #[serde(default)]
    pub header_name: Option<String>,

    /// Strip a port suffix from the header value too
    #[serde(default)]
    pub strip_header_port: bool,
}

impl Default for LimiterConfig {
    fn default() -> Self {
        Self {
            requests_per_window: default_requests_per_window(),
            window_secs: default_window_secs(),
            methods: Vec::new(),
            key_policy: KeyPolicyKind::default(),
            header_name: None,
            strip_header_port: false,
        }
    }
}

impl LimiterConfig {
    /// Get the clamped quota.
    pub fn quota(&self) -> Quota {
        Quota::new(self.requests_per_window, Duration::from_secs(self.window_secs))
    }
}

fn default_requests_per_window() -> u64 {
    60
}

fn default_window_secs() -> u64 {
    60
}

/// In-memory store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// How often expired windows are purged, in seconds
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,

    /// Per-call store timeout in milliseconds, if any
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            sweep_interval_secs: default_sweep_interval(),
            timeout_ms: None,
        }
    }
}

impl StoreConfig {
    /// Get the sweep interval.
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }

    /// Get the store call timeout.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }
}

fn default_sweep_interval() -> u64 {
    30
}

impl WebrateConfig {
    /// Load configuration from a YAML file.
    pub fn from_file(path: &str) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Load configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(|e| WebrateError::Config(e.to_string()))
    }

    /// Load configuration from an optional file, overridden by `WEBRATE__*`
    /// environment variables.
    pub fn load(path: Option<&str>) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path));
        }

        builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("limiter.methods")
                    .try_parsing(true),
            )
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| WebrateError::Config(e.to_string()))
    }
}
