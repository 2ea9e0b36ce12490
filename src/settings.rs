//! Configuration for the gate and the submission client.
//!
//! Values come from a config document ([`Settings::parse`]) or from the
//! environment ([`Settings::from_env`]), e.g.
//!
//! ```text
//! DOCGATE__GATE__TIME_UNIT=seconds
//! DOCGATE__GATE__REQUEST_LIMIT=10
//! DOCGATE__CLIENT__ENDPOINT=https://api.example/api/v3/lk/documents/create
//! DOCGATE__CLIENT__TOKEN=...
//! ```

use crate::error::ConfigError;
use crate::gate::MAX_CAPACITY;
use crate::window::{RateWindow, TimeUnit};
use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Environment variable prefix read by [`Settings::from_env`].
pub const ENV_PREFIX: &str = "DOCGATE";

const DEFAULT_PRODUCT_GROUP: &str = "milk";
const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 30_000;

/// Rate limit: `request_limit` operations per `window_count` `time_unit`s.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateConfig {
    pub time_unit: TimeUnit,
    #[serde(default = "default_window_count")]
    pub window_count: u32,
    pub request_limit: i64,
}

fn default_window_count() -> u32 {
    1
}

impl GateConfig {
    /// `request_limit` operations per one `time_unit`.
    pub fn new(time_unit: TimeUnit, request_limit: i64) -> Self {
        Self { time_unit, window_count: 1, request_limit }
    }

    pub fn window(&self) -> RateWindow {
        RateWindow::new(self.time_unit, self.window_count)
    }

    /// The request limit as a pool capacity.
    pub fn capacity(&self) -> Result<usize, ConfigError> {
        if self.request_limit <= 0 {
            return Err(ConfigError::InvalidCapacity { provided: self.request_limit });
        }
        usize::try_from(self.request_limit).map_err(|_| ConfigError::CapacityTooLarge {
            provided: usize::MAX,
            max: MAX_CAPACITY,
        })
    }
}

/// Where and how documents are submitted.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    pub endpoint: String,
    #[serde(skip_serializing)]
    pub token: String,
    #[serde(default = "default_product_group")]
    pub product_group: String,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

fn default_product_group() -> String {
    DEFAULT_PRODUCT_GROUP.to_string()
}

fn default_request_timeout_ms() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_MS
}

impl ClientConfig {
    pub fn new(endpoint: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            token: token.into(),
            product_group: default_product_group(),
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
        }
    }

    pub fn with_product_group(mut self, group: impl Into<String>) -> Self {
        self.product_group = group.into();
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

// keep the bearer token out of logs
impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("endpoint", &self.endpoint)
            .field("token", &"<redacted>")
            .field("product_group", &self.product_group)
            .field("request_timeout_ms", &self.request_timeout_ms)
            .finish()
    }
}

/// Full configuration for a [`DocumentApi`](crate::DocumentApi).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    pub gate: GateConfig,
    pub client: ClientConfig,
}

impl Settings {
    /// Read `DOCGATE__`-prefixed environment variables.
    pub fn from_env() -> Result<Self, config::ConfigError> {
        Config::builder()
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }

    /// Parse a config document such as JSON or TOML.
    pub fn parse(text: &str, format: FileFormat) -> Result<Self, config::ConfigError> {
        Config::builder().add_source(File::from_str(text, format)).build()?.try_deserialize()
    }
}
