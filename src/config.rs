//! Service configuration
//!
//! All knobs the core recognises, loaded from a YAML or TOML file chosen on
//! the command line. No environment variables are consulted: configuration
//! is injected at construction, and defaults cover every field so an empty
//! file (or none at all) yields a working service.

use std::path::Path;
use std::time::Duration;

use figment::providers::{Format, Toml, Yaml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::error::{IoSrvError, Result};

/// Centralized serde default functions
mod defaults {
    pub fn port() -> u16 {
        crate::server::DEFAULT_PORT
    }

    pub fn inputs_poll_ms() -> u64 {
        20
    }

    pub fn adc_poll_ms() -> u64 {
        100
    }

    pub fn read_timeout_ms() -> u64 {
        5
    }

    pub fn write_timeout_ms() -> u64 {
        20
    }

    pub fn log_level() -> String {
        "info".to_string()
    }
}

/// Top-level service configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IoSrvConfig {
    pub server: ServerSettings,
    pub polling: PollingSettings,
    pub cache: CacheSettings,
    pub logging: LoggingSettings,
}

/// Protocol endpoint settings (the socket itself is bound by the stack)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// TCP port the protocol server listens on
    #[serde(default = "defaults::port")]
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            port: defaults::port(),
        }
    }
}

/// Polling cadences and placement
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingSettings {
    /// Discrete input refresh interval, milliseconds (5..=1000)
    #[serde(default = "defaults::inputs_poll_ms")]
    pub inputs_poll_ms: u64,

    /// ADC batch refresh interval, milliseconds (20..=10000)
    #[serde(default = "defaults::adc_poll_ms")]
    pub adc_poll_ms: u64,

    /// Core the polling thread should run on; pinning is a deployment
    /// concern, the value is surfaced in the start-up log
    #[serde(default)]
    pub core_id: Option<usize>,
}

impl Default for PollingSettings {
    fn default() -> Self {
        Self {
            inputs_poll_ms: defaults::inputs_poll_ms(),
            adc_poll_ms: defaults::adc_poll_ms(),
            core_id: None,
        }
    }
}

/// Bounded-wait budgets for cache acquisition
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// Read-side lock wait budget, milliseconds
    #[serde(default = "defaults::read_timeout_ms")]
    pub read_timeout_ms: u64,

    /// Write-side lock wait budget, milliseconds
    #[serde(default = "defaults::write_timeout_ms")]
    pub write_timeout_ms: u64,
}

impl CacheSettings {
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            read_timeout_ms: defaults::read_timeout_ms(),
            write_timeout_ms: defaults::write_timeout_ms(),
        }
    }
}

/// Logging bring-up settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Default tracing filter when RUST_LOG is unset
    #[serde(default = "defaults::log_level")]
    pub level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: defaults::log_level(),
        }
    }
}

impl IoSrvConfig {
    /// Load configuration from a YAML or TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let extension = path
            .extension()
            .and_then(|s| s.to_str())
            .ok_or_else(|| {
                IoSrvError::ConfigError("config file must have an extension".into())
            })?;

        let figment = match extension {
            "toml" => Figment::new().merge(Toml::file(path)),
            "yaml" | "yml" => Figment::new().merge(Yaml::file(path)),
            other => {
                return Err(IoSrvError::ConfigError(format!(
                    "unsupported config file format: {}",
                    other
                )))
            }
        };

        figment
            .extract()
            .map_err(|e| IoSrvError::ConfigError(format!("failed to load configuration: {}", e)))
    }

    /// Reject out-of-range knobs
    pub fn validate(&self) -> Result<()> {
        if !(5..=1_000).contains(&self.polling.inputs_poll_ms) {
            return Err(IoSrvError::ConfigError(format!(
                "inputs_poll_ms {} outside 5..=1000",
                self.polling.inputs_poll_ms
            )));
        }
        if !(20..=10_000).contains(&self.polling.adc_poll_ms) {
            return Err(IoSrvError::ConfigError(format!(
                "adc_poll_ms {} outside 20..=10000",
                self.polling.adc_poll_ms
            )));
        }
        if self.cache.read_timeout_ms == 0 {
            return Err(IoSrvError::ConfigError(
                "cache.read_timeout_ms must be non-zero".into(),
            ));
        }
        if self.cache.write_timeout_ms == 0 {
            return Err(IoSrvError::ConfigError(
                "cache.write_timeout_ms must be non-zero".into(),
            ));
        }
        Ok(())
    }
}
