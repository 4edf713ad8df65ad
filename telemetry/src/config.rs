//! Top-level configuration for the telemetry exporter.
//!
//! This module aggregates configuration for:
//!
//! - the upstream feed connection (`FeedConfig`),
//! - the Prometheus metrics exporter (`MetricsConfig`),
//! - the health endpoint (`HealthConfig`),
//! - correlation limits (`CorrelationConfig`),
//! - the operator's watch-lists (`SubscriptionConfig`).
//!
//! Every section has defaults, so an empty JSON object `{}` is a valid
//! configuration file and missing sections fall back to their defaults.

use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::correlation::DEFAULT_MAX_PENDING_BLOCKS;

/// Errors that can occur while loading a configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Connection settings for the upstream telemetry feed.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    /// Websocket URL of the feed, e.g. `"ws://localhost:8000/feed"`.
    pub url: String,
    /// First delay before reconnecting after the feed drops.
    pub reconnect_base_delay_secs: u64,
    /// Upper bound for the exponential reconnect backoff.
    pub max_reconnect_delay_secs: u64,
}

impl FeedConfig {
    pub fn reconnect_base_delay(&self) -> Duration {
        Duration::from_secs(self.reconnect_base_delay_secs)
    }

    pub fn max_reconnect_delay(&self) -> Duration {
        Duration::from_secs(self.max_reconnect_delay_secs)
    }
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            url: "ws://localhost:8000/feed".to_string(),
            reconnect_base_delay_secs: 2,
            max_reconnect_delay_secs: 60,
        }
    }
}

/// Configuration for the Prometheus metrics exporter.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Whether to run a `/metrics` HTTP exporter.
    pub enabled: bool,
    /// Address to bind the metrics HTTP server to.
    pub listen_addr: SocketAddr,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            listen_addr: SocketAddr::from(([127, 0, 0, 1], 9898)),
        }
    }
}

/// Configuration for the `/health` endpoint.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct HealthConfig {
    pub listen_addr: SocketAddr,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([127, 0, 0, 1], 9899)),
        }
    }
}

/// Limits on correlation state.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct CorrelationConfig {
    /// Maximum number of blocks awaiting finality. `0` disables the limit.
    pub max_pending_blocks: usize,
}

impl Default for CorrelationConfig {
    fn default() -> Self {
        Self {
            max_pending_blocks: DEFAULT_MAX_PENDING_BLOCKS,
        }
    }
}

/// A validator whose votes should be counted.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct ValidatorConfig {
    /// Address exactly as the feed reports it.
    pub address: String,
    /// Display name used as a metric label.
    pub name: String,
}

/// Operator watch-lists. Every list defaults to empty, which means
/// "watch nothing of this kind".
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct SubscriptionConfig {
    /// Chains to subscribe to, matched case-insensitively.
    pub chains: Vec<String>,
    /// Producer name prefixes.
    pub producers: Vec<String>,
    pub validators: Vec<ValidatorConfig>,
}

/// Top-level configuration for the exporter.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct ExporterConfig {
    pub feed: FeedConfig,
    pub metrics: MetricsConfig,
    pub health: HealthConfig,
    pub correlation: CorrelationConfig,
    pub subscribe: SubscriptionConfig,
}

impl ExporterConfig {
    /// Loads a configuration from a JSON file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&text)
    }

    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }
}
