//! Command-line configuration for the exporter binary.
//!
//! Settings come from an optional JSON file (see `telemetry::ExporterConfig`)
//! and are then overridden by any flags given on the command line.

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;

use telemetry::{ConfigError, ExporterConfig};

/// Exports metrics derived from a substrate-style telemetry feed.
#[derive(Debug, Parser)]
#[command(name = "telemetry-exporter", version, about)]
pub struct Cli {
    /// Path to a JSON configuration file.
    #[arg(short, long, env = "TELEMETRY_EXPORTER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Websocket URL of the telemetry feed.
    #[arg(long)]
    pub feed_url: Option<String>,

    /// Address for the Prometheus `/metrics` endpoint.
    #[arg(long)]
    pub metrics_addr: Option<SocketAddr>,

    /// Address for the `/health` endpoint.
    #[arg(long)]
    pub health_addr: Option<SocketAddr>,
}

impl Cli {
    /// Loads the configuration file, if any, and applies flag overrides.
    pub fn load(&self) -> Result<ExporterConfig, ConfigError> {
        let mut cfg = match &self.config {
            Some(path) => ExporterConfig::from_path(path)?,
            None => ExporterConfig::default(),
        };
        self.apply_overrides(&mut cfg);
        Ok(cfg)
    }

    fn apply_overrides(&self, cfg: &mut ExporterConfig) {
        if let Some(url) = &self.feed_url {
            cfg.feed.url = url.clone();
        }
        if let Some(addr) = self.metrics_addr {
            cfg.metrics.listen_addr = addr;
        }
        if let Some(addr) = self.health_addr {
            cfg.health.listen_addr = addr;
        }
    }
}
