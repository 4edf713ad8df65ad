//! Metrics derived from the telemetry feed.
//!
//! The dispatcher reports observations through the [`MetricsSink`] trait.
//! [`TelemetryMetrics`] implements it on top of Prometheus collectors, and
//! [`run_prometheus_http_server`] serves them on `/metrics`.
//!
//! Typical usage:
//!
//! ```ignore
//! use std::net::SocketAddr;
//! use std::sync::Arc;
//! use telemetry::metrics::{MetricsRegistry, run_prometheus_http_server};
//!
//! let registry = Arc::new(MetricsRegistry::new()?);
//! let addr: SocketAddr = "127.0.0.1:9898".parse()?;
//!
//! tokio::spawn(run_prometheus_http_server(registry.clone(), addr));
//!
//! // Hand a clone of the collectors to the dispatcher:
//! let sink = registry.telemetry.clone();
//! ```

pub mod prometheus;
pub mod sink;

pub use self::prometheus::{MetricsRegistry, TelemetryMetrics, run_prometheus_http_server};
pub use sink::MetricsSink;
