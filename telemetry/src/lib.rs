//! Telemetry library crate.
//!
//! This crate turns a live substrate-style telemetry feed into chain
//! metrics: best and finalized height, time-to-finality, block production
//! and propagation times, blocks produced by watched operators, and
//! finality votes from watched validators.
//!
//! - the feed wire format and decoder (`feed`),
//! - cross-message correlation state (`correlation`),
//! - operator watch-lists (`watch`),
//! - the event dispatcher (`dispatch`),
//! - Prometheus-based metrics (`metrics`),
//! - the websocket feed client (`transport`),
//! - and a top-level exporter configuration (`config`).
//!
//! Binaries compose these pieces: load an [`ExporterConfig`], build a
//! [`Dispatcher`] over [`TelemetryMetrics`], and drive it with a
//! [`FeedClient`].

pub mod config;
pub mod correlation;
pub mod dispatch;
pub mod feed;
pub mod metrics;
pub mod transport;
pub mod watch;

// Re-export top-level configuration types.
pub use config::{
    ConfigError, CorrelationConfig, ExporterConfig, FeedConfig, HealthConfig, MetricsConfig,
    SubscriptionConfig, ValidatorConfig,
};

// Re-export the feed wire format.
pub use feed::{ActionKind, DecodeError, Event, FieldShapeError, NodeId, decode};

// Re-export correlation state and watch-lists.
pub use correlation::{CorrelationStore, NodeRegistry, PendingFinality};
pub use watch::WatchList;

// Re-export the dispatcher.
pub use dispatch::{BatchReport, Directive, Dispatcher};

// Re-export metrics registry and sink.
pub use metrics::{MetricsRegistry, MetricsSink, TelemetryMetrics, run_prometheus_http_server};

// Re-export the feed client.
pub use transport::{FeedClient, SharedDispatcher, TransportError};

/// Dispatcher wired to the Prometheus metrics, as used by the exporter.
pub type DefaultDispatcher = Dispatcher<TelemetryMetrics>;

impl DefaultDispatcher {
    /// Builds a dispatcher from a full exporter configuration.
    pub fn from_config(cfg: &ExporterConfig, metrics: TelemetryMetrics) -> Self {
        Dispatcher::new(
            WatchList::new(&cfg.subscribe),
            CorrelationStore::new(cfg.correlation.max_pending_blocks),
            metrics,
        )
    }
}
