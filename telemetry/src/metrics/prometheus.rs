//! Prometheus-backed metrics and HTTP exporter.
//!
//! This module defines a [`MetricsRegistry`] that owns a Prometheus
//! registry and the strongly-typed feed metrics, and an async HTTP
//! exporter that serves `/metrics` using `hyper`.

use std::{convert::Infallible, net::SocketAddr, sync::Arc};

use bytes::Bytes;
use http_body_util::Full;
use hyper::{
    Method, Request, Response, StatusCode, body::Incoming, header, header::HeaderValue,
    server::conn::http1, service::service_fn,
};
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;

use prometheus::{
    self, Encoder, Histogram, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts,
    Registry, TextEncoder,
};

use super::sink::MetricsSink;

/// Metrics derived from the telemetry feed.
///
/// These are registered into a [`Registry`] and updated by the dispatcher
/// through the [`MetricsSink`] implementation below.
#[derive(Clone)]
pub struct TelemetryMetrics {
    pub best_block: IntGauge,
    pub best_finalized: IntGauge,
    pub time_to_finality_seconds: Histogram,
    pub block_production_time_seconds: Histogram,
    /// Labelled by the importing node's name.
    pub block_propagation_time_seconds: HistogramVec,
    /// Labelled by producer name.
    pub block_produced_total: IntCounterVec,
    /// Labelled by validator address and name.
    pub validator_prevote_received_total: IntCounterVec,
    pub validator_precommit_received_total: IntCounterVec,
}

impl TelemetryMetrics {
    /// Registers the feed metrics into the given `Registry`.
    pub fn register(registry: &Registry) -> Result<Self, prometheus::Error> {
        let best_block = IntGauge::with_opts(Opts::new(
            "best_block",
            "Height of the current best block",
        ))?;
        registry.register(Box::new(best_block.clone()))?;

        let best_finalized = IntGauge::with_opts(Opts::new(
            "best_finalized",
            "Height of the current best finalized block",
        ))?;
        registry.register(Box::new(best_finalized.clone()))?;

        let time_to_finality_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "time_to_finality_seconds",
                "Time from a block first becoming best to it being finalized, in seconds",
            )
            .buckets(vec![
                1.0, 2.0, 5.0, 10.0, 15.0, 20.0, 30.0, 45.0, 60.0, 90.0, 120.0, 300.0,
            ]),
        )?;
        registry.register(Box::new(time_to_finality_seconds.clone()))?;

        let block_production_time_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "block_production_time_seconds",
                "Time taken to produce a best block, in seconds",
            )
            .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.0, 3.0, 4.0, 6.0, 10.0, 20.0]),
        )?;
        registry.register(Box::new(block_production_time_seconds.clone()))?;

        let block_propagation_time_seconds = HistogramVec::new(
            HistogramOpts::new(
                "block_propagation_time_seconds",
                "Time for a block to reach a node after it was first seen, in seconds",
            )
            .buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.0, 5.0, 10.0]),
            &["node"],
        )?;
        registry.register(Box::new(block_propagation_time_seconds.clone()))?;

        let block_produced_total = IntCounterVec::new(
            Opts::new(
                "block_produced_total",
                "Total number of blocks produced by a watched producer",
            ),
            &["producer"],
        )?;
        registry.register(Box::new(block_produced_total.clone()))?;

        let validator_prevote_received_total = IntCounterVec::new(
            Opts::new(
                "validator_prevote_received_total",
                "Total number of finality prevotes received from a watched validator",
            ),
            &["address", "name"],
        )?;
        registry.register(Box::new(validator_prevote_received_total.clone()))?;

        let validator_precommit_received_total = IntCounterVec::new(
            Opts::new(
                "validator_precommit_received_total",
                "Total number of finality precommits received from a watched validator",
            ),
            &["address", "name"],
        )?;
        registry.register(Box::new(validator_precommit_received_total.clone()))?;

        Ok(Self {
            best_block,
            best_finalized,
            time_to_finality_seconds,
            block_production_time_seconds,
            block_propagation_time_seconds,
            block_produced_total,
            validator_prevote_received_total,
            validator_precommit_received_total,
        })
    }
}

fn gauge_value(height: u64) -> i64 {
    i64::try_from(height).unwrap_or(i64::MAX)
}

impl MetricsSink for TelemetryMetrics {
    fn set_best_block(&self, height: u64) {
        self.best_block.set(gauge_value(height));
    }

    fn set_best_finalized(&self, height: u64) {
        self.best_finalized.set(gauge_value(height));
    }

    fn observe_time_to_finality(&self, secs: f64) {
        self.time_to_finality_seconds.observe(secs);
    }

    fn observe_block_production_time(&self, secs: f64) {
        self.block_production_time_seconds.observe(secs);
    }

    fn observe_block_propagation_time(&self, node: &str, secs: f64) {
        self.block_propagation_time_seconds
            .with_label_values(&[node])
            .observe(secs);
    }

    fn inc_block_produced(&self, producer: &str) {
        self.block_produced_total.with_label_values(&[producer]).inc();
    }

    fn inc_prevote_received(&self, address: &str, name: &str) {
        self.validator_prevote_received_total
            .with_label_values(&[address, name])
            .inc();
    }

    fn inc_precommit_received(&self, address: &str, name: &str) {
        self.validator_precommit_received_total
            .with_label_values(&[address, name])
            .inc();
    }
}

/// Wrapper around a Prometheus registry and the feed metrics.
///
/// This is the main handle passed around in the exporter. It can be wrapped
/// in an [`Arc`] and shared across tasks.
#[derive(Clone)]
pub struct MetricsRegistry {
    registry: Registry,
    pub telemetry: TelemetryMetrics,
}

impl MetricsRegistry {
    /// Creates a new `MetricsRegistry` with a fresh underlying `Registry`
    /// and registers the feed metrics under the `telemetry` namespace.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new_custom(Some("telemetry".to_string()), None)?;
        let telemetry = TelemetryMetrics::register(&registry)?;
        Ok(Self {
            registry,
            telemetry,
        })
    }

    /// Encodes all metrics in this registry into the Prometheus text format.
    pub fn gather_text(&self) -> String {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        let encoder = TextEncoder::new();
        if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
            tracing::error!("failed to encode Prometheus metrics: {e}");
            return String::new();
        }
        String::from_utf8(buffer).unwrap_or_default()
    }
}

/// Runs an HTTP server that exposes Prometheus metrics.
///
/// The server listens on `addr` and serves `GET /metrics` with the
/// Prometheus text exposition format. All other paths return 404.
///
/// ```ignore
/// let registry = Arc::new(MetricsRegistry::new()?);
/// let addr: SocketAddr = "127.0.0.1:9898".parse()?;
/// tokio::spawn(run_prometheus_http_server(registry.clone(), addr));
/// ```
pub async fn run_prometheus_http_server(
    metrics: Arc<MetricsRegistry>,
    addr: SocketAddr,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let listener = TcpListener::bind(addr).await?;

    loop {
        let (stream, _) = listener.accept().await?;
        let io = TokioIo::new(stream);
        let metrics = metrics.clone();

        tokio::spawn(async move {
            let svc = service_fn(move |req| {
                let metrics = metrics.clone();
                handle_request(req, metrics)
            });

            if let Err(err) = http1::Builder::new().serve_connection(io, svc).await {
                tracing::debug!("prometheus HTTP connection error: {err}");
            }
        });
    }
}

async fn handle_request(
    req: Request<Incoming>,
    metrics: Arc<MetricsRegistry>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let response = match (req.method(), req.uri().path()) {
        (&Method::GET, "/metrics") => {
            let mut resp = Response::new(Full::new(Bytes::from(metrics.gather_text())));
            resp.headers_mut().insert(
                header::CONTENT_TYPE,
                HeaderValue::from_static("text/plain; version=0.0.4"),
            );
            resp
        }
        _ => {
            let mut resp = Response::new(Full::new(Bytes::from("not found")));
            *resp.status_mut() = StatusCode::NOT_FOUND;
            resp
        }
    };
    Ok(response)
}
