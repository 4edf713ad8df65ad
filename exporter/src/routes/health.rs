use axum::{Json, extract::State, http::StatusCode};
use serde::Serialize;

use crate::state::SharedState;

/// Health-check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub feed_connected: bool,
    pub known_nodes: usize,
    pub pending_blocks: usize,
}

/// `GET /health`
///
/// Reports liveness plus a snapshot of the feed connection and correlation
/// state. The exporter is alive even while the feed is down, so this always
/// returns 200; `status` says `"degraded"` until the feed is connected.
pub async fn health(State(state): State<SharedState>) -> (StatusCode, Json<HealthResponse>) {
    let feed_connected = state.is_feed_connected();
    let (known_nodes, pending_blocks) = {
        let dispatcher = state.dispatcher.lock().await;
        let store = dispatcher.store();
        (store.nodes.len(), store.pending.len())
    };

    let status = if feed_connected { "ok" } else { "degraded" };
    (
        StatusCode::OK,
        Json(HealthResponse {
            status,
            feed_connected,
            known_nodes,
            pending_blocks,
        }),
    )
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::AtomicBool;

    use tokio::sync::Mutex;

    use super::*;
    use crate::state::AppState;
    use telemetry::{DefaultDispatcher, ExporterConfig, MetricsRegistry, NodeId};

    fn state(connected: bool) -> SharedState {
        let metrics = MetricsRegistry::new().expect("metrics registry");
        let mut dispatcher =
            DefaultDispatcher::from_config(&ExporterConfig::default(), metrics.telemetry.clone());
        dispatcher.store_mut().nodes.insert(NodeId::from(1), "node-1");
        dispatcher.store_mut().pending.record(10, 1_000);

        Arc::new(AppState {
            dispatcher: Arc::new(Mutex::new(dispatcher)),
            feed_connected: Arc::new(AtomicBool::new(connected)),
        })
    }

    #[tokio::test]
    async fn health_reports_correlation_snapshot() {
        let (code, Json(body)) = health(State(state(true))).await;

        assert_eq!(code, StatusCode::OK);
        assert_eq!(body.status, "ok");
        assert!(body.feed_connected);
        assert_eq!(body.known_nodes, 1);
        assert_eq!(body.pending_blocks, 1);
    }

    #[tokio::test]
    async fn disconnected_feed_is_degraded() {
        let (code, Json(body)) = health(State(state(false))).await;

        assert_eq!(code, StatusCode::OK);
        assert_eq!(body.status, "degraded");
        assert!(!body.feed_connected);
    }
}
