//! Shared application state.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use telemetry::{SharedDispatcher, TelemetryMetrics};

/// Shared state held by the HTTP handlers.
///
/// This is wrapped in an [`Arc`] and passed to request handlers via Axum's
/// `State` extractor.
pub struct AppState {
    /// Dispatcher driven by the feed client; handlers only read from it.
    pub dispatcher: SharedDispatcher<TelemetryMetrics>,
    /// `true` while the feed session is up.
    pub feed_connected: Arc<AtomicBool>,
}

impl AppState {
    pub fn is_feed_connected(&self) -> bool {
        self.feed_connected.load(Ordering::Relaxed)
    }
}

/// Thread-safe alias for `AppState`.
pub type SharedState = Arc<AppState>;
