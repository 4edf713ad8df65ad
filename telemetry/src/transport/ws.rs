//! Websocket client for the telemetry feed.
//!
//! The client owns the connection lifecycle: it connects, hands every
//! inbound batch to the shared [`Dispatcher`], sends the dispatcher's
//! directives back upstream, and reconnects with capped exponential backoff
//! when the connection drops. Correlation state is reset on every connect
//! because the feed replays the current node set to new subscribers.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use futures_util::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::sync::Mutex;
use tokio_tungstenite::{connect_async, tungstenite, tungstenite::Message};
use tracing::{debug, info, warn};

use crate::config::FeedConfig;
use crate::dispatch::{Directive, Dispatcher};
use crate::metrics::MetricsSink;

/// Dispatcher shared between the feed client and read-only observers such
/// as the health endpoint. The lock is held for one whole batch at a time.
pub type SharedDispatcher<M> = Arc<Mutex<Dispatcher<M>>>;

/// Errors that end a single feed session. The client logs them and
/// reconnects; they never stop the exporter.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to connect to feed {url}: {source}")]
    Connect {
        url: String,
        #[source]
        source: tungstenite::Error,
    },
    #[error("failed to read from feed: {0}")]
    Read(#[source] tungstenite::Error),
    #[error("failed to send {directive} to feed: {source}")]
    Send {
        directive: String,
        #[source]
        source: tungstenite::Error,
    },
}

/// Exponential reconnect delay, doubling up to a maximum.
#[derive(Debug)]
pub struct Backoff {
    base: Duration,
    max: Duration,
    current: Duration,
}

impl Backoff {
    pub fn new(base: Duration, max: Duration) -> Self {
        let base = base.max(Duration::from_millis(100));
        Self {
            base,
            max: max.max(base),
            current: base,
        }
    }

    /// Returns the delay to wait now and doubles the next one.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = (self.current * 2).min(self.max);
        delay
    }

    pub fn reset(&mut self) {
        self.current = self.base;
    }
}

pub struct FeedClient<M> {
    cfg: FeedConfig,
    dispatcher: SharedDispatcher<M>,
    connected: Arc<AtomicBool>,
}

impl<M> FeedClient<M>
where
    M: MetricsSink + Send + 'static,
{
    pub fn new(cfg: FeedConfig, dispatcher: SharedDispatcher<M>) -> Self {
        Self {
            cfg,
            dispatcher,
            connected: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Flag that is `true` while a feed session is established.
    pub fn connected_flag(&self) -> Arc<AtomicBool> {
        self.connected.clone()
    }

    /// Runs the feed client forever, reconnecting after every failure.
    pub async fn run(self) {
        let mut backoff = Backoff::new(
            self.cfg.reconnect_base_delay(),
            self.cfg.max_reconnect_delay(),
        );

        loop {
            match self.run_session(&mut backoff).await {
                Ok(()) => info!(url = %self.cfg.url, "feed connection closed"),
                Err(e) => warn!("feed session ended: {e}"),
            }
            self.connected.store(false, Ordering::Relaxed);

            let delay = backoff.next_delay();
            info!(delay_secs = delay.as_secs_f64(), "reconnecting to feed");
            tokio::time::sleep(delay).await;
        }
    }

    async fn run_session(&self, backoff: &mut Backoff) -> Result<(), TransportError> {
        let (ws, _) =
            connect_async(self.cfg.url.as_str())
                .await
                .map_err(|source| TransportError::Connect {
                    url: self.cfg.url.clone(),
                    source,
                })?;

        self.dispatcher.lock().await.reset();
        self.connected.store(true, Ordering::Relaxed);
        backoff.reset();
        info!(url = %self.cfg.url, "connected to telemetry feed");

        let (mut write, mut read) = ws.split();

        while let Some(msg) = read.next().await {
            let directives = match msg.map_err(TransportError::Read)? {
                Message::Text(text) => self.process(text.as_bytes()).await,
                Message::Binary(data) => self.process(&data).await,
                Message::Close(frame) => {
                    debug!(?frame, "feed sent close frame");
                    break;
                }
                // tungstenite answers pings on its own.
                Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => continue,
            };

            for directive in directives {
                let frame = directive.to_string();
                write
                    .send(Message::Text(frame.clone().into()))
                    .await
                    .map_err(|source| TransportError::Send {
                        directive: frame,
                        source,
                    })?;
            }
        }

        Ok(())
    }

    /// Dispatches one batch under the dispatcher lock.
    async fn process(&self, payload: &[u8]) -> Vec<Directive> {
        let now = now_ms();
        let mut dispatcher = self.dispatcher.lock().await;

        match dispatcher.handle_payload(payload, now) {
            Ok(report) => {
                if report.skipped > 0 {
                    debug!(
                        events = report.events,
                        skipped = report.skipped,
                        "feed batch had malformed events"
                    );
                }
                report.directives
            }
            Err(err) => {
                warn!(%err, bytes = payload.len(), "discarding undecodable feed batch");
                Vec::new()
            }
        }
    }
}

/// Returns the current wall-clock time in milliseconds since the Unix epoch.
///
/// On error (system clock before epoch) this falls back to 0.
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}
