//! Connection to the upstream telemetry feed.
//!
//! This module provides the websocket [`ws::FeedClient`] that delivers feed
//! batches to the dispatcher one at a time and carries its directives back
//! upstream.

pub mod ws;

pub use ws::{Backoff, FeedClient, SharedDispatcher, TransportError, now_ms};
