//! Telemetry feed wire format.
//!
//! This module covers everything needed to turn a raw feed batch into typed
//! events:
//!
//! - the fixed action codes ([`action::ActionKind`]),
//! - the batch decoder ([`decoder::decode`]),
//! - events with typed argument accessors ([`event::Event`]),
//! - decode and field-shape errors ([`error`]).

pub mod action;
pub mod decoder;
pub mod error;
pub mod event;

pub use action::ActionKind;
pub use decoder::{decode, decode_str};
pub use error::{DecodeError, FieldShapeError};
pub use event::{Event, NodeId};
