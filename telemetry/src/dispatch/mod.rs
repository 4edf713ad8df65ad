//! Feed event dispatch.
//!
//! [`Dispatcher`] is the state machine that turns decoded feed events into
//! metric observations and control [`Directive`]s for the feed.

pub mod directive;
pub mod dispatcher;

pub use directive::Directive;
pub use dispatcher::{BatchReport, Dispatcher};
