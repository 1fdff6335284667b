//! Event delivery for workflow runs.
//!
//! Two independent surfaces:
//! - [`ProgressChannel`] carries per-stage progress and per-run error
//!   notifications to the presentation layer.
//! - [`EventSink`] receives structured lifecycle events for logging and
//!   analytics.

mod channel;
mod sink;

pub use channel::{ErrorListener, ProgressChannel, ProgressListener};
pub use sink::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};
