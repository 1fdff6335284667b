//! Observability utilities.

mod logging;
mod tracing;

pub use self::logging::init_logging;
pub use self::tracing::{run_span, stage_span, SpanTimer};
