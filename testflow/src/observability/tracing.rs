//! Span helpers for workflow runs.

use crate::core::StageId;
use crate::state::RunId;
use std::time::Instant;
use tracing::Span;

/// Simple span timing helper.
#[derive(Debug)]
pub struct SpanTimer {
    start: Instant,
    name: String,
}

impl SpanTimer {
    /// Starts a new span timer.
    #[must_use]
    pub fn start(name: impl Into<String>) -> Self {
        Self {
            start: Instant::now(),
            name: name.into(),
        }
    }

    /// Returns the elapsed time in milliseconds.
    #[must_use]
    pub fn elapsed_ms(&self) -> f64 {
        self.start.elapsed().as_secs_f64() * 1000.0
    }

    /// Returns the span name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Finishes the span and returns the duration.
    #[must_use]
    pub fn finish(self) -> f64 {
        self.elapsed_ms()
    }
}

/// The span a whole run executes in.
#[must_use]
pub fn run_span(run_id: RunId) -> Span {
    tracing::info_span!("workflow_run", run_id = %run_id)
}

/// The span one stage executes in.
#[must_use]
pub fn stage_span(run_id: RunId, stage: StageId) -> Span {
    tracing::info_span!("workflow_stage", run_id = %run_id, stage = stage.as_str())
}
