//! Records progress and error notifications.

use crate::core::{Phase, StageId};
use crate::events::ProgressChannel;
use parking_lot::Mutex;
use std::sync::Arc;

/// An error notification as seen by a listener.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedError {
    /// Phase the error was attributed to.
    pub phase: Phase,
    /// Error message.
    pub message: String,
}

/// Collects everything a [`ProgressChannel`] delivers.
#[derive(Debug, Clone, Default)]
pub struct EventRecorder {
    progress: Arc<Mutex<Vec<StageId>>>,
    errors: Arc<Mutex<Vec<RecordedError>>>,
}

impl EventRecorder {
    /// Creates a recorder and registers it on `channel`.
    #[must_use]
    pub fn attach(channel: &ProgressChannel) -> Self {
        let recorder = Self::default();

        let progress = Arc::clone(&recorder.progress);
        channel.on_progress(move |stage| progress.lock().push(stage));

        let errors = Arc::clone(&recorder.errors);
        channel.on_error(move |err| {
            errors.lock().push(RecordedError {
                phase: err.phase,
                message: err.message.clone(),
            });
        });

        recorder
    }

    /// Returns the progress events received, in order.
    #[must_use]
    pub fn progress(&self) -> Vec<StageId> {
        self.progress.lock().clone()
    }

    /// Returns the error events received, in order.
    #[must_use]
    pub fn errors(&self) -> Vec<RecordedError> {
        self.errors.lock().clone()
    }

    /// Returns the phase identifiers of the errors received.
    #[must_use]
    pub fn error_phases(&self) -> Vec<&'static str> {
        self.errors.lock().iter().map(|e| e.phase.as_str()).collect()
    }
}
