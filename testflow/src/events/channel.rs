//! Progress and error notification channel.

use crate::core::StageId;
use crate::errors::GraphError;
use parking_lot::RwLock;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tracing::warn;

/// Listener invoked once per successfully completed stage.
pub type ProgressListener = Arc<dyn Fn(StageId) + Send + Sync>;

/// Listener invoked once per failed run.
pub type ErrorListener = Arc<dyn Fn(&GraphError) + Send + Sync>;

/// Delivers progress and error notifications to registered listeners.
///
/// Listeners run synchronously on the notifying task, in registration order.
/// A listener that panics is logged and skipped; it never aborts the run or
/// prevents later listeners from being called. Listeners may register
/// further listeners; those are called from the next notification on.
#[derive(Default)]
pub struct ProgressChannel {
    progress: RwLock<Vec<ProgressListener>>,
    errors: RwLock<Vec<ErrorListener>>,
}

impl ProgressChannel {
    /// Creates a channel with no listeners.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a progress listener.
    pub fn on_progress<F>(&self, listener: F)
    where
        F: Fn(StageId) + Send + Sync + 'static,
    {
        self.progress.write().push(Arc::new(listener));
    }

    /// Registers an error listener.
    pub fn on_error<F>(&self, listener: F)
    where
        F: Fn(&GraphError) + Send + Sync + 'static,
    {
        self.errors.write().push(Arc::new(listener));
    }

    /// Notifies all progress listeners that `stage` completed.
    pub fn notify_progress(&self, stage: StageId) {
        let listeners: Vec<ProgressListener> = self.progress.read().clone();
        for (index, listener) in listeners.iter().enumerate() {
            if let Err(e) = catch_unwind(AssertUnwindSafe(|| listener(stage))) {
                warn!(
                    stage = %stage,
                    listener = index,
                    "Progress listener panicked: {:?}", e
                );
            }
        }
    }

    /// Notifies all error listeners.
    pub fn notify_error(&self, error: &GraphError) {
        let listeners: Vec<ErrorListener> = self.errors.read().clone();
        for (index, listener) in listeners.iter().enumerate() {
            if let Err(e) = catch_unwind(AssertUnwindSafe(|| listener(error))) {
                warn!(
                    phase = %error.phase,
                    listener = index,
                    "Error listener panicked: {:?}", e
                );
            }
        }
    }

    /// Returns the number of registered progress listeners.
    #[must_use]
    pub fn progress_listener_count(&self) -> usize {
        self.progress.read().len()
    }

    /// Returns the number of registered error listeners.
    #[must_use]
    pub fn error_listener_count(&self) -> usize {
        self.errors.read().len()
    }
}

impl std::fmt::Debug for ProgressChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressChannel")
            .field("progress_listeners", &self.progress_listener_count())
            .field("error_listeners", &self.error_listener_count())
            .finish()
    }
}
