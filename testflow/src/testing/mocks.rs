//! Mock stages for testing.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::time::Duration;

use crate::core::StageId;
use crate::errors::StageError;
use crate::stages::Stage;
use crate::state::{Message, SessionState, StateUpdate};

/// A mock stage that records calls and returns a configurable outcome.
#[derive(Debug)]
pub struct MockStage {
    id: StageId,
    outcome: Mutex<Result<StateUpdate, StageError>>,
    call_count: Mutex<usize>,
}

impl MockStage {
    /// Creates a new mock stage returning an empty update.
    #[must_use]
    pub fn new(id: StageId) -> Self {
        Self {
            id,
            outcome: Mutex::new(Ok(StateUpdate::new())),
            call_count: Mutex::new(0),
        }
    }

    /// Sets the outcome to return.
    pub fn set_outcome(&self, outcome: Result<StateUpdate, StageError>) {
        *self.outcome.lock() = outcome;
    }

    /// Returns the number of times the stage was called.
    #[must_use]
    pub fn call_count(&self) -> usize {
        *self.call_count.lock()
    }
}

#[async_trait]
impl Stage for MockStage {
    fn id(&self) -> StageId {
        self.id
    }

    async fn run(&self, _state: &SessionState) -> Result<StateUpdate, StageError> {
        *self.call_count.lock() += 1;
        self.outcome.lock().clone()
    }
}

/// A stage that always succeeds with a fixed update.
#[derive(Debug)]
pub struct SuccessStage {
    id: StageId,
    update: StateUpdate,
}

impl SuccessStage {
    /// Creates a success stage with an empty update.
    #[must_use]
    pub fn new(id: StageId) -> Self {
        Self {
            id,
            update: StateUpdate::new(),
        }
    }

    /// Creates a success stage returning `update`.
    #[must_use]
    pub const fn with_update(id: StageId, update: StateUpdate) -> Self {
        Self { id, update }
    }

    /// Creates a success stage that appends one assistant message.
    #[must_use]
    pub fn answering(id: StageId, text: impl Into<String>) -> Self {
        Self::with_update(id, StateUpdate::new().append(Message::assistant(text)))
    }
}

#[async_trait]
impl Stage for SuccessStage {
    fn id(&self) -> StageId {
        self.id
    }

    async fn run(&self, _state: &SessionState) -> Result<StateUpdate, StageError> {
        Ok(self.update.clone())
    }
}

/// A stage that always fails.
#[derive(Debug)]
pub struct FailingStage {
    id: StageId,
    error: StageError,
}

impl FailingStage {
    /// Creates a stage failing with an execution error.
    #[must_use]
    pub fn new(id: StageId, message: impl Into<String>) -> Self {
        Self {
            id,
            error: StageError::message(id, message),
        }
    }

    /// Creates a stage failing with an output validation error.
    #[must_use]
    pub fn output_validation(id: StageId, message: impl Into<String>) -> Self {
        Self {
            id,
            error: StageError::output_validation(id, message),
        }
    }
}

#[async_trait]
impl Stage for FailingStage {
    fn id(&self) -> StageId {
        self.id
    }

    async fn run(&self, _state: &SessionState) -> Result<StateUpdate, StageError> {
        Err(self.error.clone())
    }
}

/// A stage that takes time to execute.
#[derive(Debug)]
pub struct SlowStage {
    id: StageId,
    delay: Duration,
}

impl SlowStage {
    /// Creates a new slow stage.
    #[must_use]
    pub const fn new(id: StageId, delay: Duration) -> Self {
        Self { id, delay }
    }

    /// Creates a slow stage with delay in milliseconds.
    #[must_use]
    pub const fn with_delay_ms(id: StageId, ms: u64) -> Self {
        Self::new(id, Duration::from_millis(ms))
    }
}

#[async_trait]
impl Stage for SlowStage {
    fn id(&self) -> StageId {
        self.id
    }

    async fn run(&self, _state: &SessionState) -> Result<StateUpdate, StageError> {
        tokio::time::sleep(self.delay).await;
        Ok(StateUpdate::new())
    }
}

/// A stage that records the state it was given on each call.
#[derive(Debug)]
pub struct RecordingStage {
    id: StageId,
    update: StateUpdate,
    seen: Mutex<Vec<SessionState>>,
}

impl RecordingStage {
    /// Creates a recording stage returning an empty update.
    #[must_use]
    pub fn new(id: StageId) -> Self {
        Self::with_update(id, StateUpdate::new())
    }

    /// Creates a recording stage returning `update`.
    #[must_use]
    pub fn with_update(id: StageId, update: StateUpdate) -> Self {
        Self {
            id,
            update,
            seen: Mutex::new(Vec::new()),
        }
    }

    /// Returns the states this stage was run against.
    #[must_use]
    pub fn seen(&self) -> Vec<SessionState> {
        self.seen.lock().clone()
    }

    /// Returns the number of executions.
    #[must_use]
    pub fn execution_count(&self) -> usize {
        self.seen.lock().len()
    }
}

#[async_trait]
impl Stage for RecordingStage {
    fn id(&self) -> StageId {
        self.id
    }

    async fn run(&self, state: &SessionState) -> Result<StateUpdate, StageError> {
        self.seen.lock().push(state.clone());
        Ok(self.update.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::fields;

    #[tokio::test]
    async fn test_mock_stage() {
        let stage = MockStage::new(StageId::Context);
        let state = SessionState::seed("x");

        assert!(stage.run(&state).await.is_ok());
        assert_eq!(stage.call_count(), 1);

        stage.set_outcome(Err(StageError::message(StageId::Context, "boom")));
        assert!(stage.run(&state).await.is_err());
        assert_eq!(stage.call_count(), 2);
    }

    #[tokio::test]
    async fn test_answering_stage() {
        let stage = SuccessStage::answering(StageId::Generation, "class T {}");
        let update = stage.run(&SessionState::seed("x")).await.unwrap();
        assert_eq!(update.messages(), &[Message::assistant("class T {}")]);
    }

    #[tokio::test]
    async fn test_failing_stage() {
        let stage = FailingStage::output_validation(StageId::Generation, "empty");
        let err = stage.run(&SessionState::seed("x")).await.unwrap_err();
        assert_eq!(err.stage, StageId::Generation);
        assert_eq!(err.kind, crate::errors::StageFailureKind::OutputValidation);
    }

    #[tokio::test]
    async fn test_slow_stage() {
        let stage = SlowStage::with_delay_ms(StageId::Dependency, 10);

        let start = std::time::Instant::now();
        assert!(stage.run(&SessionState::seed("x")).await.is_ok());
        assert!(start.elapsed() >= Duration::from_millis(10));
    }

    #[tokio::test]
    async fn test_recording_stage() {
        let stage = RecordingStage::new(StageId::Dependency);

        stage.run(&SessionState::seed("a")).await.unwrap();
        stage.run(&SessionState::seed("b")).await.unwrap();

        assert_eq!(stage.execution_count(), 2);
        assert_eq!(stage.seen()[1].get_str(fields::CODE), Some("b"));
    }
}
