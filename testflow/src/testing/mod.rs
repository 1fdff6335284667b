//! Testing utilities for testflow workflows.
//!
//! This module provides:
//! - Mock stages
//! - A scripted model client
//! - A recorder for progress and error notifications
//! - Assertions over recorded runs

mod assertions;
mod llm;
mod mocks;
mod recorder;

pub use assertions::{
    assert_failure_mentions, assert_full_progress, assert_generated, assert_no_errors,
    assert_single_error,
};
pub use llm::ScriptedLlmClient;
pub use mocks::{FailingStage, MockStage, RecordingStage, SlowStage, SuccessStage};
pub use recorder::{EventRecorder, RecordedError};
