//! Test assertions for workflow runs.

use super::EventRecorder;
use crate::core::StageId;
use crate::extract::{FAILURE_PREFIX, NO_RESULT_SENTINELS};

/// Asserts that every stage reported progress exactly once, in order.
pub fn assert_full_progress(recorder: &EventRecorder) {
    assert_eq!(
        recorder.progress(),
        StageId::ALL.to_vec(),
        "Expected one progress event per stage in pipeline order"
    );
}

/// Asserts that no error was reported.
pub fn assert_no_errors(recorder: &EventRecorder) {
    let errors = recorder.errors();
    assert!(errors.is_empty(), "Expected no errors, got {errors:?}");
}

/// Asserts that exactly one error was reported, in the given phase.
pub fn assert_single_error(recorder: &EventRecorder, phase: &str) {
    assert_eq!(
        recorder.error_phases(),
        vec![phase],
        "Expected exactly one error in phase '{}', got {:?}",
        phase,
        recorder.errors()
    );
}

/// Asserts that `output` is a successful result rather than a failure string
/// or a no-result marker.
pub fn assert_generated(output: &str) {
    assert!(
        !output.starts_with(FAILURE_PREFIX),
        "Expected generated output, got failure: {output}"
    );
    assert!(
        !NO_RESULT_SENTINELS.contains(&output.trim()),
        "Expected generated output, got sentinel '{output}'"
    );
}

/// Asserts that `output` is a failure string mentioning `needle`.
pub fn assert_failure_mentions(output: &str, needle: &str) {
    assert!(
        output.starts_with(FAILURE_PREFIX),
        "Expected a failure string, got: {output}"
    );
    assert!(
        output.contains(needle),
        "Expected failure string to mention '{needle}', got: {output}"
    );
}
