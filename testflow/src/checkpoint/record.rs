//! Checkpoint records.

use crate::core::StageId;
use crate::state::{fields, RunId, SessionState};
use crate::utils::{now_utc, sha256_hex, Timestamp};
use serde::{Deserialize, Serialize};

/// The most recent snapshot of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointRecord {
    /// The run this snapshot belongs to.
    pub run_id: RunId,
    /// The last stage that completed successfully.
    pub last_stage: StageId,
    /// The session state after `last_stage`.
    pub state: SessionState,
    /// SHA-256 of the `code` field at save time.
    pub code_digest: String,
    /// When the snapshot was taken.
    pub saved_at: Timestamp,
}

impl CheckpointRecord {
    /// Creates a record for `state` after `last_stage`.
    #[must_use]
    pub fn new(run_id: RunId, last_stage: StageId, state: SessionState) -> Self {
        let code_digest = sha256_hex(state.get_or_default(fields::CODE));
        Self {
            run_id,
            last_stage,
            state,
            code_digest,
            saved_at: now_utc(),
        }
    }

    /// Returns true if the stored `code` still matches the recorded digest.
    #[must_use]
    pub fn is_intact(&self) -> bool {
        sha256_hex(self.state.get_or_default(fields::CODE)) == self.code_digest
    }

    /// Returns true if every stage has completed.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.last_stage == StageId::Generation
    }
}
