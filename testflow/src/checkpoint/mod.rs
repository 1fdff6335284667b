//! Checkpoint persistence keyed by run id.
//!
//! The executor saves a [`CheckpointRecord`] after every successful stage so
//! that a run can be inspected or resumed later.

mod file;
mod memory;
mod record;

pub use file::FileCheckpointStore;
pub use memory::MemoryCheckpointStore;
pub use record::CheckpointRecord;

use crate::core::StageId;
use crate::errors::CheckpointError;
use crate::state::{RunId, SessionState};
use async_trait::async_trait;

/// Storage for the most recent snapshot of each run.
#[async_trait]
pub trait CheckpointStore: Send + Sync + std::fmt::Debug {
    /// Stores a record, replacing any earlier record for the same run.
    async fn put(&self, record: CheckpointRecord) -> Result<(), CheckpointError>;

    /// Loads the record for a run.
    async fn load(&self, run_id: &RunId) -> Result<Option<CheckpointRecord>, CheckpointError>;

    /// Deletes the record for a run. Returns true if one existed.
    async fn delete(&self, run_id: &RunId) -> Result<bool, CheckpointError>;

    /// Lists all stored records, oldest first.
    async fn list(&self) -> Result<Vec<CheckpointRecord>, CheckpointError>;

    /// Snapshots `state` as the checkpoint of `run_id` after `stage`.
    async fn save(
        &self,
        run_id: RunId,
        stage: StageId,
        state: &SessionState,
    ) -> Result<CheckpointRecord, CheckpointError> {
        let record = CheckpointRecord::new(run_id, stage, state.clone());
        self.put(record.clone()).await?;
        Ok(record)
    }
}
