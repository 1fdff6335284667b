//! In-memory checkpoint store.

use super::{CheckpointRecord, CheckpointStore};
use crate::errors::CheckpointError;
use crate::state::RunId;
use async_trait::async_trait;
use dashmap::DashMap;

/// A checkpoint store backed by a concurrent map.
///
/// Checkpoints live as long as the store.
#[derive(Debug, Default)]
pub struct MemoryCheckpointStore {
    records: DashMap<RunId, CheckpointRecord>,
}

impl MemoryCheckpointStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored runs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true if nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl CheckpointStore for MemoryCheckpointStore {
    async fn put(&self, record: CheckpointRecord) -> Result<(), CheckpointError> {
        self.records.insert(record.run_id, record);
        Ok(())
    }

    async fn load(&self, run_id: &RunId) -> Result<Option<CheckpointRecord>, CheckpointError> {
        Ok(self.records.get(run_id).map(|r| r.value().clone()))
    }

    async fn delete(&self, run_id: &RunId) -> Result<bool, CheckpointError> {
        Ok(self.records.remove(run_id).is_some())
    }

    async fn list(&self) -> Result<Vec<CheckpointRecord>, CheckpointError> {
        let mut records: Vec<CheckpointRecord> =
            self.records.iter().map(|r| r.value().clone()).collect();
        records.sort_by_key(|r| r.saved_at);
        Ok(records)
    }
}
