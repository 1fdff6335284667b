//! File-backed checkpoint store.

use super::{CheckpointRecord, CheckpointStore};
use crate::errors::CheckpointError;
use crate::state::RunId;
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// A checkpoint store that keeps one JSON file per run in a directory.
///
/// Writes go to a temporary file which is then renamed over the target, so
/// a reader never sees a partially written checkpoint.
#[derive(Debug, Clone)]
pub struct FileCheckpointStore {
    dir: PathBuf,
}

impl FileCheckpointStore {
    /// Creates a store rooted at `dir`. The directory is created on first write.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Returns the directory holding the checkpoint files.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, run_id: &RunId) -> PathBuf {
        self.dir.join(format!("{run_id}.json"))
    }
}

#[async_trait]
impl CheckpointStore for FileCheckpointStore {
    async fn put(&self, record: CheckpointRecord) -> Result<(), CheckpointError> {
        tokio::fs::create_dir_all(&self.dir).await?;

        let target = self.path_for(&record.run_id);
        let tmp = self.dir.join(format!("{}.json.tmp", record.run_id));
        let payload = serde_json::to_vec_pretty(&record)?;

        tokio::fs::write(&tmp, payload).await?;
        tokio::fs::rename(&tmp, &target).await?;

        debug!(run_id = %record.run_id, path = %target.display(), "Checkpoint written");
        Ok(())
    }

    async fn load(&self, run_id: &RunId) -> Result<Option<CheckpointRecord>, CheckpointError> {
        match tokio::fs::read(self.path_for(run_id)).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, run_id: &RunId) -> Result<bool, CheckpointError> {
        match tokio::fs::remove_file(self.path_for(run_id)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn list(&self) -> Result<Vec<CheckpointRecord>, CheckpointError> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut records = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let bytes = tokio::fs::read(&path).await?;
            match serde_json::from_slice::<CheckpointRecord>(&bytes) {
                Ok(record) => records.push(record),
                Err(e) => warn!(path = %path.display(), "Skipping unreadable checkpoint: {}", e),
            }
        }
        records.sort_by_key(|r| r.saved_at);
        Ok(records)
    }
}
