// src/storage/state_file.rs
//! Durable copy of the history window.
//!
//! The file is a JSON document holding the capacity and the ordered posts.
//! Writes go to a sibling temp file that is renamed over the target, so a
//! crash mid-write leaves the previous state intact.

use crate::error::{FeedError, Result};
use crate::feed::{BoundedHistory, Post};
use chrono::{DateTime, Utc};
use log::{error, info};
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

pub const STATE_FORMAT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct PersistedState {
    version: u32,
    capacity: usize,
    saved_at: DateTime<Utc>,
    posts: Vec<Post>,
}

#[derive(Debug, Clone)]
pub struct StateFile {
    path: PathBuf,
    default_capacity: usize,
}

impl StateFile {
    /// `default_capacity` is used when no state has been written yet.
    pub fn new(path: impl Into<PathBuf>, default_capacity: usize) -> Self {
        Self {
            path: path.into(),
            default_capacity,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(".tmp");
        PathBuf::from(name)
    }

    fn corrupt(&self, reason: impl Into<String>) -> FeedError {
        FeedError::PersistCorrupt {
            path: self.path.clone(),
            reason: reason.into(),
        }
    }

    /// Reads the persisted history. A missing file yields an empty history at
    /// the default capacity; a present file that cannot be decoded is an error.
    pub async fn load(&self) -> Result<BoundedHistory> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!(
                    "No state file at {}, starting with an empty history of {}",
                    self.path.display(),
                    self.default_capacity
                );
                return Ok(BoundedHistory::new(self.default_capacity));
            }
            Err(e) => return Err(self.corrupt(format!("unreadable: {}", e))),
        };

        let state: PersistedState = serde_json::from_slice(&bytes).map_err(|e| {
            error!("State file {} failed to parse: {}", self.path.display(), e);
            self.corrupt(e.to_string())
        })?;
        if state.version != STATE_FORMAT_VERSION {
            return Err(self.corrupt(format!(
                "unsupported format version {} (expected {})",
                state.version, STATE_FORMAT_VERSION
            )));
        }

        let capacity = state.capacity;
        let history = BoundedHistory::from_parts(capacity, state.posts).map_err(|len| {
            self.corrupt(format!("{} posts recorded for a capacity of {}", len, capacity))
        })?;
        info!(
            "Loaded {} posts of history from {} (saved {})",
            history.len(),
            self.path.display(),
            state.saved_at
        );
        Ok(history)
    }

    pub async fn save(&self, history: &BoundedHistory) -> Result<()> {
        let state = PersistedState {
            version: STATE_FORMAT_VERSION,
            capacity: history.capacity(),
            saved_at: Utc::now(),
            posts: history.to_vec(),
        };
        let data = serde_json::to_vec_pretty(&state)?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let temp_path = self.temp_path();
        tokio::fs::write(&temp_path, &data).await.map_err(|e| {
            error!("State persist error: write to {} failed: {}", temp_path.display(), e);
            FeedError::StorageError(format!("Failed to write state file: {}", e))
        })?;
        tokio::fs::rename(&temp_path, &self.path).await.map_err(|e| {
            error!("State persist error: rename failed: {}", e);
            FeedError::StorageError(format!("Failed to rename temp state file: {}", e))
        })?;

        info!("Dumped {} posts of history to {}", history.len(), self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::sample_post;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_missing_file_yields_empty_history() {
        let dir = tempdir().unwrap();
        let state = StateFile::new(dir.path().join("feed_state.json"), 7);

        let history = state.load().await.unwrap();
        assert!(history.is_empty());
        assert_eq!(history.capacity(), 7);
    }

    #[tokio::test]
    async fn test_missing_file_with_huge_capacity_does_not_preallocate() {
        let dir = tempdir().unwrap();
        let state = StateFile::new(dir.path().join("feed_state.json"), usize::MAX);

        let mut history = state.load().await.unwrap();
        assert_eq!(history.capacity(), usize::MAX);
        assert_eq!(history.push(sample_post("A")), None);
    }

    #[tokio::test]
    async fn test_round_trip_preserves_order_and_capacity() {
        let dir = tempdir().unwrap();
        let state = StateFile::new(dir.path().join("nested").join("feed_state.json"), 25);

        let mut history = BoundedHistory::new(3);
        for id in ["A", "B", "C", "D"] {
            history.push(sample_post(id));
        }
        state.save(&history).await.unwrap();

        let loaded = state.load().await.unwrap();
        assert_eq!(loaded, history);
        assert_eq!(loaded.capacity(), 3);
        assert!(!state.temp_path().exists());
    }

    #[tokio::test]
    async fn test_round_trip_of_empty_history() {
        let dir = tempdir().unwrap();
        let state = StateFile::new(dir.path().join("feed_state.json"), 4);

        let history = BoundedHistory::new(4);
        state.save(&history).await.unwrap();
        assert_eq!(state.load().await.unwrap(), history);
    }

    #[tokio::test]
    async fn test_garbage_file_is_fatal() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("feed_state.json");
        std::fs::write(&path, b"\x80\x04\x95garbage").unwrap();

        let err = StateFile::new(&path, 25).load().await.unwrap_err();
        assert!(matches!(err, FeedError::PersistCorrupt { .. }));
        assert!(!err.is_recoverable());
    }

    #[tokio::test]
    async fn test_zero_length_file_is_fatal() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("feed_state.json");
        std::fs::write(&path, b"").unwrap();

        let err = StateFile::new(&path, 25).load().await.unwrap_err();
        assert!(matches!(err, FeedError::PersistCorrupt { .. }));
    }

    #[tokio::test]
    async fn test_overfull_or_unknown_version_is_fatal() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("feed_state.json");
        let posts = vec![sample_post("A"), sample_post("B")];

        let overfull = serde_json::json!({
            "version": STATE_FORMAT_VERSION,
            "capacity": 1,
            "saved_at": "2024-01-01T00:00:00Z",
            "posts": posts,
        });
        std::fs::write(&path, overfull.to_string()).unwrap();
        let err = StateFile::new(&path, 25).load().await.unwrap_err();
        assert!(matches!(err, FeedError::PersistCorrupt { ref reason, .. } if reason.contains("capacity of 1")));

        let future = serde_json::json!({
            "version": 99,
            "capacity": 5,
            "saved_at": "2024-01-01T00:00:00Z",
            "posts": [],
        });
        std::fs::write(&path, future.to_string()).unwrap();
        let err = StateFile::new(&path, 25).load().await.unwrap_err();
        assert!(matches!(err, FeedError::PersistCorrupt { ref reason, .. } if reason.contains("version 99")));
    }
}
