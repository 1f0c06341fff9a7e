// src/storage/restore.rs
//! Startup reconciliation of the persisted window with the configured
//! capacity and the image directory.

use crate::error::Result;
use crate::feed::BoundedHistory;
use crate::storage::{DiskImageStore, ImageStore, StateFile};
use log::{info, warn};

#[derive(Debug)]
pub struct RestoredHistory {
    pub history: BoundedHistory,
    /// Ids dropped because the configured capacity is smaller, oldest first.
    pub evicted: Vec<String>,
    /// Files removed from the image directory that belong to no live post.
    pub pruned: usize,
    /// Live posts without a cached image.
    pub missing: Vec<String>,
}

/// Loads the persisted window and resizes it to `capacity`, deleting the
/// images of posts that no longer fit. Orphaned and partial image files are
/// removed afterwards. Only a failure to load the state is an error.
pub async fn restore_history(
    state_file: &StateFile,
    store: &DiskImageStore,
    capacity: usize,
) -> Result<RestoredHistory> {
    let mut history = state_file.load().await?;

    let mut evicted = Vec::new();
    if history.capacity() != capacity {
        warn!(
            "Persisted capacity {} differs from HISTORY_CAPACITY {}; resizing",
            history.capacity(),
            capacity
        );
        for post in history.set_capacity(capacity) {
            info!("Expunged post {} after resize", post.id);
            if let Err(e) = store.delete(&post).await {
                warn!("Failed to delete image for post {}: {}", post.id, e);
            }
            evicted.push(post.id);
        }
    }

    let pruned = match store.prune_orphans(&history).await {
        Ok(removed) => removed,
        Err(e) => {
            warn!("Could not prune orphaned images in {}: {}", store.root().display(), e);
            0
        }
    };

    let missing = store.missing_artifacts(&history).await;
    if !missing.is_empty() {
        warn!("{} live posts have no cached image: {:?}", missing.len(), missing);
    }

    Ok(RestoredHistory {
        history,
        evicted,
        pruned,
        missing,
    })
}
