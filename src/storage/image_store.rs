// src/storage/image_store.rs
//! On-disk image artifacts keyed by post id (`{id}.jpeg`).

use crate::error::{FeedError, Result};
use crate::feed::{BoundedHistory, ImageFetcher, Post};
use async_trait::async_trait;
use futures::StreamExt;
use log::{debug, info, warn};
use std::collections::HashSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

pub const ARTIFACT_EXTENSION: &str = "jpeg";
const PARTIAL_SUFFIX: &str = ".part";

/// Artifact key for a post id. Ids come from a remote API, so only
/// `[A-Za-z0-9_-]` is accepted.
pub fn artifact_key(id: &str) -> Result<String> {
    let valid = !id.is_empty()
        && id.len() <= 128
        && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if !valid {
        return Err(FeedError::InvalidKey(id.to_string()));
    }
    Ok(format!("{}.{}", id, ARTIFACT_EXTENSION))
}

fn image_fetch_error(post: &Post, err: FeedError) -> FeedError {
    match err {
        FeedError::ImageFetchError { .. } | FeedError::InvalidKey(_) => err,
        other => FeedError::ImageFetchError {
            id: post.id.clone(),
            reason: other.to_string(),
        },
    }
}

#[async_trait]
pub trait ImageStore: Send + Sync {
    /// Writes the artifact for `post`, replacing any previous one.
    async fn save(&self, post: &Post, bytes: &[u8]) -> Result<()>;

    /// Removes the artifact for `post`. Absent artifacts are not an error.
    async fn delete(&self, post: &Post) -> Result<()>;

    /// Artifact bytes for `id`, `None` when nothing is stored.
    async fn read(&self, id: &str) -> Result<Option<Vec<u8>>>;

    /// Downloads `post.image_url` and stores it. On error nothing is stored.
    async fn fetch_and_save(&self, post: &Post, fetcher: &dyn ImageFetcher) -> Result<()> {
        let mut stream = fetcher
            .fetch(&post.image_url)
            .await
            .map_err(|e| image_fetch_error(post, e))?;
        let mut bytes = Vec::new();
        while let Some(chunk) = stream.next().await {
            bytes.extend_from_slice(&chunk.map_err(|e| image_fetch_error(post, e))?);
        }
        self.save(post, &bytes).await
    }
}

#[derive(Debug, Clone)]
pub struct DiskImageStore {
    root: PathBuf,
}

impl DiskImageStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn artifact_path(&self, id: &str) -> Result<PathBuf> {
        Ok(self.root.join(artifact_key(id)?))
    }

    fn partial_path(path: &Path) -> PathBuf {
        let mut name = path.as_os_str().to_owned();
        name.push(PARTIAL_SUFFIX);
        PathBuf::from(name)
    }

    async fn discard_partial(partial: &Path) {
        if let Err(e) = tokio::fs::remove_file(partial).await {
            if e.kind() != ErrorKind::NotFound {
                warn!("Could not remove partial image {}: {}", partial.display(), e);
            }
        }
    }

    /// Removes artifacts with no live post and any leftover partial downloads.
    /// Returns the number of files removed.
    pub async fn prune_orphans(&self, history: &BoundedHistory) -> Result<usize> {
        let live: HashSet<String> = history
            .iter()
            .filter_map(|post| artifact_key(&post.id).ok())
            .collect();

        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };

        let mut removed = 0;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            let stale = name.ends_with(PARTIAL_SUFFIX)
                || (name.ends_with(&format!(".{}", ARTIFACT_EXTENSION)) && !live.contains(&name));
            if !stale || !entry.file_type().await?.is_file() {
                continue;
            }
            match tokio::fs::remove_file(entry.path()).await {
                Ok(()) => {
                    debug!("Pruned orphaned image {}", name);
                    removed += 1;
                }
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        if removed > 0 {
            info!("Pruned {} orphaned image files from {}", removed, self.root.display());
        }
        Ok(removed)
    }

    /// Ids of live posts whose artifact is missing on disk.
    pub async fn missing_artifacts(&self, history: &BoundedHistory) -> Vec<String> {
        let mut missing = Vec::new();
        for post in history {
            let present = match self.artifact_path(&post.id) {
                Ok(path) => tokio::fs::try_exists(&path).await.unwrap_or(false),
                Err(_) => false,
            };
            if !present {
                missing.push(post.id.clone());
            }
        }
        missing
    }
}

#[async_trait]
impl ImageStore for DiskImageStore {
    async fn save(&self, post: &Post, bytes: &[u8]) -> Result<()> {
        let path = self.artifact_path(&post.id)?;
        tokio::fs::create_dir_all(&self.root).await?;

        let partial = Self::partial_path(&path);
        if let Err(e) = tokio::fs::write(&partial, bytes).await {
            Self::discard_partial(&partial).await;
            return Err(e.into());
        }
        tokio::fs::rename(&partial, &path).await?;
        debug!("Saved image {} ({} bytes)", path.display(), bytes.len());
        Ok(())
    }

    async fn delete(&self, post: &Post) -> Result<()> {
        let path = self.artifact_path(&post.id)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                debug!("Deleted image {}", path.display());
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn read(&self, id: &str) -> Result<Option<Vec<u8>>> {
        let path = self.artifact_path(id)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Streams chunks straight to a partial file, renamed into place once
    /// the body is complete.
    async fn fetch_and_save(&self, post: &Post, fetcher: &dyn ImageFetcher) -> Result<()> {
        let path = self.artifact_path(&post.id)?;
        let mut stream = fetcher
            .fetch(&post.image_url)
            .await
            .map_err(|e| image_fetch_error(post, e))?;

        tokio::fs::create_dir_all(&self.root).await?;
        let partial = Self::partial_path(&path);
        let mut file = tokio::fs::File::create(&partial).await?;

        let mut written = 0usize;
        while let Some(chunk) = stream.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(e) => {
                    drop(file);
                    Self::discard_partial(&partial).await;
                    return Err(image_fetch_error(post, e));
                }
            };
            if chunk.is_empty() {
                continue;
            }
            if let Err(e) = file.write_all(&chunk).await {
                drop(file);
                Self::discard_partial(&partial).await;
                return Err(e.into());
            }
            written += chunk.len();
        }

        if let Err(e) = file.flush().await {
            drop(file);
            Self::discard_partial(&partial).await;
            return Err(e.into());
        }
        drop(file);
        tokio::fs::rename(&partial, &path).await?;
        info!("Found new image file {} ({} bytes)", path.display(), written);
        Ok(())
    }
}
