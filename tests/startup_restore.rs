//! Integration tests for startup restore
//!
//! A persisted window is reconciled with the configured capacity and the
//! contents of the image directory before anything is served.

use feed_mirror::{
    feed::BoundedHistory,
    storage::{restore_history, ImageStore},
    testing::sample_post,
    DiskImageStore, FeedError, StateFile,
};
use pretty_assertions::assert_eq;
use std::path::Path;
use tempfile::TempDir;

fn stored_files(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

fn ids(history: &BoundedHistory) -> Vec<&str> {
    history.iter().map(|p| p.id.as_str()).collect()
}

async fn persisted_window(dir: &TempDir, capacity: usize, ids: &[&str]) -> (StateFile, DiskImageStore) {
    let store = DiskImageStore::new(dir.path().join("images"));
    let mut history = BoundedHistory::new(capacity);
    for id in ids {
        let post = sample_post(id);
        store.save(&post, id.as_bytes()).await.unwrap();
        history.push(post);
    }
    let state_file = StateFile::new(dir.path().join("feed_state.json"), capacity);
    state_file.save(&history).await.unwrap();
    (state_file, store)
}

#[tokio::test]
async fn test_shrunk_capacity_drops_oldest_and_cleans_image_dir() {
    let dir = TempDir::new().unwrap();
    let (state_file, store) = persisted_window(&dir, 4, &["A", "B", "C", "D"]).await;
    std::fs::write(store.root().join("X.jpeg"), b"stray").unwrap();
    std::fs::write(store.root().join("Y.jpeg.part"), b"half").unwrap();

    let restored = restore_history(&state_file, &store, 2).await.unwrap();

    assert_eq!(ids(&restored.history), vec!["C", "D"]);
    assert_eq!(restored.history.capacity(), 2);
    assert_eq!(restored.evicted, vec!["A", "B"]);
    assert_eq!(restored.pruned, 2);
    assert!(restored.missing.is_empty());
    assert_eq!(stored_files(store.root()), vec!["C.jpeg", "D.jpeg"]);
}

#[tokio::test]
async fn test_grown_capacity_keeps_every_post() {
    let dir = TempDir::new().unwrap();
    let (state_file, store) = persisted_window(&dir, 2, &["A", "B"]).await;

    let mut restored = restore_history(&state_file, &store, 5).await.unwrap();

    assert_eq!(ids(&restored.history), vec!["A", "B"]);
    assert!(restored.evicted.is_empty());
    assert_eq!(restored.history.push(sample_post("C")), None);
    assert_eq!(stored_files(store.root()), vec!["A.jpeg", "B.jpeg"]);
}

#[tokio::test]
async fn test_live_posts_without_images_are_reported() {
    let dir = TempDir::new().unwrap();
    let (state_file, store) = persisted_window(&dir, 3, &["A", "B", "C"]).await;
    std::fs::remove_file(store.root().join("B.jpeg")).unwrap();

    let restored = restore_history(&state_file, &store, 3).await.unwrap();

    assert_eq!(ids(&restored.history), vec!["A", "B", "C"]);
    assert_eq!(restored.missing, vec!["B"]);
    assert_eq!(restored.pruned, 0);
}

#[tokio::test]
async fn test_absent_state_starts_empty_and_prunes_leftovers() {
    let dir = TempDir::new().unwrap();
    let store = DiskImageStore::new(dir.path().join("images"));
    std::fs::create_dir_all(store.root()).unwrap();
    std::fs::write(store.root().join("old.jpeg"), b"stale").unwrap();
    let state_file = StateFile::new(dir.path().join("feed_state.json"), 3);

    let restored = restore_history(&state_file, &store, 3).await.unwrap();

    assert!(restored.history.is_empty());
    assert_eq!(restored.history.capacity(), 3);
    assert_eq!(restored.pruned, 1);
    assert!(stored_files(store.root()).is_empty());
}

#[tokio::test]
async fn test_corrupt_state_refuses_to_start_and_keeps_images() {
    let dir = TempDir::new().unwrap();
    let (state_file, store) = persisted_window(&dir, 2, &["A"]).await;
    std::fs::write(state_file.path(), b"{ not json").unwrap();

    let err = restore_history(&state_file, &store, 2).await.unwrap_err();

    assert!(matches!(err, FeedError::PersistCorrupt { .. }));
    assert_eq!(stored_files(store.root()), vec!["A.jpeg"]);
}
