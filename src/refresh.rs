// src/refresh.rs
//! Periodic refresh of the history window.
//!
//! One cycle: fetch a page, decode it, fetch and store the image of every
//! post not yet in the window, push it, publish the new snapshot, delete the
//! artifacts of evicted posts, then persist. A post only enters the window
//! once its image is on disk. Cycles never overlap and the sleep is measured
//! from the end of one cycle to the start of the next.

use crate::error::Result;
use crate::feed::{decode_feed_page, BoundedHistory, FeedClient, ImageFetcher, Post};
use crate::snapshot::SnapshotView;
use crate::storage::{ImageStore, StateFile};
use log::{debug, error, info, warn};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::oneshot;
use tokio::time::sleep;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub decoded: usize,
    pub ads: usize,
    pub skipped_entries: usize,
    pub added: Vec<String>,
    pub evicted: Vec<String>,
    pub image_failures: Vec<String>,
    pub duration: Duration,
    /// False when the window was published but writing the state file failed.
    pub persisted: bool,
}

impl CycleReport {
    pub fn summary(&self) -> String {
        format!(
            "{} decoded ({} ads, {} malformed), {} added, {} evicted, {} image failures in {:?}{}",
            self.decoded,
            self.ads,
            self.skipped_entries,
            self.added.len(),
            self.evicted.len(),
            self.image_failures.len(),
            self.duration,
            if self.persisted { "" } else { " (not persisted)" }
        )
    }
}

pub struct RefreshLoop {
    history: BoundedHistory,
    feed: Arc<dyn FeedClient>,
    images: Arc<dyn ImageFetcher>,
    store: Arc<dyn ImageStore>,
    state_file: StateFile,
    view: Arc<SnapshotView>,
    interval: Duration,
}

impl RefreshLoop {
    /// `history` is the window loaded at startup; the loop becomes its only writer.
    pub fn new(
        history: BoundedHistory,
        feed: Arc<dyn FeedClient>,
        images: Arc<dyn ImageFetcher>,
        store: Arc<dyn ImageStore>,
        state_file: StateFile,
        view: Arc<SnapshotView>,
        interval: Duration,
    ) -> Self {
        Self {
            history,
            feed,
            images,
            store,
            state_file,
            view,
            interval,
        }
    }

    pub fn history(&self) -> &BoundedHistory {
        &self.history
    }

    /// Runs one cycle. Errors from the feed fetch or page decode abort the
    /// cycle before the window is touched. Once the window is published the
    /// cycle counts as applied; a failed state write is logged and reported
    /// through [`CycleReport::persisted`], and the next cycle writes again.
    pub async fn run_cycle(&mut self) -> Result<CycleReport> {
        let start = Instant::now();
        let page = self.feed.fetch_page().await?;
        let decoded = decode_feed_page(&page)?;

        let mut report = CycleReport {
            decoded: decoded.posts.len(),
            ads: decoded.ads,
            skipped_entries: decoded.skipped,
            ..CycleReport::default()
        };

        let mut evicted: Vec<Post> = Vec::new();
        for post in decoded.posts {
            if self.history.contains(&post.id) {
                continue;
            }
            if let Err(e) = self.store.fetch_and_save(&post, self.images.as_ref()).await {
                warn!("Skipping post {} this cycle: {}", post.id, e);
                report.image_failures.push(post.id.clone());
                continue;
            }
            report.added.push(post.id.clone());
            if let Some(old) = self.history.push(post) {
                info!("Expunged post {}", old.id);
                evicted.push(old);
            }
        }

        self.view.publish(&self.history);

        for old in evicted {
            report.evicted.push(old.id.clone());
            // Same id can come back within one page; its new artifact stays.
            if self.history.contains(&old.id) {
                continue;
            }
            if let Err(e) = self.store.delete(&old).await {
                warn!("Failed to delete image for evicted post {}: {}", old.id, e);
            }
        }

        match self.state_file.save(&self.history).await {
            Ok(()) => report.persisted = true,
            Err(e) => error!(
                "Cycle applied ({} posts served) but not persisted to {}: {}",
                self.history.len(),
                self.state_file.path().display(),
                e
            ),
        }
        report.duration = start.elapsed();
        Ok(report)
    }

    /// Runs cycles until `shutdown` fires (or its sender is dropped), then
    /// persists the window one last time and hands it back.
    ///
    /// Shutdown is only observed between cycles, so an in-flight cycle always
    /// completes.
    pub async fn run(mut self, mut shutdown: oneshot::Receiver<()>) -> BoundedHistory {
        info!(
            "Starting refresh loop with {}s intervals (capacity {})",
            self.interval.as_secs(),
            self.history.capacity()
        );
        let mut cycle_count: u64 = 0;

        loop {
            cycle_count += 1;
            debug!("Fetching feed (cycle #{})...", cycle_count);
            match self.run_cycle().await {
                Ok(report) => info!("Refresh cycle #{} done: {}", cycle_count, report.summary()),
                Err(e) if e.is_recoverable() => {
                    warn!("Refresh cycle #{} aborted: {}", cycle_count, e);
                }
                Err(e) => error!("Refresh cycle #{} failed: {} ({:?})", cycle_count, e, e.categorize()),
            }

            debug!("Sleeping for {:?}", self.interval);
            tokio::select! {
                _ = sleep(self.interval) => {}
                _ = &mut shutdown => {
                    info!("Refresh loop shutting down after {} cycles", cycle_count);
                    break;
                }
            }
        }

        if let Err(e) = self.state_file.save(&self.history).await {
            error!("Failed to persist history on shutdown: {}", e);
        }
        self.history
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FeedError;
    use crate::testing::{feed_page, MemoryImageStore, MockFeedClient, StaticImageFetcher};
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_cycle_report_counts() {
        let dir = tempdir().unwrap();
        let feed = Arc::new(MockFeedClient::new());
        feed.push_page(feed_page(&["A", "B", "C"]));
        let fetcher = Arc::new(StaticImageFetcher::with_images(&["A", "C"]));
        let store = Arc::new(MemoryImageStore::new());
        let history = BoundedHistory::new(5);
        let view = Arc::new(SnapshotView::new(&history));

        let mut refresh = RefreshLoop::new(
            history,
            feed,
            fetcher,
            store,
            StateFile::new(dir.path().join("state.json"), 5),
            view,
            Duration::from_secs(1),
        );
        let report = refresh.run_cycle().await.unwrap();

        assert_eq!(report.decoded, 3);
        assert_eq!(report.added, vec!["A".to_string(), "C".to_string()]);
        assert_eq!(report.image_failures, vec!["B".to_string()]);
        assert!(report.evicted.is_empty());
        assert!(report.persisted);
        assert!(report.summary().contains("2 added"));
    }

    #[tokio::test]
    async fn test_failed_state_write_still_applies_cycle() {
        let dir = tempdir().unwrap();
        // A directory at the state path makes the final rename fail.
        let state_path = dir.path().join("state.json");
        std::fs::create_dir(&state_path).unwrap();
        let feed = Arc::new(MockFeedClient::new());
        feed.push_page(feed_page(&["A"]));
        let history = BoundedHistory::new(3);
        let view = Arc::new(SnapshotView::new(&history));

        let mut refresh = RefreshLoop::new(
            history,
            feed,
            Arc::new(StaticImageFetcher::with_images(&["A"])),
            Arc::new(MemoryImageStore::new()),
            StateFile::new(&state_path, 3),
            view.clone(),
            Duration::from_secs(1),
        );
        let report = refresh.run_cycle().await.unwrap();

        assert!(!report.persisted);
        assert_eq!(report.added, vec!["A".to_string()]);
        assert!(report.summary().ends_with("(not persisted)"));
        assert!(refresh.history().contains("A"));
        assert_eq!(view.len(), 1);
        assert_eq!(view.current().generation(), 1);
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown_and_persists() {
        let dir = tempdir().unwrap();
        let state_file = StateFile::new(dir.path().join("state.json"), 5);
        let feed = Arc::new(MockFeedClient::new());
        feed.push_page(feed_page(&["A"]));
        feed.push_error(FeedError::StatusError { status: 500, url: "http://feed".into() });
        let history = BoundedHistory::new(5);
        let view = Arc::new(SnapshotView::new(&history));

        let refresh = RefreshLoop::new(
            history,
            feed.clone(),
            Arc::new(StaticImageFetcher::with_images(&["A"])),
            Arc::new(MemoryImageStore::new()),
            state_file.clone(),
            view.clone(),
            Duration::from_millis(10),
        );
        let (tx, rx) = oneshot::channel();
        let handle = tokio::spawn(refresh.run(rx));

        tokio::time::sleep(Duration::from_millis(100)).await;
        tx.send(()).unwrap();
        let history = handle.await.unwrap();

        assert!(feed.calls() >= 2);
        assert!(history.contains("A"));
        assert_eq!(state_file.load().await.unwrap(), history);
        assert!(view.get_by_id("A").is_some());
    }
}
