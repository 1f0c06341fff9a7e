// src/snapshot.rs
//! Read side of the history window.
//!
//! The refresh loop owns the mutable [`BoundedHistory`]; after each cycle it
//! publishes an immutable [`FeedSnapshot`] here. Readers clone the current
//! `Arc` and never observe a window mid-mutation. The lock guards only the
//! pointer swap.

use crate::feed::{BoundedHistory, Post};
use chrono::{DateTime, Utc};
use std::sync::{Arc, RwLock};

#[derive(Debug, Clone)]
pub struct FeedSnapshot {
    posts: Arc<[Post]>,
    capacity: usize,
    generation: u64,
    published_at: DateTime<Utc>,
}

impl FeedSnapshot {
    fn from_history(history: &BoundedHistory, generation: u64) -> Self {
        Self {
            posts: history.iter().cloned().collect(),
            capacity: history.capacity(),
            generation,
            published_at: Utc::now(),
        }
    }

    /// Oldest to newest.
    pub fn posts(&self) -> &[Post] {
        &self.posts
    }

    pub fn get(&self, id: &str) -> Option<&Post> {
        self.posts.iter().find(|p| p.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.posts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.posts.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of publishes before this one; 0 for the snapshot loaded at startup.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn published_at(&self) -> DateTime<Utc> {
        self.published_at
    }
}

#[derive(Debug)]
pub struct SnapshotView {
    current: RwLock<Arc<FeedSnapshot>>,
}

impl SnapshotView {
    pub fn new(history: &BoundedHistory) -> Self {
        Self {
            current: RwLock::new(Arc::new(FeedSnapshot::from_history(history, 0))),
        }
    }

    /// Replaces the visible snapshot with the content of `history`.
    pub fn publish(&self, history: &BoundedHistory) {
        let generation = self.current().generation + 1;
        let next = Arc::new(FeedSnapshot::from_history(history, generation));
        match self.current.write() {
            Ok(mut current) => *current = next,
            Err(poisoned) => *poisoned.into_inner() = next,
        }
    }

    pub fn current(&self) -> Arc<FeedSnapshot> {
        match self.current.read() {
            Ok(current) => Arc::clone(&current),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    /// Oldest to newest.
    pub fn get_all(&self) -> Vec<Post> {
        self.current().posts().to_vec()
    }

    pub fn get_by_id(&self, id: &str) -> Option<Post> {
        self.current().get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.current().len()
    }

    pub fn is_empty(&self) -> bool {
        self.current().is_empty()
    }
}
