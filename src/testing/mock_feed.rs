//! In-memory stand-ins for the feed collaborators.
//!
//! - `MockFeedClient`: scripted sequence of pages and failures
//! - `StaticImageFetcher`: per-url canned bodies, interruptions and statuses
//! - `MemoryImageStore`: artifact store that records every save and delete

use crate::{
    error::{FeedError, Result},
    feed::{FeedClient, ImageFetcher, ImageStream, Post},
    storage::ImageStore,
};
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use serde_json::{json, Value};
use std::{
    collections::{HashMap, VecDeque},
    sync::Mutex,
};

pub fn sample_post(id: &str) -> Post {
    Post {
        id: id.to_string(),
        username: format!("user_{}", id.to_lowercase()),
        full_name: format!("User {}", id),
        caption: format!("caption for {}", id),
        image_url: image_url_for(id),
        taken_at: 1_600_000_000,
    }
}

pub fn image_url_for(id: &str) -> String {
    format!("https://cdn.example/{}.jpg", id)
}

/// A raw timeline entry shaped like the upstream API.
pub fn feed_item(id: &str) -> Value {
    json!({
        "id": id,
        "taken_at": 1_600_000_000,
        "user": { "username": format!("user_{}", id.to_lowercase()), "full_name": format!("User {}", id) },
        "caption": { "text": format!("caption for {}", id) },
        "image_versions2": { "candidates": [ { "url": image_url_for(id) } ] }
    })
}

pub fn feed_page(ids: &[&str]) -> Value {
    json!({ "items": ids.iter().map(|id| feed_item(id)).collect::<Vec<_>>() })
}

/// Returns queued responses in order; an empty queue is a network error.
#[derive(Default)]
pub struct MockFeedClient {
    responses: Mutex<VecDeque<Result<Value>>>,
    calls: Mutex<usize>,
}

impl MockFeedClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_page(&self, page: Value) {
        self.responses.lock().unwrap().push_back(Ok(page));
    }

    pub fn push_error(&self, err: FeedError) {
        self.responses.lock().unwrap().push_back(Err(err));
    }

    pub fn calls(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl FeedClient for MockFeedClient {
    async fn fetch_page(&self) -> Result<Value> {
        *self.calls.lock().unwrap() += 1;
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(FeedError::NetworkError("no page queued".to_string())))
    }
}

#[derive(Debug, Clone)]
enum ImageResponse {
    Chunks(Vec<Vec<u8>>),
    Interrupted(Vec<Vec<u8>>),
    Status(u16),
}

/// Unknown urls answer 404.
#[derive(Default)]
pub struct StaticImageFetcher {
    responses: Mutex<HashMap<String, ImageResponse>>,
    fetched: Mutex<Vec<String>>,
}

impl StaticImageFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serves `jpeg:{id}` for the default image url of every id.
    pub fn with_images(ids: &[&str]) -> Self {
        let fetcher = Self::new();
        for id in ids {
            fetcher.set_chunks(&image_url_for(id), vec![format!("jpeg:{}", id).into_bytes()]);
        }
        fetcher
    }

    pub fn set_chunks(&self, url: &str, chunks: Vec<Vec<u8>>) {
        self.responses
            .lock()
            .unwrap()
            .insert(url.to_string(), ImageResponse::Chunks(chunks));
    }

    /// Yields `chunks` and then fails mid-body.
    pub fn set_interrupted(&self, url: &str, chunks: Vec<Vec<u8>>) {
        self.responses
            .lock()
            .unwrap()
            .insert(url.to_string(), ImageResponse::Interrupted(chunks));
    }

    pub fn set_status(&self, url: &str, status: u16) {
        self.responses
            .lock()
            .unwrap()
            .insert(url.to_string(), ImageResponse::Status(status));
    }

    pub fn fetched(&self) -> Vec<String> {
        self.fetched.lock().unwrap().clone()
    }
}

#[async_trait]
impl ImageFetcher for StaticImageFetcher {
    async fn fetch(&self, url: &str) -> Result<ImageStream> {
        self.fetched.lock().unwrap().push(url.to_string());
        let response = self
            .responses
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .unwrap_or(ImageResponse::Status(404));

        match response {
            ImageResponse::Chunks(chunks) => {
                Ok(stream::iter(chunks.into_iter().map(Ok::<Vec<u8>, FeedError>)).boxed())
            }
            ImageResponse::Interrupted(chunks) => {
                let failure = FeedError::NetworkError("connection reset mid-body".to_string());
                let items = chunks
                    .into_iter()
                    .map(Ok::<Vec<u8>, FeedError>)
                    .chain(std::iter::once(Err(failure)));
                Ok(stream::iter(items).boxed())
            }
            ImageResponse::Status(status) => Err(FeedError::StatusError {
                status,
                url: url.to_string(),
            }),
        }
    }
}

/// Artifacts kept in memory, with a log of every save and delete call.
#[derive(Default)]
pub struct MemoryImageStore {
    artifacts: Mutex<HashMap<String, Vec<u8>>>,
    saved: Mutex<Vec<String>>,
    deleted: Mutex<Vec<String>>,
}

impl MemoryImageStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, id: &str, bytes: &[u8]) {
        self.artifacts
            .lock()
            .unwrap()
            .insert(id.to_string(), bytes.to_vec());
    }

    pub fn contains(&self, id: &str) -> bool {
        self.artifacts.lock().unwrap().contains_key(id)
    }

    pub fn saved(&self) -> Vec<String> {
        self.saved.lock().unwrap().clone()
    }

    pub fn deleted(&self) -> Vec<String> {
        self.deleted.lock().unwrap().clone()
    }

    pub fn stored_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.artifacts.lock().unwrap().keys().cloned().collect();
        ids.sort();
        ids
    }
}

#[async_trait]
impl ImageStore for MemoryImageStore {
    async fn save(&self, post: &Post, bytes: &[u8]) -> Result<()> {
        self.saved.lock().unwrap().push(post.id.clone());
        self.insert(&post.id, bytes);
        Ok(())
    }

    async fn delete(&self, post: &Post) -> Result<()> {
        self.deleted.lock().unwrap().push(post.id.clone());
        self.artifacts.lock().unwrap().remove(&post.id);
        Ok(())
    }

    async fn read(&self, id: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.artifacts.lock().unwrap().get(id).cloned())
    }
}
