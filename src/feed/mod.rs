// src/feed/mod.rs
//! Feed domain: the `Post` record, the bounded history window, the page
//! decoder and the HTTP collaborators that fetch pages and images.

pub mod client;
pub mod decode;
pub mod history;

pub use client::{AuthSession, FeedClient, HttpFeedClient, ImageFetcher, ImageStream};
pub use decode::{decode_feed_item, decode_feed_page, DecodedPage};
pub use history::BoundedHistory;

use serde::{Deserialize, Serialize};

/// One feed entry. Identity is `id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub id: String,
    pub username: String,
    pub full_name: String,
    pub caption: String,
    /// Remote source of the image; only needed until the artifact is cached.
    pub image_url: String,
    /// Unix timestamp in seconds.
    pub taken_at: i64,
}

/// Public shape of a post served to readers, without the remote image url.
#[derive(Debug, Clone, Serialize)]
pub struct PostView<'a> {
    pub id: &'a str,
    pub username: &'a str,
    pub full_name: &'a str,
    pub caption: &'a str,
    pub taken_at: i64,
}

impl<'a> From<&'a Post> for PostView<'a> {
    fn from(post: &'a Post) -> Self {
        Self {
            id: &post.id,
            username: &post.username,
            full_name: &post.full_name,
            caption: &post.caption,
            taken_at: post.taken_at,
        }
    }
}
