//! Decoding of raw timeline pages into [`Post`] records.
//!
//! The upstream format is not contractually stable, so a malformed entry is
//! skipped rather than failing the page. Only a page without an `items`
//! array is rejected.

use super::Post;
use crate::error::FeedError;
use log::debug;
use serde::Deserialize;
use serde_json::Value;

/// Keys that mark sponsored or injected entries.
const AD_MARKERS: &[&str] = &["ad_action", "injected"];

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DecodedPage {
    pub posts: Vec<Post>,
    pub ads: usize,
    pub skipped: usize,
}

#[derive(Debug, Deserialize)]
struct RawFeedPage {
    items: Vec<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawId {
    Text(String),
    Number(i64),
}

#[derive(Debug, Deserialize)]
struct RawUser {
    username: String,
    full_name: String,
}

#[derive(Debug, Deserialize)]
struct RawCaption {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawCandidate {
    url: String,
}

#[derive(Debug, Deserialize)]
struct RawImageVersions {
    candidates: Vec<RawCandidate>,
}

#[derive(Debug, Deserialize)]
struct RawFeedItem {
    id: RawId,
    user: RawUser,
    // Required and must be an object: a null caption fails deserialization.
    caption: RawCaption,
    image_versions2: RawImageVersions,
    taken_at: i64,
}

pub fn is_ad(item: &Value) -> bool {
    item.as_object()
        .map(|obj| AD_MARKERS.iter().any(|key| obj.contains_key(*key)))
        .unwrap_or(false)
}

/// Maps one raw entry to a post. `None` for ads and for entries missing a
/// required field.
pub fn decode_feed_item(item: &Value) -> Option<Post> {
    if is_ad(item) {
        return None;
    }
    let raw = RawFeedItem::deserialize(item).ok()?;
    let image_url = raw.image_versions2.candidates.into_iter().next()?.url;
    let id = match raw.id {
        RawId::Text(id) => id,
        RawId::Number(id) => id.to_string(),
    };
    Some(Post {
        id,
        username: raw.user.username,
        full_name: raw.user.full_name,
        caption: raw.caption.text.unwrap_or_default(),
        image_url,
        taken_at: raw.taken_at,
    })
}

/// Decodes a full page, keeping feed order.
pub fn decode_feed_page(page: &Value) -> Result<DecodedPage, FeedError> {
    let raw = RawFeedPage::deserialize(page)
        .map_err(|e| FeedError::DecodeError(format!("feed page has no usable items array: {}", e)))?;

    let mut decoded = DecodedPage::default();
    for item in &raw.items {
        if is_ad(item) {
            decoded.ads += 1;
            continue;
        }
        match decode_feed_item(item) {
            Some(post) => decoded.posts.push(post),
            None => {
                decoded.skipped += 1;
                debug!(
                    "Skipping malformed feed entry {}",
                    item.get("id").map(|v| v.to_string()).unwrap_or_else(|| "<no id>".to_string())
                );
            }
        }
    }
    Ok(decoded)
}
