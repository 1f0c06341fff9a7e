// src/feed/client.rs
//! HTTP collaborators: the feed page client and the image fetcher.
//!
//! Authentication (login, two-factor) happens outside this crate; the
//! operator hands over an already-authenticated session cookie.

use crate::config::Config;
use crate::error::{FeedError, Result};
use crate::utils::log_timed_request;
use async_trait::async_trait;
use futures::stream::{BoxStream, StreamExt};
use log::{debug, warn};
use reqwest::header::{HeaderMap, HeaderValue, COOKIE, REFERER, USER_AGENT};
use serde_json::Value;
use std::time::Duration;

/// Chunks of an image body as they arrive.
pub type ImageStream = BoxStream<'static, Result<Vec<u8>>>;

/// Fetches one raw page of the remote feed.
#[async_trait]
pub trait FeedClient: Send + Sync {
    async fn fetch_page(&self) -> Result<Value>;
}

/// Opens a chunked download of an image.
#[async_trait]
pub trait ImageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<ImageStream>;
}

/// Opaque authenticated handle: a client preloaded with the headers and
/// cookie the feed API expects.
#[derive(Clone)]
pub struct AuthSession {
    client: reqwest::Client,
}

impl std::fmt::Debug for AuthSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthSession").field("client", &"<reqwest::Client>").finish()
    }
}

impl AuthSession {
    pub fn new(
        user_agent: &str,
        referer: &str,
        session_cookie: Option<&str>,
        timeout: Duration,
    ) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, header_value("user agent", user_agent)?);
        headers.insert(REFERER, header_value("referer", referer)?);
        if let Some(cookie) = session_cookie {
            let mut value = header_value("session cookie", cookie)?;
            value.set_sensitive(true);
            headers.insert(COOKIE, value);
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| FeedError::ConfigError(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { client })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(
            &config.user_agent,
            &config.referer,
            config.session_cookie.as_deref(),
            config.http_timeout(),
        )
    }

    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }
}

fn header_value(label: &str, raw: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(raw)
        .map_err(|e| FeedError::ConfigError(format!("Invalid {} header: {}", label, e)))
}

/// reqwest-backed implementation of both collaborators.
#[derive(Debug, Clone)]
pub struct HttpFeedClient {
    session: AuthSession,
    feed_url: String,
}

impl HttpFeedClient {
    pub fn new(session: AuthSession, feed_url: impl Into<String>) -> Self {
        Self {
            session,
            feed_url: feed_url.into(),
        }
    }
}

#[async_trait]
impl FeedClient for HttpFeedClient {
    async fn fetch_page(&self) -> Result<Value> {
        let response = log_timed_request(
            "Feed page request",
            self.session.client().get(&self.feed_url).send(),
        )
        .await
        .map_err(|e| FeedError::NetworkError(format!("GET {} failed: {}", self.feed_url, e)))?;

        let status = response.status();
        if !status.is_success() {
            warn!("Got {} when fetching the feed", status);
            return Err(FeedError::StatusError {
                status: status.as_u16(),
                url: self.feed_url.clone(),
            });
        }

        let page = response
            .json::<Value>()
            .await
            .map_err(|e| FeedError::DecodeError(format!("feed body is not JSON: {}", e)))?;
        Ok(page)
    }
}

#[async_trait]
impl ImageFetcher for HttpFeedClient {
    async fn fetch(&self, url: &str) -> Result<ImageStream> {
        let response = self
            .session
            .client()
            .get(url)
            .send()
            .await
            .map_err(|e| FeedError::NetworkError(format!("GET {} failed: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FeedError::StatusError {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        debug!("Streaming image from {} ({:?} bytes)", url, response.content_length());

        let stream = response
            .bytes_stream()
            .map(|chunk| {
                chunk
                    .map(|bytes| bytes.to_vec())
                    .map_err(|e| FeedError::NetworkError(format!("image body interrupted: {}", e)))
            })
            .boxed();
        Ok(stream)
    }
}
