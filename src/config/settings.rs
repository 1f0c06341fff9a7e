use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::FeedError;

pub const DEFAULT_FEED_URL: &str = "https://i.instagram.com/api/v1/feed/timeline/";
pub const DEFAULT_USER_AGENT: &str = "Instagram 10.3.2 (iPhone7,2; iPhone OS 9_3_3; en_US; en-US; scale=2.00; 750x1334) AppleWebKit/420+";
pub const DEFAULT_REFERER: &str = "https://www.instagram.com/";
pub const DEFAULT_CAPACITY: usize = 25;
pub const DEFAULT_REFRESH_INTERVAL_SECS: u64 = 120;
/// Upper bound for `HISTORY_CAPACITY`; every post in the window keeps an image on disk.
pub const MAX_HISTORY_CAPACITY: usize = 10_000;

#[derive(Clone)]
pub struct Config {
    pub feed_url: String,
    pub user_agent: String,
    pub referer: String,
    pub session_cookie: Option<String>,
    pub history_capacity: usize,
    pub refresh_interval_secs: u64,
    pub http_timeout_secs: u64,
    pub image_dir: PathBuf,
    pub state_path: PathBuf,
    pub static_dir: PathBuf,
    pub bind_addr: String,
    pub log_level: String,
}

// Session cookie is a credential; keep it out of the startup log.
impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("feed_url", &self.feed_url)
            .field("user_agent", &self.user_agent)
            .field("referer", &self.referer)
            .field("session_cookie", &self.session_cookie.as_ref().map(|_| "<redacted>"))
            .field("history_capacity", &self.history_capacity)
            .field("refresh_interval_secs", &self.refresh_interval_secs)
            .field("http_timeout_secs", &self.http_timeout_secs)
            .field("image_dir", &self.image_dir)
            .field("state_path", &self.state_path)
            .field("static_dir", &self.static_dir)
            .field("bind_addr", &self.bind_addr)
            .field("log_level", &self.log_level)
            .finish()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds a config from any key lookup, falling back to defaults for
    /// missing or unparsable values.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Config {
            feed_url: lookup("FEED_URL").unwrap_or_else(|| DEFAULT_FEED_URL.to_string()),
            user_agent: lookup("FEED_USER_AGENT").unwrap_or_else(|| DEFAULT_USER_AGENT.to_string()),
            referer: lookup("FEED_REFERER").unwrap_or_else(|| DEFAULT_REFERER.to_string()),
            session_cookie: lookup("FEED_SESSION_COOKIE").filter(|s| !s.trim().is_empty()),
            history_capacity: lookup("HISTORY_CAPACITY")
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_CAPACITY),
            refresh_interval_secs: lookup("REFRESH_INTERVAL_SECS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_REFRESH_INTERVAL_SECS),
            http_timeout_secs: lookup("HTTP_TIMEOUT_SECS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(30),
            image_dir: lookup("IMAGE_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("images")),
            state_path: lookup("STATE_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("feed_state.json")),
            static_dir: lookup("STATIC_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("static")),
            bind_addr: lookup("BIND_ADDR").unwrap_or_else(|| "0.0.0.0:8080".to_string()),
            log_level: lookup("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
        }
    }

    pub fn validate(&self) -> Result<(), FeedError> {
        url::Url::parse(&self.feed_url)
            .map_err(|e| FeedError::ConfigError(format!("FEED_URL {:?} is invalid: {}", self.feed_url, e)))?;
        if self.refresh_interval_secs == 0 {
            return Err(FeedError::ConfigError(
                "REFRESH_INTERVAL_SECS must be greater than zero".to_string(),
            ));
        }
        if self.history_capacity > MAX_HISTORY_CAPACITY {
            return Err(FeedError::ConfigError(format!(
                "HISTORY_CAPACITY {} exceeds the maximum of {}",
                self.history_capacity, MAX_HISTORY_CAPACITY
            )));
        }
        if self.http_timeout_secs == 0 {
            return Err(FeedError::ConfigError(
                "HTTP_TIMEOUT_SECS must be greater than zero".to_string(),
            ));
        }
        self.socket_addr()?;
        Ok(())
    }

    pub fn validate_and_log(&self) {
        log::info!("Application Configuration Loaded: {:?}", self);
        if self.history_capacity == 0 {
            log::warn!("HISTORY_CAPACITY is 0; every new post will be evicted immediately.");
        }
        if self.session_cookie.is_none() {
            log::warn!("FEED_SESSION_COOKIE is not set; the feed API will likely reject requests.");
        }
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, FeedError> {
        self.bind_addr
            .parse()
            .map_err(|e| FeedError::ConfigError(format!("BIND_ADDR {:?} is invalid: {}", self.bind_addr, e)))
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}
