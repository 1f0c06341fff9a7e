use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum FeedError {
    /// Network/connectivity issues talking to the feed or image host
    #[error("Network Error: {0}")]
    NetworkError(String),

    /// Remote answered with something other than 2xx
    #[error("Unexpected status {status} from {url}")]
    StatusError { status: u16, url: String },

    /// Feed page could not be decoded as a whole
    #[error("Decode Error: {0}")]
    DecodeError(String),

    /// Image download failed for one post
    #[error("Image fetch failed for post {id}: {reason}")]
    ImageFetchError { id: String, reason: String },

    /// Post id cannot be used as an artifact key
    #[error("Invalid artifact key: {0:?}")]
    InvalidKey(String),

    /// Filesystem errors for images or the state file
    #[error("Storage Error: {0}")]
    StorageError(String),

    /// State file exists but cannot be trusted
    #[error("Persisted state at {} is corrupt: {reason}", path.display())]
    PersistCorrupt { path: PathBuf, reason: String },

    /// Configuration errors
    #[error("Config Error: {0}")]
    ConfigError(String),

    /// HTTP server failed to bind or serve
    #[error("Server Error: {0}")]
    ServerError(String),
}

impl From<serde_json::Error> for FeedError {
    fn from(err: serde_json::Error) -> Self {
        FeedError::DecodeError(format!("JSON serialization/deserialization error: {}", err))
    }
}

impl From<reqwest::Error> for FeedError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) => FeedError::StatusError {
                status: status.as_u16(),
                url: err.url().map(|u| u.to_string()).unwrap_or_default(),
            },
            None => FeedError::NetworkError(err.to_string()),
        }
    }
}

impl From<std::io::Error> for FeedError {
    fn from(err: std::io::Error) -> Self {
        FeedError::StorageError(err.to_string())
    }
}

impl FeedError {
    /// Whether the next refresh cycle can be expected to clear the error
    pub fn is_recoverable(&self) -> bool {
        match self {
            FeedError::NetworkError(_) => true,
            FeedError::StatusError { status, .. } => *status >= 500 || *status == 429,
            FeedError::DecodeError(_) => true, // upstream format is not contractually stable
            FeedError::ImageFetchError { .. } => true,
            FeedError::InvalidKey(_) => false,
            FeedError::StorageError(_) => true,
            FeedError::PersistCorrupt { .. } => false,
            FeedError::ConfigError(_) => false,
            FeedError::ServerError(_) => false,
        }
    }

    /// Categorizes error for logging
    pub fn categorize(&self) -> ErrorCategory {
        match self {
            FeedError::NetworkError(_) | FeedError::StatusError { .. } => ErrorCategory::Network,
            FeedError::DecodeError(_) => ErrorCategory::Data,
            FeedError::ImageFetchError { .. } => ErrorCategory::Network,
            FeedError::InvalidKey(_) => ErrorCategory::Data,
            FeedError::StorageError(_) => ErrorCategory::Storage,
            FeedError::PersistCorrupt { .. } => ErrorCategory::Critical,
            FeedError::ConfigError(_) => ErrorCategory::Configuration,
            FeedError::ServerError(_) => ErrorCategory::Critical,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Network,
    Data,
    Storage,
    Configuration,
    Critical,
}

pub type Result<T> = std::result::Result<T, FeedError>;
