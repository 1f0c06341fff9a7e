pub mod config;
pub mod error;
pub mod feed;
pub mod refresh;
pub mod server;
pub mod snapshot;
pub mod storage;
pub mod testing; // In-memory collaborators for tests
pub mod utils;

pub use error::{FeedError, Result};
pub use feed::{BoundedHistory, Post};
pub use refresh::{CycleReport, RefreshLoop};
pub use server::FeedServer;
pub use snapshot::{FeedSnapshot, SnapshotView};
pub use storage::{DiskImageStore, ImageStore, StateFile};
