//! Durable storage: cached image artifacts and the persisted history window.

pub mod image_store;
pub mod restore;
pub mod state_file;

pub use image_store::{artifact_key, DiskImageStore, ImageStore};
pub use restore::{restore_history, RestoredHistory};
pub use state_file::StateFile;
