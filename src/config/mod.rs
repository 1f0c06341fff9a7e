pub mod settings;

pub use settings::Config;

use crate::error::FeedError;
use std::path::Path;
use std::sync::Arc;

/// Loads and returns the application configuration as an `Arc<Config>`.
///
/// A `.env` file is read first when present: the given path if any, otherwise
/// `.env` in the working directory. Variables already set in the process
/// environment win over the file.
pub fn load_config(env_file: Option<&Path>) -> Result<Arc<Config>, FeedError> {
    match env_file {
        Some(path) => {
            dotenv::from_path(path).map_err(|e| {
                FeedError::ConfigError(format!("Failed to read env file {}: {}", path.display(), e))
            })?;
        }
        None => {
            dotenv::dotenv().ok(); // Load .env file if present, ignore errors
        }
    }

    let config = Config::from_env();
    config.validate()?;

    Ok(Arc::new(config))
}
