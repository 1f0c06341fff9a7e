// src/utils/mod.rs
use log::{info, LevelFilter};
use std::future::Future;
use std::time::Instant;

/// Parses a level name such as "debug" or "WARN"; unknown names fall back to `Info`.
pub fn parse_level(level: &str) -> LevelFilter {
    level.trim().parse().unwrap_or(LevelFilter::Info)
}

pub fn setup_logging(level: LevelFilter) -> Result<(), fern::InitError> {
    fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "[{}][{}][{}] {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.level(),
                record.target(),
                message
            ))
        })
        .level(level)
        .level_for("hyper", LevelFilter::Warn)
        .level_for("reqwest", LevelFilter::Warn)
        .level_for("rustls", LevelFilter::Warn)
        .chain(std::io::stdout())
        .apply()?;
    info!("Logging initialized at level {}.", level);
    Ok(())
}

/// Logs how long an HTTP request took.
pub async fn log_timed_request<T>(label: &str, f: impl Future<Output = T>) -> T {
    let start = Instant::now();
    let result = f.await;
    log::debug!("{} completed in {} ms", label, start.elapsed().as_millis());
    result
}
