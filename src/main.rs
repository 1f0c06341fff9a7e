// src/main.rs
use anyhow::Context;
use clap::{Parser, Subcommand};
use feed_mirror::{
    config::{self, Config},
    feed::{AuthSession, BoundedHistory, HttpFeedClient},
    storage::restore_history,
    utils::{parse_level, setup_logging},
    DiskImageStore, FeedServer, RefreshLoop, SnapshotView, StateFile,
};
use log::{error, info};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::oneshot;

#[derive(Debug, Parser)]
#[command(name = "feed-mirror", about = "Mirrors a rolling window of a social feed and serves it over HTTP")]
struct Cli {
    /// Env file to load instead of ./.env
    #[arg(long, global = true)]
    env_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Keep the window fresh and serve it (default)
    Serve,
    /// Run a single refresh cycle, persist and exit
    FetchOnce,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = config::load_config(cli.env_file.as_deref()).context("Failed to load configuration")?;
    setup_logging(parse_level(&config.log_level)).context("Failed to initialize logging")?;
    config.validate_and_log();

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config).await,
        Command::FetchOnce => fetch_once(config).await,
    }
}

async fn restore(config: &Config, state_file: &StateFile, store: &DiskImageStore) -> anyhow::Result<BoundedHistory> {
    let restored = restore_history(state_file, store, config.history_capacity)
        .await
        .with_context(|| format!("Refusing to start over persisted state at {}", state_file.path().display()))?;
    Ok(restored.history)
}

fn build_refresh_loop(config: &Config, history: BoundedHistory, view: Arc<SnapshotView>, store: Arc<DiskImageStore>, state_file: StateFile) -> anyhow::Result<RefreshLoop> {
    let session = AuthSession::from_config(config).context("Failed to build feed session")?;
    let client = Arc::new(HttpFeedClient::new(session, config.feed_url.clone()));
    Ok(RefreshLoop::new(
        history,
        client.clone(),
        client,
        store,
        state_file,
        view,
        config.refresh_interval(),
    ))
}

async fn serve(config: Arc<Config>) -> anyhow::Result<()> {
    let addr = config.socket_addr()?;
    let store = Arc::new(DiskImageStore::new(config.image_dir.clone()));
    let state_file = StateFile::new(config.state_path.clone(), config.history_capacity);

    // State must be in place before the first request is accepted.
    let history = restore(&config, &state_file, &store).await?;
    let view = Arc::new(SnapshotView::new(&history));
    info!("Serving {} posts restored from {}", view.len(), state_file.path().display());

    let refresh = build_refresh_loop(&config, history, view.clone(), store.clone(), state_file)?;
    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let refresh_handle = tokio::spawn(refresh.run(shutdown_rx));

    let server = FeedServer::new(addr, view, store).with_static_dir(config.static_dir.clone());
    let served = server
        .start(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for ctrl-c: {}", e);
                std::future::pending::<()>().await;
            }
            info!("Shutting down gracefully...");
        })
        .await;

    let _ = shutdown_tx.send(());
    match refresh_handle.await {
        Ok(history) => info!("Refresh loop stopped with {} posts persisted", history.len()),
        Err(e) => error!("Refresh loop task failed: {}", e),
    }

    served.context("Feed server failed")
}

async fn fetch_once(config: Arc<Config>) -> anyhow::Result<()> {
    let store = Arc::new(DiskImageStore::new(config.image_dir.clone()));
    let state_file = StateFile::new(config.state_path.clone(), config.history_capacity);

    let history = restore(&config, &state_file, &store).await?;
    let view = Arc::new(SnapshotView::new(&history));
    let mut refresh = build_refresh_loop(&config, history, view, store, state_file)?;

    info!("Fetching feed...");
    let report = refresh.run_cycle().await.context("Refresh cycle failed")?;
    info!("Done: {}", report.summary());
    if !report.persisted {
        anyhow::bail!("Fetched posts were not persisted to {}", config.state_path.display());
    }
    Ok(())
}
