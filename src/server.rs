// src/server.rs
//! HTTP surface over the snapshot view: the feed as JSON, cached images by
//! post id, a health endpoint and the static slideshow front-end.

use crate::error::FeedError;
use crate::feed::PostView;
use crate::snapshot::SnapshotView;
use crate::storage::ImageStore;
use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use log::{error, info, warn};
use serde_json::{json, Value};
use std::future::Future;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::services::ServeDir;

/// Shared handles injected into every handler.
#[derive(Clone)]
pub struct ServerState {
    pub view: Arc<SnapshotView>,
    pub images: Arc<dyn ImageStore>,
}

pub struct FeedServer {
    addr: SocketAddr,
    static_dir: Option<PathBuf>,
    state: ServerState,
}

impl FeedServer {
    pub fn new(addr: SocketAddr, view: Arc<SnapshotView>, images: Arc<dyn ImageStore>) -> Self {
        Self {
            addr,
            static_dir: None,
            state: ServerState { view, images },
        }
    }

    /// Serves files from `dir` for any path without a dedicated route.
    pub fn with_static_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.static_dir = Some(dir.into());
        self
    }

    pub fn router(&self) -> Router {
        let router = Router::new()
            .route("/", get(get_index))
            .route("/feed", get(get_feed))
            .route("/image/:image_id", get(get_image))
            .route("/health", get(health_check))
            .with_state(self.state.clone());

        match &self.static_dir {
            Some(dir) if dir.is_dir() => router.fallback_service(ServeDir::new(dir)),
            Some(dir) => {
                warn!("Static directory {} does not exist; not serving static files", dir.display());
                router
            }
            None => router,
        }
    }

    /// Binds and serves until `shutdown` resolves.
    pub async fn start<F>(self, shutdown: F) -> Result<(), FeedError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let app = self.router();
        let listener = tokio::net::TcpListener::bind(self.addr)
            .await
            .map_err(|e| FeedError::ServerError(format!("Failed to bind {}: {}", self.addr, e)))?;

        info!("Feed server listening on http://{}", self.addr);
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| FeedError::ServerError(e.to_string()))?;
        info!("Feed server stopped");
        Ok(())
    }
}

fn image_not_found(image_id: &str) -> Response {
    (
        StatusCode::NOT_FOUND,
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        format!("Image <{}> does not exist", image_id),
    )
        .into_response()
}

async fn get_index() -> Response {
    (StatusCode::FOUND, [(header::LOCATION, "/index.html")]).into_response()
}

/// Posts oldest to newest, without their remote image url.
async fn get_feed(State(state): State<ServerState>) -> Response {
    let snapshot = state.view.current();
    let posts: Vec<PostView<'_>> = snapshot.posts().iter().map(PostView::from).collect();
    Json(posts).into_response()
}

/// Existence is decided by the snapshot; bytes come from the image store.
async fn get_image(State(state): State<ServerState>, Path(image_id): Path<String>) -> Response {
    if !state.view.current().contains(&image_id) {
        return image_not_found(&image_id);
    }

    match state.images.read(&image_id).await {
        Ok(Some(bytes)) => ([(header::CONTENT_TYPE, "image/jpeg")], bytes).into_response(),
        Ok(None) => {
            warn!("Post {} is live but its image is missing", image_id);
            image_not_found(&image_id)
        }
        Err(e) => {
            error!("Failed to read image {}: {}", image_id, e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to read image").into_response()
        }
    }
}

async fn health_check(State(state): State<ServerState>) -> Json<Value> {
    let snapshot = state.view.current();
    Json(json!({
        "status": "healthy",
        "service": "feed-mirror",
        "posts": snapshot.len(),
        "capacity": snapshot.capacity(),
        "generation": snapshot.generation(),
        "published_at": snapshot.published_at().to_rfc3339(),
        "timestamp": chrono::Utc::now().timestamp()
    }))
}
