//! HTTP routes.
//!
//! ```text
//! GET /                       status and file count
//! GET /api/files              listing
//! GET /api/files/{*name}      file body, honouring Range
//! ```

use std::sync::Arc;

use axum::extract::rejection::{PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Deserializer, Serialize};
use tower_http::trace::TraceLayer;
use tracing::{debug, info};

use crate::config::{ServerConfig, APP_VERSION};
use crate::error::Error;
use crate::listing::{list_files, FileEntry};
use crate::range::parse_range;
use crate::resolve::FileResolver;
use crate::response::{self, Disposition};

#[derive(Clone)]
pub struct AppState {
    config: Arc<ServerConfig>,
    resolver: Arc<FileResolver>,
}

impl AppState {
    /// Prepare the media root (creating it if needed) for serving.
    pub fn new(config: ServerConfig) -> Result<Self, Error> {
        let resolver = FileResolver::new(&config.root)?;
        Ok(AppState {
            config: Arc::new(config),
            resolver: Arc::new(resolver),
        })
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn resolver(&self) -> &FileResolver {
        &self.resolver
    }

    async fn list(&self) -> Result<Vec<FileEntry>, Error> {
        let root = self.resolver.root().to_path_buf();
        let recursive = self.config.recursive_listing;
        let files = tokio::task::spawn_blocking(move || list_files(&root, recursive))
            .await
            .map_err(std::io::Error::other)??;
        Ok(files)
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(status))
        .route("/api/files", get(files))
        .route("/api/files/{*name}", get(file))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind the configured address and serve until Ctrl-C.
pub async fn serve(config: ServerConfig) -> Result<(), Error> {
    let addr = config.bind_addr();
    let state = AppState::new(config)?;

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(
        addr = %listener.local_addr()?,
        root = %state.resolver().root().display(),
        version = APP_VERSION,
        "serving media"
    );

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "cannot listen for ctrl-c, shutting down");
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub message: String,
    pub title: String,
    pub version: String,
    pub files_count: usize,
}

async fn status(State(state): State<AppState>) -> Result<Json<StatusResponse>, Error> {
    let files = state.list().await?;
    Ok(Json(StatusResponse {
        message: format!("{} is running", state.config.title),
        title: state.config.title.clone(),
        version: APP_VERSION.to_string(),
        files_count: files.len(),
    }))
}

async fn files(State(state): State<AppState>) -> Result<Json<Vec<FileEntry>>, Error> {
    Ok(Json(state.list().await?))
}

#[derive(Debug, Default, Deserialize)]
struct FileQuery {
    #[serde(default, deserialize_with = "flag")]
    download: bool,
}

/// Query string booleans as browsers and scripts write them: `true`, `1`,
/// `yes`, `on` and their negations, in any case.
fn flag<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    let value = String::deserialize(deserializer)?;
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "y" | "on" | "t" => Ok(true),
        "false" | "0" | "no" | "n" | "off" | "f" | "" => Ok(false),
        _ => Err(serde::de::Error::custom(format!("expected a boolean, got {value:?}"))),
    }
}

async fn file(
    State(state): State<AppState>,
    name: Result<Path<String>, PathRejection>,
    query: Result<Query<FileQuery>, QueryRejection>,
    headers: HeaderMap,
) -> Result<Response, Error> {
    let Path(name) = name.map_err(|rejection| Error::BadRequest(rejection.body_text()))?;
    let Query(query) = query.map_err(|rejection| Error::BadRequest(rejection.body_text()))?;

    let file = state.resolver.resolve(&name).await?;

    // a Range header that is not even visible ASCII cannot be a valid range
    let range_header = headers.get(header::RANGE).map(|value| value.to_str().unwrap_or(""));
    let range = parse_range(range_header, file.size);
    debug!(name = %name, size = file.size, header = ?range_header, ?range, "range decision");

    let media_type = response::media_type(&file.name);
    let disposition = Disposition::from_download(query.download);
    let descriptor = response::build(&file, range, &media_type, disposition);

    Ok(descriptor.open().await?.into_response())
}

#[cfg(test)]
mod tests {
    use axum::extract::Query;
    use axum::http::Uri;

    use super::FileQuery;

    fn download(query: &str) -> Option<bool> {
        let uri: Uri = format!("/api/files/a.mp4?{query}").parse().unwrap();
        Query::<FileQuery>::try_from_uri(&uri).ok().map(|Query(q)| q.download)
    }

    #[test]
    fn test_download_flag() {
        assert_eq!(Some(false), download(""));
        assert_eq!(Some(true), download("download=true"));
        assert_eq!(Some(true), download("download=1"));
        assert_eq!(Some(true), download("download=YES"));
        assert_eq!(Some(true), download("download=on"));
        assert_eq!(Some(false), download("download=false"));
        assert_eq!(Some(false), download("download=0"));
        assert_eq!(Some(false), download("download=off"));
        assert_eq!(Some(false), download("download="));
        assert_eq!(None, download("download=maybe"));
    }
}
