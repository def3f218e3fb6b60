//! JSON and raw-source endpoints.

use crate::error::ServerError;
use crate::listing::{file_tree, TreeNode};
use crate::state::{AppState, ServeTarget};
use axum::extract::{Path as UrlPath, State};
use axum::http::{header, HeaderValue};
use axum::response::{IntoResponse, Response};
use axum::Json;
use markd_core::path_guard::url_path;
use markd_core::{is_markdown, resolve, SourceDocument};
use serde::Serialize;
use std::path::PathBuf;
use std::time::UNIX_EPOCH;

pub async fn files(State(state): State<AppState>) -> Result<Json<TreeNode>, ServerError> {
    if *state.target() != ServeTarget::Directory {
        return Err(ServerError::NotFound("/api/files".into()));
    }

    let root = state.root().to_path_buf();
    let tree = tokio::task::spawn_blocking(move || file_tree(&root)).await?;
    Ok(Json(tree))
}

#[derive(Debug, Serialize)]
pub struct FileInfo {
    pub path: String,
    pub name: String,
    pub size: u64,
    /// Seconds since the Unix epoch.
    pub modified: Option<u64>,
    pub content_hash: String,
    pub is_markdown: bool,
}

pub async fn file_info(
    State(state): State<AppState>,
    UrlPath(requested): UrlPath<String>,
) -> Result<Json<FileInfo>, ServerError> {
    let path = resolve(state.root(), &requested)?;
    if !path.is_file() {
        return Err(ServerError::BadRequest("not a file"));
    }

    let document = tokio::task::spawn_blocking(move || SourceDocument::load(path))
        .await?
        .map_err(|_| ServerError::NotFound(requested))?;
    let path = document.path();

    Ok(Json(FileInfo {
        path: url_path(state.root(), path).unwrap_or_default(),
        name: path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default(),
        size: document.len() as u64,
        modified: document
            .modified()
            .and_then(|time| time.duration_since(UNIX_EPOCH).ok())
            .map(|elapsed| elapsed.as_secs()),
        content_hash: document.fingerprint().to_hex(),
        is_markdown: is_markdown(path),
    }))
}

/// Raw source of the served document in single-file mode.
pub async fn raw_entry(State(state): State<AppState>) -> Result<Response, ServerError> {
    match state.target() {
        ServeTarget::File(file) => raw_markdown(file.clone()).await,
        ServeTarget::Directory => Err(ServerError::BadRequest("no file specified")),
    }
}

pub async fn raw(
    State(state): State<AppState>,
    UrlPath(requested): UrlPath<String>,
) -> Result<Response, ServerError> {
    let path = resolve(state.root(), &requested)?;
    raw_markdown(path).await
}

async fn raw_markdown(path: PathBuf) -> Result<Response, ServerError> {
    if !path.is_file() || !is_markdown(&path) {
        return Err(ServerError::BadRequest("not a Markdown file"));
    }

    let content = tokio::fs::read(&path)
        .await
        .map_err(|_| ServerError::NotFound(path.display().to_string()))?;

    Ok((
        [(
            header::CONTENT_TYPE,
            HeaderValue::from_static("text/plain; charset=utf-8"),
        )],
        content,
    )
        .into_response())
}
