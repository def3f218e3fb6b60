//! Page, listing and asset handlers.

use crate::error::ServerError;
use crate::listing;
use crate::state::{AppState, ServeTarget};
use axum::extract::{Path as UrlPath, Query, State};
use axum::http::{header, HeaderValue, Uri};
use axum::response::{Html, IntoResponse, Response};
use axum_extra::TypedHeader;
use headers::Cookie;
use markd_core::shell::page_title;
use markd_core::{is_markdown, resolve, AssetMode, PageShell, SourceDocument, Theme};
use percent_encoding::percent_decode_str;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Name of the cookie the theme switcher writes.
pub const THEME_COOKIE: &str = "markd_theme";

pub const NO_CACHE: &str = "no-cache";
pub const IMMUTABLE: &str = "public, max-age=31536000, immutable";

/// Documents served for `/` in directory mode, in order of preference.
const INDEX_FILES: &[&str] = &["index.md", "README.md", "readme.md"];

#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    theme: Option<String>,
}

/// Theme of the page: `?theme=` first, then the cookie, then the default.
fn requested_theme(state: &AppState, query: &PageQuery, cookie: Option<&Cookie>) -> Theme {
    query
        .theme
        .as_deref()
        .and_then(|theme| theme.parse().ok())
        .or_else(|| {
            cookie
                .and_then(|cookie| cookie.get(THEME_COOKIE))
                .and_then(|theme| theme.parse().ok())
        })
        .unwrap_or(state.render_options().theme)
}

pub async fn index(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
    cookie: Option<TypedHeader<Cookie>>,
) -> Result<Response, ServerError> {
    let theme = requested_theme(&state, &query, cookie.as_ref().map(|c| &c.0));

    let path = match state.target() {
        ServeTarget::File(file) => file.clone(),
        ServeTarget::Directory => {
            let root = state.root();
            match INDEX_FILES
                .iter()
                .map(|name| root.join(name))
                .find(|path| path.is_file())
            {
                Some(index) => index,
                None => return listing_page(&state, root, theme),
            }
        }
    };

    markdown_page(&state, path, theme).await
}

/// Any path under the root: a document, a directory or another file.
pub async fn page(
    State(state): State<AppState>,
    uri: Uri,
    Query(query): Query<PageQuery>,
    cookie: Option<TypedHeader<Cookie>>,
) -> Result<Response, ServerError> {
    let requested = percent_decode_str(uri.path())
        .decode_utf8()
        .map_err(|_| ServerError::BadRequest("path is not valid UTF-8"))?;

    let theme = requested_theme(&state, &query, cookie.as_ref().map(|c| &c.0));
    let path = resolve(state.root(), &requested)?;

    if path.is_dir() {
        return listing_page(&state, &path, theme);
    }

    if is_markdown(&path) {
        markdown_page(&state, path, theme).await
    } else {
        raw_file(path).await
    }
}

pub async fn asset(UrlPath(name): UrlPath<String>) -> Result<Response, ServerError> {
    let asset = markd_core::assets::lookup(&name).ok_or(ServerError::NotFound(name))?;

    Ok((
        [
            (header::CONTENT_TYPE, HeaderValue::from_static(asset.content_type)),
            (header::CACHE_CONTROL, HeaderValue::from_static(IMMUTABLE)),
        ],
        asset.body,
    )
        .into_response())
}

/// Renders `path` through the cache and wraps it in the page shell.
async fn markdown_page(
    state: &AppState,
    path: PathBuf,
    theme: Theme,
) -> Result<Response, ServerError> {
    let entry = tokio::task::spawn_blocking({
        let state = state.clone();
        let path = path.clone();
        move || {
            let document = SourceDocument::load(&path).map_err(|err| {
                tracing::debug!(?err, path = ?path, "Failed to read document");
                ServerError::NotFound(path.display().to_string())
            })?;
            state
                .cache()
                .render_document(&document, state.render_options())
                .map_err(|source| ServerError::Render {
                    path: path.display().to_string(),
                    source,
                })
        }
    })
    .await??;

    let options = state.render_options();
    let title = page_title(entry.toc(), &path);
    let html = PageShell {
        title: &title,
        body_html: entry.html(),
        toc: entry.toc(),
        theme,
        live_reload: state.live_reload(),
        diagrams: options.diagrams_enabled,
        math: options.math_enabled,
        assets: AssetMode::Linked,
    }
    .render();

    Ok(with_no_cache(Html(html)))
}

fn listing_page(state: &AppState, dir: &Path, theme: Theme) -> Result<Response, ServerError> {
    let body = listing::directory_html(state.root(), dir).map_err(|err| {
        tracing::debug!(?err, dir = ?dir, "Failed to list directory");
        ServerError::NotFound(dir.display().to_string())
    })?;

    let title = markd_core::path_guard::url_path(state.root(), dir)
        .filter(|relative| !relative.is_empty())
        .map(|relative| format!("/{relative}"))
        .unwrap_or_else(|| String::from("/"));

    let html = PageShell {
        title: &title,
        body_html: &body,
        theme,
        live_reload: state.live_reload(),
        assets: AssetMode::Linked,
        ..Default::default()
    }
    .render();

    Ok(with_no_cache(Html(html)))
}

/// Any other file under the root, typically an image linked from a document.
async fn raw_file(path: PathBuf) -> Result<Response, ServerError> {
    let bytes = tokio::fs::read(&path)
        .await
        .map_err(|_| ServerError::NotFound(path.display().to_string()))?;

    let mime = mime_guess::from_path(&path).first_or_octet_stream();
    let content_type = HeaderValue::from_str(mime.as_ref())
        .map_err(|err| ServerError::Internal(err.to_string()))?;

    Ok((
        [
            (header::CONTENT_TYPE, content_type),
            (header::CACHE_CONTROL, HeaderValue::from_static(NO_CACHE)),
        ],
        bytes,
    )
        .into_response())
}

fn with_no_cache(response: impl IntoResponse) -> Response {
    let mut response = response.into_response();
    response
        .headers_mut()
        .insert(header::CACHE_CONTROL, HeaderValue::from_static(NO_CACHE));
    response
}
