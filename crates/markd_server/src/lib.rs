//! The markd preview server.
//!
//! Serves rendered Markdown pages out of the shared render cache, the
//! embedded assets, a small JSON API and the `/__livereload` WebSocket that
//! pushes reload instructions whenever the watched sources change.

pub mod api;
mod dispatch;
pub mod error;
pub mod listing;
mod pages;
pub mod state;
mod ws;

pub use dispatch::spawn_reload_dispatcher;
pub use error::ServerError;
pub use pages::THEME_COOKIE;
pub use state::{AppState, AppStateBuilder, ServeTarget, WsConfig};

use axum::http::{header, HeaderName, HeaderValue};
use axum::routing::get;
use axum::Router;
use markd_core::{FileWatcher, Shutdown, WatcherConfig};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

/// Routes of the preview server.
///
/// Anything that is not an asset, the reload socket or the API is resolved
/// as a path under the served root.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(pages::index))
        .route("/assets/*name", get(pages::asset))
        .route("/__livereload", get(ws::live_reload))
        .route("/api/files", get(api::files))
        .route("/api/file/*path", get(api::file_info))
        .route("/api/raw", get(api::raw_entry))
        .route("/api/raw/*path", get(api::raw))
        .fallback(pages::page)
        .layer(security_header(
            header::X_CONTENT_TYPE_OPTIONS,
            "nosniff",
        ))
        .layer(security_header(header::X_FRAME_OPTIONS, "DENY"))
        .layer(security_header(header::REFERRER_POLICY, "no-referrer"))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn security_header(
    name: HeaderName,
    value: &'static str,
) -> SetResponseHeaderLayer<HeaderValue> {
    SetResponseHeaderLayer::overriding(name, HeaderValue::from_static(value))
}

#[derive(Debug, Clone, Default)]
pub struct ServeOptions {
    pub watcher: WatcherConfig,
    /// Open the preview in the default browser once listening.
    pub open_browser: bool,
}

/// Where a browser should point to reach `addr`.
pub fn browser_url(addr: SocketAddr) -> String {
    if addr.ip().is_unspecified() {
        format!("http://127.0.0.1:{}", addr.port())
    } else {
        format!("http://{addr}")
    }
}

/// Serves `state` on `listener` until `shutdown` triggers.
///
/// When live reload is enabled the served path is watched; if watching is
/// not possible the server keeps running without live reload.
pub async fn serve(
    listener: TcpListener,
    state: AppState,
    options: ServeOptions,
    shutdown: Shutdown,
) -> std::io::Result<()> {
    let addr = listener.local_addr()?;

    let dispatcher = if state.live_reload() {
        let watch_root = match state.target() {
            ServeTarget::File(file) => file.clone(),
            ServeTarget::Directory => state.root().to_path_buf(),
        };

        match FileWatcher::spawn(&watch_root, options.watcher, shutdown.clone()) {
            Ok(watcher) => Some(spawn_reload_dispatcher(
                watcher,
                state.clone(),
                shutdown.clone(),
            )),
            Err(err) => {
                tracing::warn!(
                    ?err,
                    "File watching is unavailable, live reload is disabled: refresh the browser manually"
                );
                state.disable_live_reload();
                None
            }
        }
    } else {
        None
    };

    let url = browser_url(addr);

    tracing::info!(
        %url,
        root = %state.root().display(),
        theme = %state.render_options().theme,
        live_reload = state.live_reload(),
        "Serving Markdown preview"
    );

    if options.open_browser {
        if let Err(err) = webbrowser::open(&url) {
            tracing::warn!(?err, %url, "Failed to open the browser");
        }
    }

    let broadcaster = state.broadcaster().clone();
    let app = router(state);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move {
        shutdown.wait().await;
        tracing::info!("Shutting down");
        broadcaster.shutdown();
    })
    .await?;

    if let Some(dispatcher) = dispatcher {
        let _ = dispatcher.await;
    }

    Ok(())
}
