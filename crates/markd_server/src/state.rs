use markd_core::render::MarkdownRenderer;
use markd_core::{Broadcaster, RenderCache, RenderOptions, Renderer};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Keep-alive settings of the live reload socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WsConfig {
    /// How often the server pings an idle client.
    pub ping_interval: Duration,
    /// A client silent for this long is disconnected.
    pub idle_timeout: Duration,
}

impl Default for WsConfig {
    fn default() -> Self {
        Self {
            ping_interval: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(60),
        }
    }
}

/// What the server was started on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServeTarget {
    /// A single document; its directory is served for the images it links.
    File(PathBuf),
    Directory,
}

#[derive(Debug)]
struct Inner {
    root: PathBuf,
    target: ServeTarget,
    cache: RenderCache,
    broadcaster: Broadcaster,
    render_options: RenderOptions,
    live_reload: AtomicBool,
    ws: WsConfig,
}

/// Shared state of every request handler.
#[derive(Debug, Clone)]
pub struct AppState {
    inner: Arc<Inner>,
}

impl AppState {
    pub fn builder(path: impl Into<PathBuf>) -> AppStateBuilder {
        AppStateBuilder {
            path: path.into(),
            renderer: Arc::new(MarkdownRenderer),
            render_options: RenderOptions::default(),
            live_reload: true,
            ws: WsConfig::default(),
            broadcaster: Broadcaster::new(),
        }
    }

    /// Canonical directory all request paths are resolved against.
    pub fn root(&self) -> &Path {
        &self.inner.root
    }

    pub fn target(&self) -> &ServeTarget {
        &self.inner.target
    }

    pub fn cache(&self) -> &RenderCache {
        &self.inner.cache
    }

    pub fn broadcaster(&self) -> &Broadcaster {
        &self.inner.broadcaster
    }

    pub fn render_options(&self) -> &RenderOptions {
        &self.inner.render_options
    }

    pub fn live_reload(&self) -> bool {
        self.inner.live_reload.load(Ordering::Relaxed)
    }

    /// Pages stop including the reload client, used when watching failed.
    pub fn disable_live_reload(&self) {
        self.inner.live_reload.store(false, Ordering::Relaxed);
    }

    pub fn ws(&self) -> WsConfig {
        self.inner.ws
    }
}

pub struct AppStateBuilder {
    path: PathBuf,
    renderer: Arc<dyn Renderer>,
    render_options: RenderOptions,
    live_reload: bool,
    ws: WsConfig,
    broadcaster: Broadcaster,
}

impl AppStateBuilder {
    pub fn renderer(mut self, renderer: Arc<dyn Renderer>) -> Self {
        self.renderer = renderer;
        self
    }

    pub fn render_options(mut self, render_options: RenderOptions) -> Self {
        self.render_options = render_options;
        self
    }

    pub fn live_reload(mut self, live_reload: bool) -> Self {
        self.live_reload = live_reload;
        self
    }

    pub fn ws(mut self, ws: WsConfig) -> Self {
        self.ws = ws;
        self
    }

    pub fn broadcaster(mut self, broadcaster: Broadcaster) -> Self {
        self.broadcaster = broadcaster;
        self
    }

    /// Fails if the served path does not exist.
    pub fn build(self) -> std::io::Result<AppState> {
        let path = self.path.canonicalize()?;

        let (root, target) = if path.is_file() {
            let root = path
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| path.clone());
            (root, ServeTarget::File(path))
        } else {
            (path, ServeTarget::Directory)
        };

        Ok(AppState {
            inner: Arc::new(Inner {
                root,
                target,
                cache: RenderCache::with_renderer(self.renderer),
                broadcaster: self.broadcaster,
                render_options: self.render_options,
                live_reload: AtomicBool::new(self.live_reload),
                ws: self.ws,
            }),
        })
    }
}
