//! Core library of the markd live preview.
//!
//! This crate holds everything that both the preview server and the static
//! exporter need: Markdown rendering, the fingerprint-keyed render cache,
//! debounced file watching and the reload broadcaster.
//!
//! # Modules
//!
//! - [`render`] - Markdown to HTML conversion behind the [`Renderer`] seam
//! - [`cache`] - Render cache keyed by path and content fingerprint
//! - [`watcher`] - Debounced file watching
//! - [`reload`] - Reload fan-out to connected clients
//! - [`path_guard`] - Request path resolution confined to the served root
//! - [`shell`] - The HTML page around a rendered fragment
//! - [`assets`] - Embedded CSS and JavaScript

pub mod assets;
pub mod cache;
pub mod discover;
pub mod document;
pub mod html;
pub mod path_guard;
pub mod reload;
pub mod render;
pub mod shell;
pub mod shutdown;
pub mod theme;
pub mod toc;
pub mod watcher;

// Re-export commonly used types at crate root
pub use cache::{CacheStats, RenderCache, RenderCacheEntry};
pub use document::{is_markdown, Fingerprint, SourceDocument};
pub use path_guard::{resolve, PathError};
pub use reload::{Broadcaster, ReloadChannel, ReloadInstruction};
pub use render::{to_html, MarkdownRenderer, RenderError, RenderOptions, Rendered, Renderer};
pub use shell::{AssetMode, PageShell};
pub use shutdown::Shutdown;
pub use theme::Theme;
pub use toc::TocEntry;
pub use watcher::{FileWatcher, WatchError, WatchSignal, WatcherConfig};
