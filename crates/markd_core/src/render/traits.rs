//! The renderer seam.
//!
//! Everything above this module (the render cache, the preview server and the
//! exporter) only talks to a [`Renderer`], so the Markdown dialect can change
//! without touching the live-preview machinery.

use super::RenderOptions;
use crate::toc::TocEntry;
use serde::{Deserialize, Serialize};

/// Error type for rendering operations.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    /// The document exceeds the renderer's input limit.
    #[error("document is too large: {size} bytes (limit {limit} bytes)")]
    TooLarge { size: usize, limit: usize },

    /// Invalid UTF-8 encoding in content.
    #[error("Invalid UTF-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    /// General rendering error.
    #[error("Render error: {0}")]
    Other(String),
}

/// Output of a single render: the HTML fragment and its headings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rendered {
    pub html: String,
    pub toc: Vec<TocEntry>,
}

/// Converts Markdown text into an HTML fragment.
///
/// Implementations must be deterministic: identical input and options yield
/// identical output, which is what makes caching by fingerprint sound.
pub trait Renderer: Send + Sync {
    fn render(&self, markdown: &str, options: &RenderOptions) -> Result<Rendered, RenderError>;
}

impl<R: Renderer + ?Sized> Renderer for std::sync::Arc<R> {
    fn render(&self, markdown: &str, options: &RenderOptions) -> Result<Rendered, RenderError> {
        (**self).render(markdown, options)
    }
}
