//! Static export of Markdown files to self-contained HTML pages.
//!
//! The exporter renders through the same [`RenderCache`] and [`PageShell`] as
//! the preview server, so an exported page looks like its preview minus the
//! live reload client. CSS and the theme script are inlined; the diagram and
//! math libraries stay linked from their CDN.

mod links;
mod manifest;
mod minify;

pub use links::rewrite_markdown_links;
pub use manifest::{ExportManifest, ManifestEntry};
pub use minify::minify_html;

use markd_core::shell::page_title;
use markd_core::{
    AssetMode, PageShell, RenderCache, RenderError, RenderOptions, Renderer, SourceDocument,
};
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("source {path:?} does not exist")]
    SourceMissing {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("{0:?} is not a Markdown file")]
    NotMarkdown(PathBuf),
    #[error("failed to read {path:?}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to render {path:?}")]
    Render { path: PathBuf, source: RenderError },
    #[error("failed to write {path:?}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// A file that could not be exported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportFailure {
    pub source: PathBuf,
    pub reason: String,
}

/// Outcome of one export run.
#[derive(Debug, Default)]
pub struct ExportSummary {
    /// Pages written, in manifest order.
    pub written: Vec<PathBuf>,
    pub failures: Vec<ExportFailure>,
}

impl ExportSummary {
    pub fn succeeded(&self) -> usize {
        self.written.len()
    }

    pub fn failed(&self) -> usize {
        self.failures.len()
    }

    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Renders an [`ExportManifest`] to disk.
pub struct Exporter {
    cache: RenderCache,
    render_options: RenderOptions,
}

impl Exporter {
    pub fn new(render_options: RenderOptions) -> Self {
        Self {
            cache: RenderCache::default(),
            render_options,
        }
    }

    pub fn with_renderer(renderer: Arc<dyn Renderer>, render_options: RenderOptions) -> Self {
        Self {
            cache: RenderCache::with_renderer(renderer),
            render_options,
        }
    }

    /// Builds the manifest for `source` and exports it into `output`.
    ///
    /// Only an unusable `source` is an error, per-file failures end up in the
    /// summary.
    pub fn export(
        &self,
        source: &Path,
        output: &Path,
        minify: bool,
    ) -> Result<ExportSummary, ExportError> {
        let manifest = ExportManifest::build(source, output, self.render_options.theme, minify)?;
        Ok(self.run(&manifest))
    }

    /// Exports every entry in parallel; one failing file never stops the others.
    pub fn run(&self, manifest: &ExportManifest) -> ExportSummary {
        let results: Vec<_> = manifest
            .entries()
            .par_iter()
            .map(|entry| (entry, self.export_entry(entry)))
            .collect();

        let mut summary = ExportSummary::default();
        for (entry, result) in results {
            match result {
                Ok(()) => summary.written.push(entry.output.clone()),
                Err(err) => {
                    let reason = error_chain(&err);
                    tracing::error!(source = %entry.source.display(), %reason, "Export failed");
                    summary.failures.push(ExportFailure {
                        source: entry.source.clone(),
                        reason,
                    });
                }
            }
        }

        tracing::info!(
            succeeded = summary.succeeded(),
            failed = summary.failed(),
            "Export finished"
        );

        summary
    }

    fn export_entry(&self, entry: &ManifestEntry) -> Result<(), ExportError> {
        let document =
            SourceDocument::load(&entry.source).map_err(|source| ExportError::Read {
                path: entry.source.clone(),
                source,
            })?;

        let rendered = self
            .cache
            .render_document(&document, &self.render_options)
            .map_err(|source| ExportError::Render {
                path: entry.source.clone(),
                source,
            })?;

        let body = rewrite_markdown_links(rendered.html());
        let title = page_title(rendered.toc(), &entry.source);
        let page = PageShell {
            title: &title,
            body_html: &body,
            toc: rendered.toc(),
            theme: entry.theme,
            live_reload: false,
            diagrams: self.render_options.diagrams_enabled,
            math: self.render_options.math_enabled,
            assets: AssetMode::Inline,
        }
        .render();

        let page = if entry.minify {
            minify_html(&page)
        } else {
            page
        };

        let write_error = |source| ExportError::Write {
            path: entry.output.clone(),
            source,
        };
        if let Some(parent) = entry.output.parent() {
            std::fs::create_dir_all(parent).map_err(write_error)?;
        }
        std::fs::write(&entry.output, page).map_err(write_error)?;

        tracing::debug!(
            source = %entry.source.display(),
            output = %entry.output.display(),
            "Exported page"
        );

        Ok(())
    }
}

/// `err` and its sources, joined by `: `.
fn error_chain(err: &dyn std::error::Error) -> String {
    let mut reason = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        reason.push_str(": ");
        reason.push_str(&cause.to_string());
        source = cause.source();
    }
    reason
}
