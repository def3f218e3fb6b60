//! Markdown to HTML rendering with GitHub-style features.
//!
//! This module provides markdown-to-HTML conversion with support for:
//! - GitHub Flavored Markdown (tables, strikethrough, task lists, footnotes)
//! - Heading IDs and permalink anchors, collected into a table of contents
//! - Mermaid diagrams from ` ```mermaid ` fences
//! - External links opened in a new tab

mod traits;

pub use traits::{RenderError, Rendered, Renderer};

use crate::html::escape_html;
use crate::theme::Theme;
use crate::toc::{SlugRegistry, TocEntry};
use pulldown_cmark::{CodeBlockKind, CowStr, Event, Options, Parser, Tag, TagEnd};

/// Documents larger than this are refused instead of rendered.
pub const MAX_DOCUMENT_BYTES: usize = 10 * 1024 * 1024;

/// Options for rendering markdown to HTML.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RenderOptions {
    /// Page theme, consumed by the page shell
    pub theme: Theme,
    /// Collect a table of contents
    pub toc: bool,
    /// Deepest heading level listed in the table of contents
    pub toc_depth: u8,
    /// Turn ```mermaid fences into diagram containers
    pub diagrams_enabled: bool,
    /// Load the math typesetting scripts in the page shell
    pub math_enabled: bool,
    /// Enable GitHub Flavored Markdown tables
    pub enable_tables: bool,
    /// Enable strikethrough syntax (~~text~~)
    pub enable_strikethrough: bool,
    /// Enable task list items ([x] and [ ])
    pub enable_tasklists: bool,
    /// Enable footnotes ([^1])
    pub enable_footnotes: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self::gfm()
    }
}

impl RenderOptions {
    /// Everything enabled, TOC down to `<h3>`.
    pub fn gfm() -> Self {
        Self {
            theme: Theme::default(),
            toc: true,
            toc_depth: 3,
            diagrams_enabled: true,
            math_enabled: true,
            enable_tables: true,
            enable_strikethrough: true,
            enable_tasklists: true,
            enable_footnotes: true,
        }
    }

    pub fn with_theme(mut self, theme: Theme) -> Self {
        self.theme = theme;
        self
    }

    fn to_pulldown_options(&self) -> Options {
        let mut options = Options::ENABLE_HEADING_ATTRIBUTES;
        if self.enable_tables {
            options.insert(Options::ENABLE_TABLES);
        }
        if self.enable_strikethrough {
            options.insert(Options::ENABLE_STRIKETHROUGH);
        }
        if self.enable_tasklists {
            options.insert(Options::ENABLE_TASKLISTS);
        }
        if self.enable_footnotes {
            options.insert(Options::ENABLE_FOOTNOTES);
        }
        options
    }
}

/// The `pulldown-cmark` backed [`Renderer`].
#[derive(Debug, Clone, Copy, Default)]
pub struct MarkdownRenderer;

impl Renderer for MarkdownRenderer {
    fn render(&self, markdown: &str, options: &RenderOptions) -> Result<Rendered, RenderError> {
        to_html(markdown, options)
    }
}

fn is_external(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

/// Plain text of the heading starting right after `events[0]`'s opening tag.
fn heading_text(events: &[Event]) -> String {
    let mut text = String::new();
    for event in events {
        match event {
            Event::Text(t) | Event::Code(t) => text.push_str(t),
            Event::End(TagEnd::Heading(_)) => break,
            _ => {}
        }
    }
    text
}

/// Render markdown content to HTML.
///
/// # Example
///
/// ```
/// use markd_core::render::{to_html, RenderOptions};
///
/// let rendered = to_html("# Hello\n\nWorld", &RenderOptions::gfm()).unwrap();
/// assert!(rendered.html.contains(r#"<h1 id="hello">"#));
/// assert_eq!(rendered.toc[0].title, "Hello");
/// ```
pub fn to_html(markdown: &str, options: &RenderOptions) -> Result<Rendered, RenderError> {
    if markdown.len() > MAX_DOCUMENT_BYTES {
        return Err(RenderError::TooLarge {
            size: markdown.len(),
            limit: MAX_DOCUMENT_BYTES,
        });
    }

    let events: Vec<Event> = Parser::new_ext(markdown, options.to_pulldown_options()).collect();

    let mut processed = Vec::with_capacity(events.len());
    let mut slugs = SlugRegistry::default();
    let mut toc = Vec::new();
    let mut pending_anchor: Option<String> = None;

    let mut i = 0;
    while i < events.len() {
        match &events[i] {
            Event::Start(Tag::Heading {
                level,
                id,
                classes,
                attrs,
            }) => {
                let title = heading_text(&events[i + 1..]);
                // An explicit `{#id}` wins over the generated slug.
                let id = match id {
                    Some(id) => id.to_string(),
                    None => slugs.unique(&title),
                };

                let depth = *level as u8;
                if options.toc && depth <= options.toc_depth {
                    toc.push(TocEntry {
                        level: depth,
                        id: id.clone(),
                        title,
                    });
                }

                processed.push(Event::Start(Tag::Heading {
                    level: *level,
                    id: Some(CowStr::from(id.clone())),
                    classes: classes.clone(),
                    attrs: attrs.clone(),
                }));
                pending_anchor = Some(id);
                i += 1;
            }
            Event::End(TagEnd::Heading(_)) => {
                if let Some(id) = pending_anchor.take() {
                    processed.push(Event::Html(CowStr::from(format!(
                        r##"<a class="anchor" href="#{}" aria-hidden="true">¶</a>"##,
                        escape_html(&id)
                    ))));
                }
                processed.push(events[i].clone());
                i += 1;
            }
            Event::Start(Tag::CodeBlock(CodeBlockKind::Fenced(lang)))
                if options.diagrams_enabled
                    && lang.split_whitespace().next() == Some("mermaid") =>
            {
                let mut source = String::new();
                let mut j = i + 1;
                while j < events.len() {
                    match &events[j] {
                        Event::Text(text) => source.push_str(text),
                        Event::End(TagEnd::CodeBlock) => break,
                        _ => {}
                    }
                    j += 1;
                }

                processed.push(Event::Html(CowStr::from(format!(
                    "<div class=\"mermaid\">{}</div>\n",
                    escape_html(&source)
                ))));

                // Skip past the closing fence.
                i = j + 1;
            }
            Event::Start(Tag::Link {
                dest_url, title, ..
            }) if is_external(dest_url) => {
                let title_attr = if title.is_empty() {
                    String::new()
                } else {
                    format!(r#" title="{}""#, escape_html(title))
                };
                processed.push(Event::Html(CowStr::from(format!(
                    r#"<a href="{}"{title_attr} target="_blank" rel="noopener noreferrer">"#,
                    escape_html(dest_url)
                ))));
                i += 1;
            }
            _ => {
                processed.push(events[i].clone());
                i += 1;
            }
        }
    }

    let mut html = String::with_capacity(markdown.len() * 3 / 2);
    pulldown_cmark::html::push_html(&mut html, processed.into_iter());

    tracing::trace!(bytes = markdown.len(), headings = toc.len(), "Rendered markdown");

    Ok(Rendered { html, toc })
}
