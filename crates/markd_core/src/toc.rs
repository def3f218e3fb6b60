//! Table of contents entries collected while rendering.
//!
//! Heading ids follow GitHub's convention so that links written against a
//! GitHub-rendered README keep working in the preview.

use crate::html::escape_html;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Converts heading text to a URL-safe slug following GitHub's convention.
///
/// 1. Convert to lowercase
/// 2. Replace spaces with hyphens
/// 3. Remove all characters except alphanumeric, hyphens, and underscores
/// 4. Collapse multiple consecutive hyphens into one
///
/// # Example
///
/// ```
/// use markd_core::toc::slugify;
///
/// assert_eq!(slugify("Hello World"), "hello-world");
/// assert_eq!(slugify("API Reference (v2)"), "api-reference-v2");
/// ```
pub fn slugify(text: &str) -> String {
    text.to_lowercase()
        .chars()
        .filter_map(|c| {
            if c.is_alphanumeric() || c == '_' {
                Some(c)
            } else if c == ' ' || c == '-' {
                Some('-')
            } else {
                None
            }
        })
        .collect::<String>()
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

/// One heading of a rendered document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TocEntry {
    /// Heading level, 1 for `<h1>`.
    pub level: u8,
    /// Anchor id assigned to the heading element.
    pub id: String,
    /// Plain heading text.
    pub title: String,
}

/// Hands out unique heading ids within one document.
///
/// The first `Usage` heading gets `usage`, the next ones `usage-1`, `usage-2`...
#[derive(Debug, Default)]
pub struct SlugRegistry {
    seen: HashMap<String, usize>,
}

impl SlugRegistry {
    pub fn unique(&mut self, text: &str) -> String {
        let base = match slugify(text) {
            slug if slug.is_empty() => String::from("section"),
            slug => slug,
        };

        match self.seen.get_mut(&base) {
            None => {
                self.seen.insert(base.clone(), 0);
                base
            }
            Some(count) => {
                *count += 1;
                let candidate = format!("{base}-{count}");
                self.seen.insert(candidate.clone(), 0);
                candidate
            }
        }
    }
}

/// Renders the sidebar navigation for `entries`.
///
/// Returns an empty string when there is nothing to show.
pub fn toc_html(entries: &[TocEntry]) -> String {
    if entries.is_empty() {
        return String::new();
    }

    let min_level = entries.iter().map(|e| e.level).min().unwrap_or(1);

    let mut html = String::from(r#"<nav class="toc" aria-label="Table of contents"><ul>"#);
    for entry in entries {
        let depth = entry.level - min_level;
        html.push_str(&format!(
            r##"<li class="toc-depth-{depth}"><a href="#{}">{}</a></li>"##,
            escape_html(&entry.id),
            escape_html(&entry.title)
        ));
    }
    html.push_str("</ul></nav>");
    html
}
