//! The HTML page wrapped around a rendered fragment.

use crate::assets::{
    KATEX_AUTO_RENDER_URL, KATEX_CSS_URL, KATEX_JS_URL, MERMAID_JS_URL, STYLES_CSS, THEMES_CSS,
    THEME_JS,
};
use crate::html::escape_html;
use crate::theme::Theme;
use crate::toc::{toc_html, TocEntry};
use std::fmt::Write;
use std::path::Path;

/// How the page refers to the embedded CSS and scripts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AssetMode {
    /// `<link>`/`<script src>` pointing at the server's `/assets/` route.
    #[default]
    Linked,
    /// Everything embedded in the page, for exported files.
    Inline,
}

#[derive(Debug, Clone, Default)]
pub struct PageShell<'a> {
    pub title: &'a str,
    pub body_html: &'a str,
    pub toc: &'a [TocEntry],
    pub theme: Theme,
    pub live_reload: bool,
    pub diagrams: bool,
    pub math: bool,
    pub assets: AssetMode,
}

impl<'a> PageShell<'a> {
    pub fn render(&self) -> String {
        let mut page = String::with_capacity(self.body_html.len() + 4096);

        let _ = write!(
            page,
            "<!DOCTYPE html>\n<html lang=\"en\" data-theme=\"{theme}\">\n<head>\n\
             <meta charset=\"utf-8\">\n\
             <meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n\
             <title>{title}</title>\n",
            theme = self.theme.name(),
            title = escape_html(self.title),
        );

        match self.assets {
            AssetMode::Linked => {
                page.push_str("<link rel=\"stylesheet\" href=\"/assets/styles.css\">\n");
                page.push_str("<link rel=\"stylesheet\" href=\"/assets/themes.css\">\n");
            }
            AssetMode::Inline => {
                let _ = write!(page, "<style>\n{STYLES_CSS}\n{THEMES_CSS}\n</style>\n");
            }
        }

        if self.math {
            let _ = writeln!(page, "<link rel=\"stylesheet\" href=\"{KATEX_CSS_URL}\">");
        }

        page.push_str("</head>\n<body>\n<div class=\"layout\">\n");

        let toc = toc_html(self.toc);
        if !toc.is_empty() {
            let _ = writeln!(page, "<aside class=\"sidebar\">{toc}</aside>");
        }

        page.push_str("<main class=\"markdown-body\">\n");
        page.push_str(&theme_select(self.theme));
        page.push_str("\n<article>\n");
        page.push_str(self.body_html);
        page.push_str("\n</article>\n</main>\n</div>\n");

        if self.live_reload {
            page.push_str("<div class=\"reload-status\">Reconnecting\u{2026}</div>\n");
        }

        if self.diagrams {
            let _ = writeln!(page, "<script src=\"{MERMAID_JS_URL}\"></script>");
        }

        if self.math {
            let _ = writeln!(page, "<script defer src=\"{KATEX_JS_URL}\"></script>");
            let _ = writeln!(
                page,
                "<script defer src=\"{KATEX_AUTO_RENDER_URL}\" \
                 onload=\"renderMathInElement(document.querySelector('article'))\"></script>"
            );
        }

        match self.assets {
            AssetMode::Linked => {
                page.push_str("<script src=\"/assets/theme.js\"></script>\n");
                if self.live_reload {
                    page.push_str("<script src=\"/assets/livereload.js\"></script>\n");
                }
            }
            AssetMode::Inline => {
                let _ = write!(page, "<script>\n{THEME_JS}\n</script>\n");
            }
        }

        page.push_str("</body>\n</html>\n");
        page
    }
}

fn theme_select(current: Theme) -> String {
    let mut html = String::from(
        "<div class=\"toolbar\"><select id=\"theme-select\" aria-label=\"Theme\">",
    );
    for theme in Theme::ALL {
        let selected = if *theme == current { " selected" } else { "" };
        let _ = write!(
            html,
            "<option value=\"{name}\"{selected}>{name}</option>",
            name = theme.name()
        );
    }
    html.push_str("</select></div>");
    html
}

/// Page title: the first top-level heading, else the file stem.
pub fn page_title(toc: &[TocEntry], path: &Path) -> String {
    toc.iter()
        .find(|entry| entry.level == 1)
        .map(|entry| entry.title.clone())
        .or_else(|| {
            path.file_stem()
                .map(|stem| stem.to_string_lossy().into_owned())
        })
        .unwrap_or_else(|| String::from("markd"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toc() -> Vec<TocEntry> {
        vec![TocEntry {
            level: 1,
            id: "title".into(),
            title: "Title".into(),
        }]
    }

    #[test]
    fn test_linked_page() {
        let toc = toc();
        let page = PageShell {
            title: "Title",
            body_html: "<h1 id=\"title\">Title</h1>",
            toc: &toc,
            theme: Theme::Dark,
            live_reload: true,
            diagrams: true,
            math: false,
            assets: AssetMode::Linked,
        }
        .render();

        assert!(page.contains(r#"<html lang="en" data-theme="dark">"#));
        assert!(page.contains(r#"<option value="dark" selected>"#));
        assert!(page.contains("/assets/livereload.js"));
        assert!(page.contains("mermaid.min.js"));
        assert!(!page.contains("katex"));
        assert!(page.contains(r##"<a href="#title">Title</a>"##));
    }

    #[test]
    fn test_inline_page_is_self_contained() {
        let page = PageShell {
            title: "<Doc>",
            body_html: "<p>x</p>",
            math: true,
            assets: AssetMode::Inline,
            ..Default::default()
        }
        .render();

        assert!(page.contains("<title>&lt;Doc&gt;</title>"));
        assert!(!page.contains("/assets/"));
        assert!(!page.contains("livereload"));
        assert!(page.contains("--link"));
        assert!(page.contains("katex.min.js"));
        assert!(!page.contains("class=\"sidebar\""));
    }

    #[test]
    fn test_page_title() {
        assert_eq!(page_title(&toc(), Path::new("a.md")), "Title");
        assert_eq!(page_title(&[], Path::new("docs/guide.md")), "guide");
    }
}
