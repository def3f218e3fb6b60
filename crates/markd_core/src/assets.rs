//! Embedded web assets for the preview page.
//!
//! The same files are served under `/assets/` by the preview server and
//! inlined into exported pages.

/// Layout and typography.
pub const STYLES_CSS: &str = include_str!("../assets/styles.css");

/// Colour variables of every theme, keyed by `data-theme`.
pub const THEMES_CSS: &str = include_str!("../assets/themes.css");

/// Theme switcher, persists the choice in localStorage and a cookie.
pub const THEME_JS: &str = include_str!("../assets/theme.js");

/// WebSocket client reloading the page on change.
pub const LIVERELOAD_JS: &str = include_str!("../assets/livereload.js");

pub const MERMAID_JS_URL: &str = "https://cdn.jsdelivr.net/npm/mermaid@10/dist/mermaid.min.js";
pub const KATEX_CSS_URL: &str = "https://cdn.jsdelivr.net/npm/katex@0.16.9/dist/katex.min.css";
pub const KATEX_JS_URL: &str = "https://cdn.jsdelivr.net/npm/katex@0.16.9/dist/katex.min.js";
pub const KATEX_AUTO_RENDER_URL: &str =
    "https://cdn.jsdelivr.net/npm/katex@0.16.9/dist/contrib/auto-render.min.js";

/// An embedded file and its content type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Asset {
    pub name: &'static str,
    pub content_type: &'static str,
    pub body: &'static str,
}

pub const ASSETS: &[Asset] = &[
    Asset {
        name: "styles.css",
        content_type: "text/css; charset=utf-8",
        body: STYLES_CSS,
    },
    Asset {
        name: "themes.css",
        content_type: "text/css; charset=utf-8",
        body: THEMES_CSS,
    },
    Asset {
        name: "theme.js",
        content_type: "text/javascript; charset=utf-8",
        body: THEME_JS,
    },
    Asset {
        name: "livereload.js",
        content_type: "text/javascript; charset=utf-8",
        body: LIVERELOAD_JS,
    },
];

/// Looks up an embedded asset by file name.
pub fn lookup(name: &str) -> Option<&'static Asset> {
    ASSETS.iter().find(|asset| asset.name == name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assets_exist() {
        for asset in ASSETS {
            assert!(!asset.body.is_empty(), "{}", asset.name);
        }
    }

    #[test]
    fn test_themes_cover_every_theme() {
        for theme in crate::theme::Theme::ALL {
            assert!(
                THEMES_CSS.contains(&format!(r#"[data-theme="{}"]"#, theme.name())),
                "{theme}"
            );
        }
    }

    #[test]
    fn test_livereload_client_contract() {
        assert!(LIVERELOAD_JS.contains("new WebSocket"));
        assert!(LIVERELOAD_JS.contains("/__livereload"));
        assert!(LIVERELOAD_JS.contains(r#"message.type === "reload""#));
        assert!(THEME_JS.contains("localStorage"));
        assert!(THEME_JS.contains("markd_theme"));
    }

    #[test]
    fn test_lookup() {
        assert_eq!(lookup("styles.css").unwrap().content_type, "text/css; charset=utf-8");
        assert!(lookup("../Cargo.toml").is_none());
    }
}
