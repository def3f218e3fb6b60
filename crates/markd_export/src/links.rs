use once_cell::sync::Lazy;
use regex::Regex;
use std::borrow::Cow;

/// `href`s of relative links to Markdown files, the fragment captured apart.
///
/// A `:` in the target means a scheme (`https:`, `mailto:`), those links are left alone.
static MARKDOWN_HREF: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"href="([^":#?]+)\.(?:md|markdown|mdown|mkdn|mkd)((?:#[^"]*)?)""#).unwrap()
});

/// Points links between documents at the exported pages.
pub fn rewrite_markdown_links(html: &str) -> Cow<'_, str> {
    MARKDOWN_HREF.replace_all(html, r#"href="${1}.html${2}""#)
}
