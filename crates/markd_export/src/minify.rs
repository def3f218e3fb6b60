use once_cell::sync::Lazy;
use regex::Regex;

/// Elements whose content is whitespace sensitive.
static PRESERVED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)<pre\b.*?</pre>|<script\b.*?</script>|<style\b.*?</style>|<textarea\b.*?</textarea>")
        .unwrap()
});

static COMMENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<!--.*?-->").unwrap());

/// Whitespace spanning a line break between two tags.
static BETWEEN_TAGS: Lazy<Regex> = Lazy::new(|| Regex::new(r">\s*\n\s*<").unwrap());

/// Elements rendered inline, the space between two of them is visible.
const INLINE_ELEMENTS: &[&str] = &[
    "a", "abbr", "b", "bdi", "bdo", "button", "cite", "code", "data", "del", "dfn", "em", "i",
    "img", "input", "ins", "kbd", "label", "mark", "q", "s", "samp", "small", "span", "strong",
    "sub", "sup", "time", "u", "var",
];

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Strips comments and collapses whitespace outside of `<pre>`, `<script>`,
/// `<style>` and `<textarea>`.
///
/// Whitespace between two inline elements is kept as one space, even across
/// a line break.
pub fn minify_html(html: &str) -> String {
    let mut minified = String::with_capacity(html.len());
    let mut last = 0;

    for preserved in PRESERVED.find_iter(html) {
        minified.push_str(&collapse(&html[last..preserved.start()]));
        minified.push_str(preserved.as_str());
        last = preserved.end();
    }
    minified.push_str(&collapse(&html[last..]));

    minified.trim().to_string()
}

fn collapse(fragment: &str) -> String {
    // Bracketed so that whitespace at the edges counts as sitting between tags.
    let bracketed = format!(">{fragment}<");
    let fragment = COMMENT.replace_all(&bracketed, "");
    let fragment = drop_line_breaks(&fragment);
    let collapsed = WHITESPACE.replace_all(&fragment, " ");
    collapsed[1..collapsed.len() - 1].to_string()
}

/// Removes line breaks between tags unless both tags are inline.
fn drop_line_breaks(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut last = 0;

    for gap in BETWEEN_TAGS.find_iter(html) {
        // The gap starts at a `>` and ends at a `<`, both belong to the tags.
        let before = &html[..gap.start() + 1];
        let after = &html[gap.end() - 1..];
        out.push_str(&html[last..gap.start() + 1]);
        if is_inline(closing_tag_name(before)) && is_inline(opening_tag_name(after)) {
            out.push(' ');
        }
        last = gap.end() - 1;
    }
    out.push_str(&html[last..]);

    out
}

/// Name of the tag `html` ends with.
fn closing_tag_name(html: &str) -> &str {
    html.rfind('<').map(|start| tag_name(&html[start..])).unwrap_or_default()
}

/// Name of the tag `html` starts with.
fn opening_tag_name(html: &str) -> &str {
    tag_name(html)
}

fn tag_name(tag: &str) -> &str {
    let name = tag.trim_start_matches('<').trim_start_matches('/');
    let end = name
        .find(|c: char| !c.is_ascii_alphanumeric())
        .unwrap_or(name.len());
    &name[..end]
}

fn is_inline(name: &str) -> bool {
    INLINE_ELEMENTS
        .iter()
        .any(|inline| inline.eq_ignore_ascii_case(name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minify_html() {
        let html = "<!DOCTYPE html>\n<html>\n  <body>\n    <!-- note -->\n    <p>Hello   <em>big</em> world</p>\n  </body>\n</html>\n";
        assert_eq!(
            minify_html(html),
            "<!DOCTYPE html><html><body><p>Hello <em>big</em> world</p></body></html>"
        );
    }

    #[test]
    fn test_inline_whitespace_survives_line_breaks() {
        let html = "<p><em>a</em>\n<strong>b</strong></p>\n<ul>\n<li><a href=\"x\">x</a>\n<code>y</code></li>\n</ul>";
        assert_eq!(
            minify_html(html),
            "<p><em>a</em> <strong>b</strong></p><ul><li><a href=\"x\">x</a> <code>y</code></li></ul>"
        );
    }

    #[test]
    fn test_rendered_markdown_keeps_word_breaks() {
        let rendered =
            markd_core::render::to_html("*a*\n**b**\n", &markd_core::RenderOptions::gfm()).unwrap();
        assert_eq!(
            minify_html(&rendered.html),
            "<p><em>a</em> <strong>b</strong></p>"
        );
    }

    #[test]
    fn test_preformatted_content_is_untouched() {
        let html = "<div>\n  <pre><code>fn main() {\n    run();\n}</code></pre>\n</div>\n<script>\nlet  x = 1;\n</script>";
        assert_eq!(
            minify_html(html),
            "<div><pre><code>fn main() {\n    run();\n}</code></pre></div><script>\nlet  x = 1;\n</script>"
        );
    }
}
