use markd_core::render::{to_html, RenderError, RenderOptions, Rendered, Renderer};
use markd_core::Theme;
use markd_export::Exporter;
use std::path::Path;
use std::sync::Arc;

fn write(path: &Path, content: &str) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, content).unwrap();
}

fn source_tree() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("src");
    write(&src.join("index.md"), "# Home\n\nSee [the intro](guide/intro.md#start).");
    write(&src.join("guide/intro.md"), "# Intro\n\n## Start\n\nHello.");
    write(&src.join("guide/advanced.md"), "# Advanced");
    write(&src.join("logo.png"), "not really a png");
    dir
}

#[test]
fn test_export_directory() {
    let dir = source_tree();
    let out = dir.path().join("out");

    let summary = Exporter::new(RenderOptions::gfm().with_theme(Theme::Dark))
        .export(&dir.path().join("src"), &out, false)
        .unwrap();

    assert_eq!(summary.succeeded(), 3);
    assert_eq!(summary.failed(), 0);
    assert!(summary.is_success());

    for page in ["index.html", "guide/intro.html", "guide/advanced.html"] {
        assert!(out.join(page).is_file(), "{page} was not written");
    }
    assert!(!out.join("logo.png").exists());
    assert!(!out.join("logo.html").exists());

    let index = std::fs::read_to_string(out.join("index.html")).unwrap();
    assert!(index.contains(r#"data-theme="dark""#));
    assert!(index.contains(r#"href="guide/intro.html#start""#));
    assert!(index.contains("<style>"));
    assert!(!index.contains("/assets/"));
    assert!(!index.contains("livereload"));
}

/// Fails on any document containing `broken`.
struct PickyRenderer;

impl Renderer for PickyRenderer {
    fn render(&self, markdown: &str, options: &RenderOptions) -> Result<Rendered, RenderError> {
        if markdown.contains("broken") {
            return Err(RenderError::Other("cannot render this".into()));
        }
        to_html(markdown, options)
    }
}

#[test]
fn test_failure_is_recorded_per_file() {
    let dir = source_tree();
    write(&dir.path().join("src/guide/broken.md"), "# broken");
    let out = dir.path().join("out");

    let summary = Exporter::with_renderer(Arc::new(PickyRenderer), RenderOptions::gfm())
        .export(&dir.path().join("src"), &out, false)
        .unwrap();

    assert_eq!(summary.succeeded(), 3);
    assert_eq!(summary.failed(), 1);
    assert!(!summary.is_success());

    let failure = &summary.failures[0];
    assert!(failure.source.ends_with("guide/broken.md"));
    assert!(failure.reason.contains("cannot render this"));
    assert!(!out.join("guide/broken.html").exists());
    assert!(out.join("guide/intro.html").is_file());
}

#[test]
fn test_export_single_file_minified() {
    let dir = source_tree();
    let out = dir.path().join("out");

    let summary = Exporter::new(RenderOptions::gfm())
        .export(&dir.path().join("src/guide/intro.md"), &out, true)
        .unwrap();

    assert_eq!(summary.written, vec![out.join("intro.html")]);

    let page = std::fs::read_to_string(out.join("intro.html")).unwrap();
    assert!(page.starts_with("<!DOCTYPE html><html"));
    assert!(page.contains("</title><style>"));
    assert!(page.contains("<title>Intro</title>"));
}

#[test]
fn test_missing_source_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let result = Exporter::new(RenderOptions::gfm()).export(
        &dir.path().join("missing"),
        &dir.path().join("out"),
        false,
    );
    assert!(result.is_err());
}

#[test]
fn test_non_utf8_document_fails_alone() {
    let dir = source_tree();
    std::fs::write(dir.path().join("src/latin1.md"), b"# Caf\xe9").unwrap();
    let out = dir.path().join("out");

    let summary = Exporter::new(RenderOptions::gfm())
        .export(&dir.path().join("src"), &out, false)
        .unwrap();

    assert_eq!(summary.succeeded(), 3);
    assert_eq!(summary.failed(), 1);
    assert!(summary.failures[0].source.ends_with("latin1.md"));
    assert!(summary.failures[0].reason.contains("failed to render"));
    assert!(!out.join("latin1.html").exists());
}

#[test]
fn test_minified_export_keeps_spaces_between_inline_elements() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("notes.md");
    write(&source, "*a*\n**b**\n");
    let out = dir.path().join("out");

    Exporter::new(RenderOptions::gfm())
        .export(&source, &out, true)
        .unwrap();

    let page = std::fs::read_to_string(out.join("notes.html")).unwrap();
    assert!(page.contains("<p><em>a</em> <strong>b</strong></p>"));
}
