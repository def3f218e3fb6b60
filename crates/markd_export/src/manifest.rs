use crate::ExportError;
use markd_core::discover::markdown_files;
use markd_core::{is_markdown, Theme};
use std::path::{Path, PathBuf};

/// One file to export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestEntry {
    pub source: PathBuf,
    pub output: PathBuf,
    pub theme: Theme,
    pub minify: bool,
}

/// Every file of one export run, fixed when the run starts.
///
/// Files added to the source tree afterwards are not picked up.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportManifest {
    entries: Vec<ManifestEntry>,
}

impl ExportManifest {
    /// Maps `source` onto `output`.
    ///
    /// A directory source keeps its relative layout under `output` with
    /// `.md` turned into `.html`. A single file lands in `output` unless
    /// `output` itself names an `.html` file.
    pub fn build(
        source: &Path,
        output: &Path,
        theme: Theme,
        minify: bool,
    ) -> Result<Self, ExportError> {
        let source = source
            .canonicalize()
            .map_err(|err| ExportError::SourceMissing {
                path: source.to_path_buf(),
                source: err,
            })?;

        let entry = |source: PathBuf, output: PathBuf| ManifestEntry {
            source,
            output,
            theme,
            minify,
        };

        let entries = if source.is_file() {
            if !is_markdown(&source) {
                return Err(ExportError::NotMarkdown(source));
            }
            let output = if output.extension().is_some_and(|ext| ext == "html") {
                output.to_path_buf()
            } else {
                let name = Path::new(source.file_name().unwrap_or_default());
                output.join(name.with_extension("html"))
            };
            vec![entry(source.clone(), output)]
        } else {
            markdown_files(&source)
                .into_iter()
                .filter_map(|file| {
                    let relative = file.strip_prefix(&source).ok()?.with_extension("html");
                    let output = output.join(relative);
                    Some(entry(file, output))
                })
                .collect()
        };

        tracing::debug!(
            source = %source.display(),
            output = %output.display(),
            files = entries.len(),
            "Built export manifest"
        );

        Ok(Self { entries })
    }

    pub fn entries(&self) -> &[ManifestEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_directory_manifest_keeps_layout() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        std::fs::create_dir_all(src.join("guide")).unwrap();
        std::fs::write(src.join("index.md"), "# Home").unwrap();
        std::fs::write(src.join("guide/intro.markdown"), "# Intro").unwrap();
        std::fs::write(src.join("logo.png"), "png").unwrap();

        let out = dir.path().join("out");
        let manifest = ExportManifest::build(&src, &out, Theme::Dark, true).unwrap();

        let outputs: Vec<_> = manifest
            .entries()
            .iter()
            .map(|entry| entry.output.clone())
            .collect();
        assert_eq!(
            outputs,
            vec![out.join("guide/intro.html"), out.join("index.html")]
        );
        assert!(manifest
            .entries()
            .iter()
            .all(|entry| entry.theme == Theme::Dark && entry.minify));
    }

    #[test]
    fn test_single_file_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("notes.md");
        std::fs::write(&file, "# Notes").unwrap();

        let into_dir = ExportManifest::build(&file, Path::new("site"), Theme::Light, false).unwrap();
        assert_eq!(into_dir.len(), 1);
        assert_eq!(into_dir.entries()[0].source, file.canonicalize().unwrap());
        assert_eq!(into_dir.entries()[0].output, Path::new("site/notes.html"));

        let named = ExportManifest::build(&file, Path::new("out.html"), Theme::Light, false).unwrap();
        assert_eq!(named.entries()[0].output, Path::new("out.html"));
    }

    #[test]
    fn test_invalid_sources() {
        let dir = tempfile::tempdir().unwrap();
        let missing = ExportManifest::build(&dir.path().join("nope"), dir.path(), Theme::Light, false);
        assert!(matches!(missing, Err(ExportError::SourceMissing { .. })));

        let text = dir.path().join("notes.txt");
        std::fs::write(&text, "plain").unwrap();
        let not_markdown = ExportManifest::build(&text, dir.path(), Theme::Light, false);
        assert!(matches!(not_markdown, Err(ExportError::NotMarkdown(_))));
    }
}
