//! Markdown file discovery under a directory.

use crate::document::is_markdown;
use crate::watcher::IGNORED_DIRS;
use ignore::WalkBuilder;
use std::path::{Path, PathBuf};

/// Every Markdown file under `root`, sorted by path.
///
/// Hidden entries, `.gitignore`d paths and the built-in ignored directories
/// are skipped, the same set of files the directory watcher reports on.
pub fn markdown_files(root: &Path) -> Vec<PathBuf> {
    let walker = WalkBuilder::new(root)
        .hidden(true)
        .git_ignore(true)
        .git_exclude(false)
        .git_global(false)
        .require_git(false)
        .parents(false)
        .sort_by_file_name(|a, b| a.cmp(b))
        .filter_entry(|entry| {
            entry.depth() == 0
                || !entry
                    .file_name()
                    .to_str()
                    .map(|name| IGNORED_DIRS.contains(&name))
                    .unwrap_or(false)
        })
        .build();

    let mut files: Vec<_> = walker
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(err) => {
                tracing::debug!(?err, "Skipping unreadable entry");
                None
            }
        })
        .filter(|entry| entry.file_type().map(|ft| ft.is_file()).unwrap_or(false))
        .map(|entry| entry.into_path())
        .filter(|path| is_markdown(path))
        .collect();

    files.sort();
    files
}
