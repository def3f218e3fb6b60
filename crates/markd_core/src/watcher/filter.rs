use super::WatchMode;
use crate::document::is_markdown;
use ignore::gitignore::Gitignore;
use std::ffi::OsString;
use std::path::{Component, Path, PathBuf};

/// Directory names that are never descended into.
pub const IGNORED_DIRS: &[&str] = &["node_modules", "target", "__pycache__", ".git"];

/// Decides which raw paths reach the debouncer.
#[derive(Debug)]
pub enum PathFilter {
    /// Only events for this one file name inside the watched parent.
    File { name: OsString },
    /// Markdown files under `root` that are neither hidden nor ignored.
    Tree {
        root: PathBuf,
        gitignore: Option<Gitignore>,
    },
}

impl PathFilter {
    pub fn new(mode: &WatchMode) -> Self {
        match mode {
            WatchMode::SingleFile(file) => Self::File {
                name: file.file_name().map(OsString::from).unwrap_or_default(),
            },
            WatchMode::Directory(root) => Self::Tree {
                root: root.clone(),
                gitignore: load_gitignore(root),
            },
        }
    }

    pub fn accepts(&self, path: &Path) -> bool {
        match self {
            Self::File { name } => path.file_name() == Some(name.as_os_str()),
            Self::Tree { root, gitignore } => {
                let Ok(relative) = path.strip_prefix(root) else {
                    return false;
                };
                if !is_markdown(path) || is_hidden_or_ignored_dir(relative) {
                    return false;
                }
                match gitignore {
                    Some(gitignore) => !gitignore
                        .matched_path_or_any_parents(path, false)
                        .is_ignore(),
                    None => true,
                }
            }
        }
    }
}

/// Whether any component of `relative` is hidden or a built-in ignored dir.
pub fn is_hidden_or_ignored_dir(relative: &Path) -> bool {
    relative.components().any(|component| match component {
        Component::Normal(name) => {
            let name = name.to_string_lossy();
            name.starts_with('.') || IGNORED_DIRS.contains(&name.as_ref())
        }
        _ => false,
    })
}

fn load_gitignore(root: &Path) -> Option<Gitignore> {
    let path = root.join(".gitignore");
    if !path.is_file() {
        return None;
    }

    let (gitignore, err) = Gitignore::new(&path);
    if let Some(err) = err {
        tracing::warn!(?err, path = ?path, "Partially invalid .gitignore");
    }
    Some(gitignore)
}
