//! Resolution of request paths against the served root.
//!
//! A request path is first checked lexically (no `..`, no absolute or prefixed
//! components) and then canonicalized and compared against the canonical
//! root, which also catches symlinks pointing outside of it.

use std::path::{Component, Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PathError {
    #[error("{0} not found")]
    NotFound(String),
    #[error("{0} is outside of the served root")]
    Forbidden(String),
}

impl PathError {
    pub fn is_forbidden(&self) -> bool {
        matches!(self, Self::Forbidden(_))
    }
}

/// Resolves `requested`, a `/`-separated path relative to `root`, to an
/// existing canonical path inside `root`.
///
/// # Examples
///
/// ```
/// use markd_core::path_guard::{resolve, PathError};
///
/// let root = std::env::temp_dir();
/// let err = resolve(&root, "../../etc/passwd").unwrap_err();
/// assert!(matches!(err, PathError::Forbidden(_)));
/// ```
pub fn resolve(root: &Path, requested: &str) -> Result<PathBuf, PathError> {
    if requested.contains('\0') {
        return Err(PathError::Forbidden(requested.to_string()));
    }

    let relative = requested.trim_start_matches('/');

    // Both separators, a backslash is a separator on Windows.
    let lexically_safe = relative
        .split(['/', '\\'])
        .all(|segment| segment != "..")
        && Path::new(relative)
            .components()
            .all(|component| matches!(component, Component::Normal(_) | Component::CurDir));
    if !lexically_safe {
        return Err(PathError::Forbidden(requested.to_string()));
    }

    let root = root
        .canonicalize()
        .map_err(|_| PathError::NotFound(root.display().to_string()))?;

    let resolved = root
        .join(relative)
        .canonicalize()
        .map_err(|_| PathError::NotFound(requested.to_string()))?;

    if !resolved.starts_with(&root) {
        return Err(PathError::Forbidden(requested.to_string()));
    }

    Ok(resolved)
}

/// `/`-separated form of `path` relative to `root`, used in links and JSON.
pub fn url_path(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let segments: Vec<_> = relative
        .components()
        .filter_map(|component| match component {
            Component::Normal(name) => Some(name.to_string_lossy()),
            _ => None,
        })
        .collect();
    Some(segments.join("/"))
}
