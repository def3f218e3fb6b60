//! Directory listing page and the JSON file tree.

use markd_core::html::escape_html;
use markd_core::path_guard::url_path;
use markd_core::watcher::is_hidden_or_ignored_dir;
use markd_core::{discover, is_markdown};
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use serde::Serialize;
use std::path::Path;

/// Characters escaped within one path segment of a link.
const SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// Absolute link to `relative`, a `/`-separated path under the root.
pub fn href(relative: &str) -> String {
    let encoded: Vec<_> = relative
        .split('/')
        .map(|segment| utf8_percent_encode(segment, SEGMENT).to_string())
        .collect();
    format!("/{}", encoded.join("/"))
}

struct ListingEntry {
    name: String,
    relative: String,
    is_dir: bool,
}

/// The listing of `dir`: subdirectories first, then Markdown files.
pub fn directory_html(root: &Path, dir: &Path) -> std::io::Result<String> {
    let mut entries = Vec::new();

    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let name = entry.file_name().to_string_lossy().into_owned();

        if is_hidden_or_ignored_dir(Path::new(&name)) {
            continue;
        }

        let is_dir = entry.file_type()?.is_dir();
        if !is_dir && !is_markdown(&path) {
            continue;
        }

        let Some(relative) = url_path(root, &path) else {
            continue;
        };
        entries.push(ListingEntry {
            name,
            relative,
            is_dir,
        });
    }

    entries.sort_by(|a, b| b.is_dir.cmp(&a.is_dir).then_with(|| a.name.cmp(&b.name)));

    let current = url_path(root, dir).unwrap_or_default();
    let mut html = String::from("<div class=\"listing\">");
    html.push_str(&format!("<h1>Index of /{}</h1><ul>", escape_html(&current)));

    if !current.is_empty() {
        let parent = current.rsplit_once('/').map(|(parent, _)| parent).unwrap_or("");
        html.push_str(&format!(
            "<li class=\"dir\"><a href=\"{}\">..</a></li>",
            escape_html(&href(parent))
        ));
    }

    for entry in &entries {
        let (class, suffix) = if entry.is_dir { ("dir", "/") } else { ("file", "") };
        html.push_str(&format!(
            "<li class=\"{class}\"><a href=\"{}\">{}{suffix}</a></li>",
            escape_html(&href(&entry.relative)),
            escape_html(&entry.name),
        ));
    }

    if entries.is_empty() {
        html.push_str("<li>No Markdown files here.</li>");
    }

    html.push_str("</ul></div>");
    Ok(html)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    File,
    Directory,
}

/// One node of the JSON file tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TreeNode {
    pub name: String,
    pub path: String,
    #[serde(rename = "type")]
    pub kind: NodeKind,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<TreeNode>,
}

impl TreeNode {
    fn directory(name: &str, path: &str) -> Self {
        Self {
            name: name.to_string(),
            path: path.to_string(),
            kind: NodeKind::Directory,
            children: Vec::new(),
        }
    }

    fn insert(&mut self, relative: &str) {
        let mut node = self;
        let segments: Vec<_> = relative.split('/').collect();

        for (depth, segment) in segments.iter().enumerate() {
            let path = segments[..=depth].join("/");
            let is_file = depth + 1 == segments.len();

            let position = node
                .children
                .iter()
                .position(|child| child.name == *segment);
            let index = match position {
                Some(index) => index,
                None => {
                    node.children.push(if is_file {
                        TreeNode {
                            name: segment.to_string(),
                            path,
                            kind: NodeKind::File,
                            children: Vec::new(),
                        }
                    } else {
                        TreeNode::directory(segment, &path)
                    });
                    node.children.len() - 1
                }
            };
            node = &mut node.children[index];
        }
    }
}

/// Every Markdown file under `root` as a nested tree.
///
/// Directories without Markdown files do not appear.
pub fn file_tree(root: &Path) -> TreeNode {
    let name = root
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let mut tree = TreeNode::directory(&name, "");

    for file in discover::markdown_files(root) {
        if let Some(relative) = url_path(root, &file) {
            tree.insert(&relative);
        }
    }

    tree
}
