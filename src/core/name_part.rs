//! Resolves the part of a path that name filters are matched against.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::is_separator;

/// Selects which part of a path a name filter looks at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NamePartKind {
    /// The whole path.
    FullName,
    /// The last path segment.
    #[default]
    Name,
    /// The last path segment without its extension.
    NameWithoutExtension,
    /// The extension without the leading dot.
    Extension,
}

/// A span of a path string selected by a [`NamePartKind`].
///
/// `start + length` never exceeds the length of `path`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamePart {
    path: String,
    start: usize,
    length: usize,
    kind: NamePartKind,
}

impl NamePart {
    pub fn from_file(path: impl Into<String>, kind: NamePartKind) -> Self {
        let path = path.into();
        let (start, length) = match kind {
            NamePartKind::FullName => (0, path.len()),
            NamePartKind::Name => {
                let start = file_name_index(&path);
                (start, path.len() - start)
            }
            NamePartKind::NameWithoutExtension => {
                let start = file_name_index(&path);
                let dot = extension_index(&path);
                if dot == path.len() || dot == start {
                    (start, path.len() - start)
                } else {
                    (start, dot - start)
                }
            }
            NamePartKind::Extension => {
                let dot = extension_index(&path);
                if dot == path.len() {
                    (path.len(), 0)
                } else {
                    (dot + 1, path.len() - dot - 1)
                }
            }
        };

        Self {
            path,
            start,
            length,
            kind,
        }
    }

    /// Directories have no extension; `NameWithoutExtension` selects the whole name.
    pub fn from_directory(path: impl Into<String>, kind: NamePartKind) -> Self {
        let path = path.into();
        let (start, length) = match kind {
            NamePartKind::FullName => (0, path.len()),
            NamePartKind::Name | NamePartKind::NameWithoutExtension => {
                let start = file_name_index(&path);
                (start, path.len() - start)
            }
            NamePartKind::Extension => (path.len(), 0),
        };

        Self {
            path,
            start,
            length,
            kind,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn start(&self) -> usize {
        self.start
    }

    pub fn len(&self) -> usize {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    pub fn end(&self) -> usize {
        self.start + self.length
    }

    pub fn kind(&self) -> NamePartKind {
        self.kind
    }

    /// The selected substring.
    pub fn as_str(&self) -> &str {
        &self.path[self.start..self.end()]
    }
}

impl fmt::Display for NamePart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Byte index of the first character of the last path segment.
fn file_name_index(path: &str) -> usize {
    path.char_indices()
        .rev()
        .find(|(_, ch)| is_separator(*ch))
        .map(|(i, ch)| i + ch.len_utf8())
        .unwrap_or(0)
}

/// Byte index of the dot that starts the extension, or `path.len()` when there is
/// no extension or the dot is the last character.
fn extension_index(path: &str) -> usize {
    for (i, ch) in path.char_indices().rev() {
        if ch == '.' {
            return if i == path.len() - 1 { path.len() } else { i };
        }
        if is_separator(ch) {
            break;
        }
    }
    path.len()
}
