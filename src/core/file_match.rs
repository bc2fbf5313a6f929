use std::cell::OnceCell;
use std::fs::{self, Metadata};
use std::path::{Path, PathBuf};

use super::content::FileContent;
use super::encoding::Encoding;
use super::matcher::MatchResult;
use super::name_part::NamePart;

/// One accepted file system entry produced by the walker.
///
/// `path` is the entry as read from the file system; `name_part` holds its
/// lossy UTF-8 text, which is what the filters match against.
#[derive(Debug, Clone)]
pub struct FileMatch {
    path: PathBuf,
    name_part: NamePart,
    name_match: Option<MatchResult>,
    content: Option<FileContent>,
    content_match: Option<MatchResult>,
    is_directory: bool,
    metadata: OnceCell<Option<Metadata>>,
}

impl FileMatch {
    pub fn new(path: PathBuf, name_part: NamePart, name_match: Option<MatchResult>, is_directory: bool) -> Self {
        Self {
            path,
            name_part,
            name_match,
            content: None,
            content_match: None,
            is_directory,
            metadata: OnceCell::new(),
        }
    }

    pub fn with_content(mut self, content: Option<FileContent>, content_match: Option<MatchResult>) -> Self {
        self.content = content;
        self.content_match = content_match;
        self
    }

    pub(crate) fn with_metadata(self, metadata: Option<Metadata>) -> Self {
        if let Some(metadata) = metadata {
            let _ = self.metadata.set(Some(metadata));
        }
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn name_part(&self) -> &NamePart {
        &self.name_part
    }

    pub fn name_match(&self) -> Option<&MatchResult> {
        self.name_match.as_ref()
    }

    pub fn content(&self) -> Option<&FileContent> {
        self.content.as_ref()
    }

    pub fn content_match(&self) -> Option<&MatchResult> {
        self.content_match.as_ref()
    }

    pub fn is_directory(&self) -> bool {
        self.is_directory
    }

    /// Start of the name match within the path, or of the name part when there is no capture.
    pub fn match_index(&self) -> usize {
        match self.name_match.as_ref().and_then(MatchResult::capture) {
            Some(capture) => self.name_part.start() + capture.start,
            None => self.name_part.start(),
        }
    }

    pub fn match_length(&self) -> usize {
        match self.name_match.as_ref().and_then(MatchResult::capture) {
            Some(capture) => capture.len(),
            None => self.name_part.len(),
        }
    }

    pub fn content_text(&self) -> Option<&str> {
        self.content.as_ref().map(|c| c.text.as_str())
    }

    pub fn effective_encoding(&self) -> Option<Encoding> {
        self.content.as_ref().map(FileContent::effective_encoding)
    }

    /// Metadata of the entry (not following symlinks), resolved on first use.
    pub fn metadata(&self) -> Option<&Metadata> {
        self.metadata
            .get_or_init(|| fs::symlink_metadata(self.path()).ok())
            .as_ref()
    }
}
