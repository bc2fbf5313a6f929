//! Configuration of one tree walk: which entries are accepted and which subtrees are searched.

use serde::{Deserialize, Serialize};

use super::matcher::Matcher;
use super::name_part::NamePartKind;
use super::properties::{FileAttributes, FilePropertyFilter};

/// Which kind of entries a walk yields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SearchTarget {
    #[default]
    Files,
    Directories,
    All,
}

impl SearchTarget {
    pub fn includes_files(self) -> bool {
        matches!(self, SearchTarget::Files | SearchTarget::All)
    }

    pub fn includes_directories(self) -> bool {
        matches!(self, SearchTarget::Directories | SearchTarget::All)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FileEmptyOption {
    #[default]
    None,
    Empty,
    NonEmpty,
}

impl FileEmptyOption {
    pub fn accepts(self, is_empty: bool) -> bool {
        match self {
            FileEmptyOption::None => true,
            FileEmptyOption::Empty => is_empty,
            FileEmptyOption::NonEmpty => !is_empty,
        }
    }
}

/// Filters applied by the walker.
///
/// Files pass through extension, name, attribute, property and finally
/// content/emptiness checks. The directory filter decides which directories
/// have their files searched; a negative directory filter also prunes the
/// rejected subtree.
#[derive(Debug, Clone, Default)]
pub struct FileSystemFilter {
    pub name: Option<Matcher>,
    pub name_part: NamePartKind,
    pub extension: Option<Matcher>,
    pub content: Option<Matcher>,
    pub directory: Option<Matcher>,
    pub directory_part: NamePartKind,
    pub properties: FilePropertyFilter,
    /// All of these must be present.
    pub attributes: FileAttributes,
    /// Entries with any of these are skipped; directories are not descended.
    pub attributes_to_skip: FileAttributes,
    pub empty: FileEmptyOption,
}

impl FileSystemFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_name(mut self, matcher: Matcher, part: NamePartKind) -> Self {
        self.name = Some(matcher);
        self.name_part = part;
        self
    }

    pub fn with_extension(mut self, matcher: Matcher) -> Self {
        self.extension = Some(matcher);
        self
    }

    pub fn with_content(mut self, matcher: Matcher) -> Self {
        self.content = Some(matcher);
        self
    }

    pub fn with_directory(mut self, matcher: Matcher, part: NamePartKind) -> Self {
        self.directory = Some(matcher);
        self.directory_part = part;
        self
    }

    pub fn with_properties(mut self, properties: FilePropertyFilter) -> Self {
        self.properties = properties;
        self
    }

    pub fn with_attributes(mut self, required: FileAttributes, skip: FileAttributes) -> Self {
        self.attributes = required;
        self.attributes_to_skip = skip;
        self
    }

    pub fn with_empty(mut self, empty: FileEmptyOption) -> Self {
        self.empty = empty;
        self
    }

    /// `true` if attribute or property checks need metadata.
    pub fn needs_metadata(&self) -> bool {
        !self.attributes.is_empty()
            || !self.attributes_to_skip.is_empty()
            || !self.properties.is_empty()
    }

    pub fn needs_content(&self) -> bool {
        self.content.is_some() || self.empty != FileEmptyOption::None
    }

    pub fn accepts_attributes(&self, attributes: FileAttributes) -> bool {
        attributes.contains(self.attributes) && !attributes.intersects(self.attributes_to_skip)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_option_accepts() {
        assert!(FileEmptyOption::None.accepts(true));
        assert!(FileEmptyOption::None.accepts(false));
        assert!(FileEmptyOption::Empty.accepts(true));
        assert!(!FileEmptyOption::Empty.accepts(false));
        assert!(FileEmptyOption::NonEmpty.accepts(false));
    }

    #[test]
    fn attribute_requirements() {
        let filter = FileSystemFilter::new()
            .with_attributes(FileAttributes::READ_ONLY, FileAttributes::HIDDEN);
        assert!(filter.accepts_attributes(FileAttributes::READ_ONLY));
        assert!(!filter.accepts_attributes(FileAttributes::empty()));
        assert!(!filter.accepts_attributes(FileAttributes::READ_ONLY | FileAttributes::HIDDEN));
        assert!(filter.needs_metadata());
        assert!(!FileSystemFilter::new().needs_metadata());
    }
}
