//! Entry point for running a configured walk over a directory tree.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::cancel::CancellationToken;
use super::content::ContentReader;
use super::encoding::{Encoding, EncodingDetector};
use super::error::{CoreError, CoreResult};
use super::file_match::FileMatch;
use super::filter::{FileSystemFilter, SearchTarget};
use super::progress::{NullReporter, ProgressReporter};
use super::walker::{FileSystemWalker, WalkOptions};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchOptions {
    pub recurse: bool,
    pub target: SearchTarget,
    pub default_encoding: Encoding,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            recurse: true,
            target: SearchTarget::Files,
            default_encoding: Encoding::Utf8,
        }
    }
}

/// A filter together with the options that control how it is applied.
///
/// A `Search` is cheap to clone and can start any number of walks.
#[derive(Clone)]
pub struct Search {
    filter: Arc<FileSystemFilter>,
    options: SearchOptions,
    reader: ContentReader,
    progress: Arc<dyn ProgressReporter>,
}

impl std::fmt::Debug for Search {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Search")
            .field("filter", &self.filter)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl Search {
    pub fn new(filter: FileSystemFilter, options: SearchOptions) -> Self {
        Self {
            filter: Arc::new(filter),
            options,
            reader: ContentReader::new(options.default_encoding),
            progress: Arc::new(NullReporter),
        }
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressReporter>) -> Self {
        self.progress = progress;
        self
    }

    pub fn with_detector(mut self, detector: Arc<dyn EncodingDetector>) -> Self {
        self.reader = self.reader.with_detector(detector);
        self
    }

    pub fn filter(&self) -> &FileSystemFilter {
        &self.filter
    }

    pub fn options(&self) -> &SearchOptions {
        &self.options
    }

    pub fn progress(&self) -> &Arc<dyn ProgressReporter> {
        &self.progress
    }

    pub fn reader(&self) -> &ContentReader {
        &self.reader
    }

    /// Starts a lazy walk of `root`. The root is not validated.
    pub fn find(&self, root: impl Into<PathBuf>, cancellation: CancellationToken) -> FileSystemWalker {
        self.find_with(root, None, cancellation)
    }

    /// Like [`Search::find`], never yielding nor descending `ignored_directory`.
    pub fn find_with(
        &self,
        root: impl Into<PathBuf>,
        ignored_directory: Option<PathBuf>,
        cancellation: CancellationToken,
    ) -> FileSystemWalker {
        let root = root.into();
        tracing::debug!("Starting walk of {}", root.display());
        FileSystemWalker::new(
            root,
            Arc::clone(&self.filter),
            WalkOptions {
                recurse: self.options.recurse,
                target: self.options.target,
                ignored_directory,
            },
            self.reader.clone(),
            Arc::clone(&self.progress),
            cancellation,
        )
    }

    /// Collects every match below `root`.
    pub fn find_matches(&self, root: impl AsRef<Path>) -> CoreResult<Vec<FileMatch>> {
        let root = root.as_ref();
        validate_root(root)?;
        self.find(root, CancellationToken::new()).collect()
    }
}

/// Fails fast if `root` is missing or not a directory.
pub fn validate_root(root: &Path) -> CoreResult<()> {
    if !root.exists() {
        return Err(CoreError::NotFound(root.to_path_buf()));
    }
    if !root.is_dir() {
        return Err(CoreError::NotADirectory(root.to_path_buf()));
    }
    Ok(())
}
