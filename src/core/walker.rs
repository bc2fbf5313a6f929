//! Lazy breadth-first enumeration of a directory tree.
//!
//! [`FileSystemWalker`] is an explicit state machine: a queue of pending
//! directories, the materialized listing of the directory being expanded and
//! a slot holding the subdirectory that was just yielded. Each call to
//! `next` resumes where the previous one stopped, so a consumer that stops
//! pulling never causes an unexplored directory to be touched.
//!
//! Commands that rename, move or delete a yielded directory tell the walker
//! through [`FileSystemWalker::notify_directory_changed`] before pulling the
//! next match; the walker then rewrites or drops the affected paths.

use std::collections::VecDeque;
use std::fs::{self, Metadata};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use super::cancel::CancellationToken;
use super::content::ContentReader;
use super::error::{CoreError, CoreResult};
use super::file_match::FileMatch;
use super::filter::{FileEmptyOption, FileSystemFilter, SearchTarget};
use super::name_part::{NamePart, NamePartKind};
use super::progress::{ProgressEvent, ProgressReporter, SearchProgress, SearchProgressKind};
use super::properties::FileAttributes;
use super::telemetry::SearchTelemetry;

/// A change a command made to a directory the walker has already seen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirectoryChange {
    Renamed { from: PathBuf, to: PathBuf },
    /// Deleted, moved away or fully handled; the subtree must not be descended.
    Detached(PathBuf),
}

#[derive(Debug, Clone, Default)]
pub struct WalkOptions {
    pub recurse: bool,
    pub target: SearchTarget,
    /// A directory that is never yielded nor descended, e.g. a copy destination.
    pub ignored_directory: Option<PathBuf>,
}

/// Queue entry. `is_match` caches the directory filter verdict.
#[derive(Debug, Clone)]
struct Directory {
    path: PathBuf,
    is_match: Option<bool>,
}

#[derive(Debug)]
struct Subdirectory {
    path: PathBuf,
    is_symlink: bool,
}

#[derive(Debug)]
struct Listing {
    directory: Directory,
    files: VecDeque<PathBuf>,
    subdirectories: VecDeque<Subdirectory>,
}

pub struct FileSystemWalker {
    filter: Arc<FileSystemFilter>,
    options: WalkOptions,
    reader: ContentReader,
    progress: Arc<dyn ProgressReporter>,
    cancellation: CancellationToken,
    queue: VecDeque<Directory>,
    current: Option<Listing>,
    pending: Option<Directory>,
    telemetry: SearchTelemetry,
    started: Instant,
    finished: bool,
}

impl std::fmt::Debug for FileSystemWalker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileSystemWalker")
            .field("options", &self.options)
            .field("queue", &self.queue.len())
            .field("finished", &self.finished)
            .finish_non_exhaustive()
    }
}

impl FileSystemWalker {
    pub fn new(
        root: impl Into<PathBuf>,
        filter: Arc<FileSystemFilter>,
        options: WalkOptions,
        reader: ContentReader,
        progress: Arc<dyn ProgressReporter>,
        cancellation: CancellationToken,
    ) -> Self {
        let mut queue = VecDeque::new();
        queue.push_back(Directory {
            path: root.into(),
            is_match: None,
        });

        Self {
            filter,
            options,
            reader,
            progress,
            cancellation,
            queue,
            current: None,
            pending: None,
            telemetry: SearchTelemetry::default(),
            started: Instant::now(),
            finished: false,
        }
    }

    /// Counters collected so far, with the elapsed time of the walk.
    pub fn telemetry(&self) -> SearchTelemetry {
        let mut telemetry = self.telemetry.clone();
        telemetry.elapsed = self.started.elapsed();
        telemetry
    }

    pub fn notify_directory_changed(&mut self, change: DirectoryChange) {
        tracing::debug!("Directory changed during walk: {:?}", change);
        match change {
            DirectoryChange::Renamed { from, to } => {
                let rebase = |path: &mut PathBuf| {
                    if let Ok(rest) = path.strip_prefix(&from) {
                        *path = to.join(rest);
                    }
                };
                if let Some(pending) = self.pending.as_mut() {
                    rebase(&mut pending.path);
                }
                self.queue.iter_mut().for_each(|d| rebase(&mut d.path));
                if let Some(listing) = self.current.as_mut() {
                    rebase(&mut listing.directory.path);
                    listing.files.iter_mut().for_each(|p| rebase(p));
                    listing
                        .subdirectories
                        .iter_mut()
                        .for_each(|s| rebase(&mut s.path));
                }
            }
            DirectoryChange::Detached(path) => {
                if self
                    .pending
                    .as_ref()
                    .is_some_and(|d| d.path.starts_with(&path))
                {
                    self.pending = None;
                }
                self.queue.retain(|d| !d.path.starts_with(&path));
                if self
                    .current
                    .as_ref()
                    .is_some_and(|l| l.directory.path.starts_with(&path))
                {
                    self.current = None;
                }
            }
        }
    }

    fn step(&mut self) -> CoreResult<Option<FileMatch>> {
        if let Some(directory) = self.pending.take() {
            self.queue.push_back(directory);
        }

        loop {
            self.cancellation.check()?;

            if self.current.is_none() {
                match self.queue.pop_front() {
                    Some(directory) => {
                        let listing = self.open_directory(directory);
                        self.current = Some(listing);
                        continue;
                    }
                    None => return Ok(None),
                }
            }

            let next_file = self.current.as_mut().and_then(|l| l.files.pop_front());
            if let Some(path) = next_file {
                if let Some(file_match) = self.match_file(path) {
                    return Ok(Some(file_match));
                }
                continue;
            }

            let next_directory = self
                .current
                .as_mut()
                .and_then(|l| l.subdirectories.pop_front());
            if let Some(subdirectory) = next_directory {
                if let Some(file_match) = self.visit_subdirectory(subdirectory) {
                    return Ok(Some(file_match));
                }
                continue;
            }

            self.current = None;
        }
    }

    fn report(&self, path: &Path, kind: SearchProgressKind, error: Option<CoreError>) {
        if let Some(e) = &error {
            tracing::warn!("Skipping {}: {}", path.display(), e);
        }
        self.progress.report(ProgressEvent::Search(SearchProgress {
            path: path.to_path_buf(),
            kind,
            error,
        }));
    }

    /// Lists a directory. Enumeration failures are reported and treated as an
    /// empty directory.
    fn open_directory(&mut self, directory: Directory) -> Listing {
        self.telemetry.searched_directory_count += 1;
        self.report(&directory.path, SearchProgressKind::SearchedDirectory, None);

        let mut listing = Listing {
            directory,
            files: VecDeque::new(),
            subdirectories: VecDeque::new(),
        };

        let collect_files = self.options.target.includes_files()
            && listing.directory.is_match != Some(false);
        let collect_directories = self.options.recurse || self.options.target.includes_directories();
        if !collect_files && !collect_directories {
            return listing;
        }

        let read_dir = match fs::read_dir(&listing.directory.path) {
            Ok(read_dir) => read_dir,
            Err(e) => {
                let error = CoreError::io(e, &listing.directory.path);
                self.report(
                    &listing.directory.path,
                    SearchProgressKind::SearchedDirectory,
                    Some(error),
                );
                return listing;
            }
        };

        let mut files = Vec::new();
        let mut subdirectories = Vec::new();
        for entry in read_dir {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    let error = CoreError::io(e, &listing.directory.path);
                    self.report(
                        &listing.directory.path,
                        SearchProgressKind::SearchedDirectory,
                        Some(error),
                    );
                    continue;
                }
            };
            let path = entry.path();
            let file_type = match entry.file_type() {
                Ok(file_type) => file_type,
                Err(e) => {
                    self.report(&path, SearchProgressKind::File, Some(CoreError::io(e, &path)));
                    continue;
                }
            };

            let (is_dir, is_symlink) = if file_type.is_symlink() {
                (fs::metadata(&path).map(|m| m.is_dir()).unwrap_or(false), true)
            } else {
                (file_type.is_dir(), false)
            };

            if is_dir {
                if collect_directories {
                    subdirectories.push(Subdirectory { path, is_symlink });
                }
            } else if collect_files {
                files.push(path);
            }
        }

        files.sort();
        subdirectories.sort_by(|a, b| a.path.cmp(&b.path));
        listing.files = files.into();
        listing.subdirectories = subdirectories.into();
        listing
    }

    fn load_metadata(&self, path: &Path, kind: SearchProgressKind) -> Option<Metadata> {
        match fs::symlink_metadata(path) {
            Ok(metadata) => Some(metadata),
            Err(e) => {
                self.report(path, kind, Some(CoreError::io(e, path)));
                None
            }
        }
    }

    /// Attribute and property checks; `None` means the entry is rejected or unreadable.
    fn check_metadata(
        &self,
        path: &Path,
        is_directory: bool,
        kind: SearchProgressKind,
    ) -> Option<Option<Metadata>> {
        if !self.filter.needs_metadata() {
            return Some(None);
        }

        let metadata = self.load_metadata(path, kind)?;
        if !self
            .filter
            .accepts_attributes(FileAttributes::from_metadata(path, &metadata))
        {
            return None;
        }

        if !self.filter.properties.is_empty() {
            let resolved = if metadata.file_type().is_symlink() {
                fs::metadata(path).ok()
            } else {
                Some(metadata.clone())
            };
            match resolved {
                Some(resolved) if self.filter.properties.matches(&resolved, is_directory) => {}
                _ => return None,
            }
        }

        Some(Some(metadata))
    }

    fn match_file(&mut self, path: PathBuf) -> Option<FileMatch> {
        self.telemetry.file_count += 1;
        self.report(&path, SearchProgressKind::File, None);

        let filter = Arc::clone(&self.filter);
        let path_text = path.to_string_lossy().into_owned();

        if let Some(extension) = &filter.extension {
            let part = NamePart::from_file(path_text.as_str(), NamePartKind::Extension);
            extension.find(part.as_str())?;
        }

        let name_part = NamePart::from_file(path_text, filter.name_part);
        let name_match = match &filter.name {
            Some(name) => Some(name.find(name_part.as_str())?),
            None => None,
        };

        let metadata = self.check_metadata(&path, false, SearchProgressKind::File)?;

        let mut file_match = FileMatch::new(path.clone(), name_part, name_match, false).with_metadata(metadata);

        if filter.needs_content() {
            let probe = match self.reader.read(&path, filter.content.is_some()) {
                Ok(probe) => probe,
                Err(e) => {
                    self.report(&path, SearchProgressKind::File, Some(e));
                    return None;
                }
            };

            if !filter.empty.accepts(probe.is_empty) {
                return None;
            }

            let content_match = match (&filter.content, &probe.content) {
                (Some(content), Some(text)) => Some(content.find(&text.text)?),
                _ => None,
            };
            let content = if filter.content.is_some() {
                probe.content
            } else {
                None
            };
            file_match = file_match.with_content(content, content_match);
        }

        self.telemetry.matching_file_count += 1;
        self.telemetry.files_total_size += file_match.metadata().map_or(0, |m| m.len());
        Some(file_match)
    }

    fn visit_subdirectory(&mut self, subdirectory: Subdirectory) -> Option<FileMatch> {
        let Subdirectory { path, is_symlink } = subdirectory;
        self.telemetry.directory_count += 1;
        self.report(&path, SearchProgressKind::Directory, None);

        if self.options.ignored_directory.as_deref() == Some(path.as_path()) {
            return None;
        }

        if !self.filter.attributes_to_skip.is_empty() {
            let metadata = self.load_metadata(&path, SearchProgressKind::Directory)?;
            let attributes = FileAttributes::from_metadata(&path, &metadata);
            if attributes.intersects(self.filter.attributes_to_skip) {
                return None;
            }
        }

        let parent_match = self
            .current
            .as_ref()
            .and_then(|l| l.directory.is_match);

        let is_match = match &self.filter.directory {
            None => None,
            Some(directory) if directory.is_negative() => {
                let part = NamePart::from_directory(path.to_string_lossy(), self.filter.directory_part);
                if !directory.is_match(part.as_str()) {
                    tracing::debug!("Pruning {}", path.display());
                    return None;
                }
                Some(true)
            }
            Some(_) if parent_match == Some(true) => Some(true),
            Some(directory) => {
                let part = NamePart::from_directory(path.to_string_lossy(), self.filter.directory_part);
                Some(directory.is_match(part.as_str()))
            }
        };

        let entry = Directory {
            path: path.clone(),
            is_match,
        };
        let descend = self.options.recurse && !is_symlink;

        let yielded = if self.options.target.includes_directories() && is_match != Some(false) {
            self.match_directory(&path)
        } else {
            None
        };

        if descend {
            if yielded.is_some() {
                self.pending = Some(entry);
            } else {
                self.queue.push_back(entry);
            }
        }

        yielded
    }

    fn match_directory(&mut self, path: &Path) -> Option<FileMatch> {
        let filter = Arc::clone(&self.filter);
        if filter.content.is_some() {
            return None;
        }

        if let Some(extension) = &filter.extension {
            extension.find("")?;
        }

        let name_part = NamePart::from_directory(path.to_string_lossy(), filter.name_part);
        let name_match = match &filter.name {
            Some(name) => Some(name.find(name_part.as_str())?),
            None => None,
        };

        let metadata = self.check_metadata(path, true, SearchProgressKind::Directory)?;

        if filter.empty != FileEmptyOption::None {
            let is_empty = match fs::read_dir(path) {
                Ok(mut entries) => entries.next().is_none(),
                Err(e) => {
                    self.report(path, SearchProgressKind::Directory, Some(CoreError::io(e, path)));
                    return None;
                }
            };
            if !filter.empty.accepts(is_empty) {
                return None;
            }
        }

        self.telemetry.matching_directory_count += 1;
        Some(FileMatch::new(path.to_path_buf(), name_part, name_match, true).with_metadata(metadata))
    }
}

impl Iterator for FileSystemWalker {
    type Item = CoreResult<FileMatch>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        match self.step() {
            Ok(Some(file_match)) => Some(Ok(file_match)),
            Ok(None) => {
                self.finished = true;
                self.telemetry.elapsed = self.started.elapsed();
                None
            }
            Err(e) => {
                self.finished = true;
                self.telemetry.elapsed = self.started.elapsed();
                Some(Err(e))
            }
        }
    }
}
