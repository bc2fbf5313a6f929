//! Commands that consume the match stream and act on every match.
//!
//! [`CommandRunner`] owns the shared driving loop: validating roots, walking
//! them, honouring the match cap and cancellation, classifying per-match
//! errors and forwarding directory changes to the walker.

pub mod conflict;
pub mod copy;
pub mod delete;
pub mod find;
pub mod rename;
pub mod replace;
pub mod sync;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;

use super::cancel::CancellationToken;
use super::content::ContentReader;
use super::error::{CoreError, CoreResult, ErrorKind};
use super::file_match::FileMatch;
use super::filter::FileSystemFilter;
use super::progress::{OperationKind, OperationProgress, ProgressEvent, ProgressReporter};
use super::search::{validate_root, Search};
use super::telemetry::{SearchTelemetry, TerminationReason};
use super::walker::DirectoryChange;

pub use conflict::{
    next_available_path, ConflictAction, ConflictDialog, ConflictInfo, ConflictResolution,
    ConflictResolver, DialogResult,
};
pub use copy::{CopyCommand, CopyOptions, MoveCommand};
pub use delete::{DeleteCommand, DeleteOptions};
pub use find::FindCommand;
pub use rename::RenameCommand;
pub use replace::ReplaceCommand;
pub use sync::{SyncCommand, SyncConflictResolution};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommandOptions {
    pub dry_run: bool,
    /// Stop after this many matches.
    pub max_matching_files: Option<usize>,
}

/// State shared between the runner and a command for one run.
pub struct CommandContext {
    pub telemetry: SearchTelemetry,
    pub termination_reason: TerminationReason,
    dry_run: bool,
    search: Search,
    cancellation: CancellationToken,
    root: PathBuf,
    pending_change: Option<DirectoryChange>,
}

impl CommandContext {
    fn new(search: Search, dry_run: bool, cancellation: CancellationToken) -> Self {
        Self {
            telemetry: SearchTelemetry::default(),
            termination_reason: TerminationReason::None,
            dry_run,
            search,
            cancellation,
            root: PathBuf::new(),
            pending_change: None,
        }
    }

    pub fn dry_run(&self) -> bool {
        self.dry_run
    }

    pub fn filter(&self) -> &FileSystemFilter {
        self.search.filter()
    }

    pub fn search(&self) -> &Search {
        &self.search
    }

    pub fn reader(&self) -> &ContentReader {
        self.search.reader()
    }

    pub fn progress(&self) -> &Arc<dyn ProgressReporter> {
        self.search.progress()
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    /// The root directory currently being walked.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Queues a directory change for the walker; applied before the next match is pulled.
    pub fn notify(&mut self, change: DirectoryChange) {
        self.pending_change = Some(change);
    }

    pub fn processed(&mut self, is_directory: bool) {
        if is_directory {
            self.telemetry.processed_directory_count += 1;
        } else {
            self.telemetry.processed_file_count += 1;
        }
    }

    pub fn report(
        &self,
        kind: OperationKind,
        path: &Path,
        new_path: Option<PathBuf>,
        is_directory: bool,
        error: Option<CoreError>,
    ) {
        self.progress().report(ProgressEvent::Operation(OperationProgress {
            path: path.to_path_buf(),
            new_path,
            is_directory,
            kind,
            dry_run: self.dry_run,
            error,
        }));
    }
}

/// An action performed once per match.
pub trait Command {
    fn kind(&self) -> OperationKind;

    /// Checks the configuration before any root is walked.
    fn validate(&self, _search: &Search) -> CoreResult<()> {
        Ok(())
    }

    /// Called before `root` is walked.
    fn begin_root(&mut self, _ctx: &mut CommandContext) -> CoreResult<()> {
        Ok(())
    }

    /// A directory the walker must leave alone, e.g. a destination inside the root.
    fn ignored_directory(&self, _root: &Path) -> Option<PathBuf> {
        None
    }

    fn execute_match(&mut self, file_match: &FileMatch, ctx: &mut CommandContext) -> CoreResult<()>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CommandResult {
    pub telemetry: SearchTelemetry,
    pub termination_reason: TerminationReason,
}

/// Drives a [`Command`] over the matches of a [`Search`].
#[derive(Debug, Clone)]
pub struct CommandRunner {
    search: Search,
    options: CommandOptions,
    cancellation: CancellationToken,
}

impl CommandRunner {
    pub fn new(search: Search, options: CommandOptions) -> Self {
        Self {
            search,
            options,
            cancellation: CancellationToken::new(),
        }
    }

    pub fn with_cancellation(mut self, cancellation: CancellationToken) -> Self {
        self.cancellation = cancellation;
        self
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    /// Runs `command` over every root.
    ///
    /// Recoverable per-match failures are reported and skipped. Cancellation
    /// ends the run with [`TerminationReason::Canceled`]; any other error
    /// aborts it.
    pub fn run<C: Command + ?Sized>(&self, command: &mut C, roots: &[PathBuf]) -> CoreResult<CommandResult> {
        for root in roots {
            validate_root(root)?;
        }
        command.validate(&self.search)?;

        let started = Instant::now();
        let kind = command.kind();
        let mut ctx = CommandContext::new(self.search.clone(), self.options.dry_run, self.cancellation.clone());
        let mut matched = 0usize;

        tracing::info!("{:?} started on {} root(s){}", kind, roots.len(), if ctx.dry_run { " (dry run)" } else { "" });

        'roots: for root in roots {
            ctx.root = root.clone();
            if let Err(e) = command.begin_root(&mut ctx) {
                if e.kind() == ErrorKind::Cancelled {
                    ctx.termination_reason = TerminationReason::Canceled;
                    break;
                }
                return Err(e);
            }

            let mut walker = self.search.find_with(
                root.clone(),
                command.ignored_directory(root),
                self.cancellation.clone(),
            );

            loop {
                let file_match = match walker.next() {
                    None => break,
                    Some(Ok(file_match)) => file_match,
                    Some(Err(e)) if e.kind() == ErrorKind::Cancelled => {
                        ctx.termination_reason = TerminationReason::Canceled;
                        ctx.telemetry.add(&walker.telemetry());
                        break 'roots;
                    }
                    Some(Err(e)) => {
                        tracing::error!("{:?} aborted: {}", kind, e);
                        return Err(e);
                    }
                };

                matched += 1;
                match command.execute_match(&file_match, &mut ctx) {
                    Ok(()) => {}
                    Err(e) => match e.kind() {
                        ErrorKind::Recoverable => {
                            tracing::warn!("{:?} failed for {}: {}", kind, file_match.path().display(), e);
                            ctx.report(kind, file_match.path(), None, file_match.is_directory(), Some(e));
                        }
                        ErrorKind::Cancelled => {
                            ctx.termination_reason = TerminationReason::Canceled;
                            ctx.telemetry.add(&walker.telemetry());
                            break 'roots;
                        }
                        ErrorKind::Fatal => {
                            tracing::error!("{:?} aborted: {}", kind, e);
                            return Err(e);
                        }
                    },
                }

                if let Some(change) = ctx.pending_change.take() {
                    walker.notify_directory_changed(change);
                }

                if self.options.max_matching_files.is_some_and(|max| matched >= max) {
                    ctx.termination_reason = TerminationReason::MaxReached;
                    ctx.telemetry.add(&walker.telemetry());
                    break 'roots;
                }
            }

            ctx.telemetry.add(&walker.telemetry());
        }

        ctx.telemetry.elapsed = started.elapsed();
        tracing::info!(
            "{:?} finished: {} matching, {} processed, {} searched directories in {:?} ({:?})",
            kind,
            ctx.telemetry.matching_count(),
            ctx.telemetry.processed_count(),
            ctx.telemetry.searched_directory_count,
            ctx.telemetry.elapsed,
            ctx.termination_reason,
        );

        Ok(CommandResult {
            telemetry: ctx.telemetry,
            termination_reason: ctx.termination_reason,
        })
    }
}

/// Removes a file, a symlink or a whole directory tree.
pub(crate) fn remove_entry(path: &Path) -> CoreResult<()> {
    use super::error::IoResultExt;
    let metadata = std::fs::symlink_metadata(path).with_path(path)?;
    if metadata.is_dir() {
        std::fs::remove_dir_all(path).with_path(path)
    } else {
        std::fs::remove_file(path).with_path(path)
    }
}
