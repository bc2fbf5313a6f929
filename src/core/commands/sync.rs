//! Two-way synchronisation of a pair of directories.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::core::compare::{files_equal, FileCompareOptions};
use crate::core::error::{CoreError, CoreResult, IoResultExt};
use crate::core::file_match::FileMatch;
use crate::core::progress::OperationKind;
use crate::core::walker::DirectoryChange;
use crate::utils::paths::relative_to;

use super::conflict::{ConflictDialog, ConflictInfo, ConflictResolution, ConflictResolver};
use super::copy::copy_entry;
use super::{remove_entry, Command, CommandContext};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SyncConflictResolution {
    #[default]
    FirstWins,
    SecondWins,
    /// Yes keeps the first directory's entry, No leaves both alone.
    Ask,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pass {
    First,
    Second,
}

/// Makes two directories contain the same entries.
///
/// Run it over `[first, second]` (see [`SyncCommand::roots`]). The first pass
/// copies what the second directory lacks and resolves differences, the
/// second pass copies back what the first directory lacks.
#[derive(Debug, Clone)]
pub struct SyncCommand {
    first: PathBuf,
    second: PathBuf,
    resolution: SyncConflictResolution,
    compare: FileCompareOptions,
    resolver: Option<ConflictResolver>,
    pass: Pass,
}

impl SyncCommand {
    pub fn new(
        first: impl Into<PathBuf>,
        second: impl Into<PathBuf>,
        resolution: SyncConflictResolution,
        compare: FileCompareOptions,
        dialog: Option<Arc<dyn ConflictDialog>>,
    ) -> CoreResult<Self> {
        let resolver = match resolution {
            SyncConflictResolution::Ask => Some(ConflictResolver::new(ConflictResolution::Ask, dialog)?),
            _ => None,
        };
        Ok(Self {
            first: first.into(),
            second: second.into(),
            resolution,
            compare,
            resolver,
            pass: Pass::First,
        })
    }

    pub fn roots(&self) -> [PathBuf; 2] {
        [self.first.clone(), self.second.clone()]
    }

    /// `true` if the entry of the first directory should replace the one in the second.
    fn first_wins(&mut self, first: &Path, second: &Path) -> CoreResult<Option<bool>> {
        match self.resolution {
            SyncConflictResolution::FirstWins => Ok(Some(true)),
            SyncConflictResolution::SecondWins => Ok(Some(false)),
            SyncConflictResolution::Ask => {
                let info = ConflictInfo {
                    kind: OperationKind::Sync,
                    source: first.to_path_buf(),
                    destination: second.to_path_buf(),
                };
                match self.resolver.as_mut() {
                    Some(resolver) => Ok(resolver.confirm(&info)?.then_some(true)),
                    None => Ok(None),
                }
            }
        }
    }

    fn is_conflict(&self, source: &Path, source_is_dir: bool, counterpart: &Path, counterpart_is_dir: bool) -> CoreResult<bool> {
        Ok(match (source_is_dir, counterpart_is_dir) {
            (true, true) => false,
            (false, false) => !files_equal(source, counterpart, self.compare).with_path(source)?,
            _ => true,
        })
    }
}

/// Replaces `loser` with a copy of `winner`.
fn overwrite(winner: &Path, loser: &Path, winner_is_dir: bool, dry_run: bool) -> CoreResult<()> {
    if dry_run {
        return Ok(());
    }
    if loser.symlink_metadata().is_ok() {
        remove_entry(loser)?;
    }
    copy_entry(winner, loser, winner_is_dir, Path::new(""))
}

impl Command for SyncCommand {
    fn kind(&self) -> OperationKind {
        OperationKind::Sync
    }

    fn begin_root(&mut self, ctx: &mut CommandContext) -> CoreResult<()> {
        self.pass = if ctx.root() == self.first {
            Pass::First
        } else if ctx.root() == self.second {
            Pass::Second
        } else {
            return Err(CoreError::Config(format!(
                "{} is not one of the synchronised directories",
                ctx.root().display()
            )));
        };
        tracing::info!("Sync pass {:?} over {}", self.pass, ctx.root().display());
        Ok(())
    }

    fn ignored_directory(&self, root: &Path) -> Option<PathBuf> {
        if root == self.first {
            Some(self.second.clone())
        } else {
            Some(self.first.clone())
        }
    }

    fn execute_match(&mut self, file_match: &FileMatch, ctx: &mut CommandContext) -> CoreResult<()> {
        let source = file_match.path();
        let is_directory = file_match.is_directory();
        let other_root = match self.pass {
            Pass::First => &self.second,
            Pass::Second => &self.first,
        };
        let counterpart = other_root.join(relative_to(source, ctx.root()));
        let dry_run = ctx.dry_run();

        let existing = fs::symlink_metadata(&counterpart).ok();
        let new_path = match existing {
            None => {
                if !dry_run {
                    if is_directory {
                        fs::create_dir_all(&counterpart).with_path(&counterpart)?;
                    } else {
                        if let Some(parent) = counterpart.parent() {
                            fs::create_dir_all(parent).with_path(parent)?;
                        }
                        copy_entry(source, &counterpart, false, Path::new(""))?;
                    }
                }
                counterpart
            }
            Some(_) if self.pass == Pass::Second => return Ok(()),
            Some(metadata) => {
                if !self.is_conflict(source, is_directory, &counterpart, metadata.is_dir())? {
                    return Ok(());
                }
                match self.first_wins(source, &counterpart)? {
                    None => {
                        tracing::debug!("Leaving {} and {} as they are", source.display(), counterpart.display());
                        return Ok(());
                    }
                    Some(true) => {
                        overwrite(source, &counterpart, is_directory, dry_run)?;
                        if is_directory {
                            ctx.notify(DirectoryChange::Detached(source.to_path_buf()));
                        }
                        counterpart
                    }
                    Some(false) => {
                        overwrite(&counterpart, source, metadata.is_dir(), dry_run)?;
                        if is_directory {
                            ctx.notify(DirectoryChange::Detached(source.to_path_buf()));
                        }
                        ctx.processed(is_directory);
                        ctx.report(OperationKind::Sync, &counterpart, Some(source.to_path_buf()), metadata.is_dir(), None);
                        return Ok(());
                    }
                }
            }
        };

        tracing::debug!("Synchronised {} -> {}", source.display(), new_path.display());
        ctx.processed(is_directory);
        ctx.report(OperationKind::Sync, source, Some(new_path), is_directory, None);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::commands::conflict::DialogResult;
    use crate::core::commands::{CommandOptions, CommandRunner};
    use crate::core::filter::{FileSystemFilter, SearchTarget};
    use crate::core::search::{Search, SearchOptions};
    use tempfile::tempdir;

    fn runner() -> CommandRunner {
        let options = SearchOptions {
            target: SearchTarget::All,
            ..Default::default()
        };
        CommandRunner::new(Search::new(FileSystemFilter::new(), options), CommandOptions::default())
    }

    struct Always(DialogResult);

    impl ConflictDialog for Always {
        fn resolve(&self, _info: &ConflictInfo) -> DialogResult {
            self.0
        }
    }

    #[test]
    fn test_missing_entries_are_copied_both_ways() {
        let a = tempdir().unwrap();
        let b = tempdir().unwrap();
        fs::create_dir_all(a.path().join("only_a/nested")).unwrap();
        fs::write(a.path().join("only_a/nested/x.txt"), "x").unwrap();
        fs::write(b.path().join("only_b.txt"), "y").unwrap();

        let mut sync = SyncCommand::new(a.path(), b.path(), SyncConflictResolution::FirstWins, FileCompareOptions::CONTENT, None).unwrap();
        let roots = sync.roots();
        let result = runner().run(&mut sync, &roots).unwrap();

        assert_eq!(fs::read_to_string(b.path().join("only_a/nested/x.txt")).unwrap(), "x");
        assert_eq!(fs::read_to_string(a.path().join("only_b.txt")).unwrap(), "y");
        assert_eq!(result.telemetry.processed_file_count, 2);
        assert_eq!(result.telemetry.processed_directory_count, 2);
        assert_eq!(result.telemetry.searched_directory_count, 3 + 3);
    }

    #[test]
    fn test_differences_resolved_by_policy() {
        let a = tempdir().unwrap();
        let b = tempdir().unwrap();
        fs::write(a.path().join("f.txt"), "first").unwrap();
        fs::write(b.path().join("f.txt"), "second").unwrap();
        fs::write(a.path().join("same.txt"), "same").unwrap();
        fs::write(b.path().join("same.txt"), "same").unwrap();

        let mut sync = SyncCommand::new(a.path(), b.path(), SyncConflictResolution::SecondWins, FileCompareOptions::CONTENT, None).unwrap();
        let roots = sync.roots();
        let result = runner().run(&mut sync, &roots).unwrap();

        assert_eq!(fs::read_to_string(a.path().join("f.txt")).unwrap(), "second");
        assert_eq!(result.telemetry.processed_file_count, 1);
    }

    #[test]
    fn test_ask_no_leaves_both_sides() {
        let a = tempdir().unwrap();
        let b = tempdir().unwrap();
        fs::write(a.path().join("f.txt"), "first").unwrap();
        fs::write(b.path().join("f.txt"), "second").unwrap();

        let mut sync = SyncCommand::new(
            a.path(),
            b.path(),
            SyncConflictResolution::Ask,
            FileCompareOptions::CONTENT,
            Some(Arc::new(Always(DialogResult::No))),
        )
        .unwrap();
        let roots = sync.roots();
        runner().run(&mut sync, &roots).unwrap();
        assert_eq!(fs::read_to_string(a.path().join("f.txt")).unwrap(), "first");
        assert_eq!(fs::read_to_string(b.path().join("f.txt")).unwrap(), "second");
    }

    #[test]
    fn test_ask_yes_copies_first_over_second() {
        let a = tempdir().unwrap();
        let b = tempdir().unwrap();
        fs::write(a.path().join("f.txt"), "first").unwrap();
        fs::write(b.path().join("f.txt"), "second").unwrap();

        let mut sync = SyncCommand::new(
            a.path(),
            b.path(),
            SyncConflictResolution::Ask,
            FileCompareOptions::CONTENT,
            Some(Arc::new(Always(DialogResult::Yes))),
        )
        .unwrap();
        let roots = sync.roots();
        let result = runner().run(&mut sync, &roots).unwrap();
        assert_eq!(fs::read_to_string(b.path().join("f.txt")).unwrap(), "first");
        assert_eq!(result.telemetry.processed_file_count, 1);
    }

    #[test]
    fn test_file_replaces_directory_when_first_wins() {
        let a = tempdir().unwrap();
        let b = tempdir().unwrap();
        fs::write(a.path().join("node"), "file").unwrap();
        fs::create_dir_all(b.path().join("node/child")).unwrap();

        let mut sync = SyncCommand::new(a.path(), b.path(), SyncConflictResolution::FirstWins, FileCompareOptions::SIZE, None).unwrap();
        let roots = sync.roots();
        runner().run(&mut sync, &roots).unwrap();
        assert_eq!(fs::read_to_string(b.path().join("node")).unwrap(), "file");
    }
}
