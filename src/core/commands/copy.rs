//! Copying and moving matches into a destination directory.

use std::fs;
use std::path::{Path, PathBuf};

use crate::core::compare::{files_equal, FileCompareOptions};
use crate::core::error::{CoreError, CoreResult, IoResultExt};
use crate::core::file_match::FileMatch;
use crate::core::progress::OperationKind;
use crate::core::walker::DirectoryChange;
use crate::utils::paths::{nested_in, relative_to, resolve_path};

use super::conflict::{ConflictAction, ConflictInfo, ConflictResolver};
use super::{remove_entry, Command, CommandContext};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CopyOptions {
    pub destination: PathBuf,
    /// Put every match directly into `destination` instead of mirroring the source tree.
    pub flat: bool,
    /// Existing files equal on these properties are left alone.
    pub compare: FileCompareOptions,
}

/// Root and destination with symlinks and `..` resolved, set per root.
#[derive(Debug, Clone)]
struct Resolved {
    root: PathBuf,
    destination: PathBuf,
}

#[derive(Debug, Clone)]
struct Transfer {
    kind: OperationKind,
    options: CopyOptions,
    resolver: ConflictResolver,
    resolved: Option<Resolved>,
}

impl Transfer {
    fn destination_for(&self, source: &Path, root: &Path) -> PathBuf {
        if self.options.flat {
            match source.file_name() {
                Some(name) => self.options.destination.join(name),
                None => self.options.destination.clone(),
            }
        } else {
            self.options.destination.join(relative_to(source, root))
        }
    }

    fn begin_root(&mut self, root: &Path) -> CoreResult<()> {
        let resolved = Resolved {
            root: resolve_path(root).with_path(root)?,
            destination: resolve_path(&self.options.destination).with_path(&self.options.destination)?,
        };
        if resolved.destination == resolved.root {
            return Err(CoreError::Config(format!(
                "destination {} is the same as the source directory",
                root.display()
            )));
        }
        self.resolved = Some(resolved);
        Ok(())
    }

    /// The destination as the walker of `root` spells it, if it lies inside `root`.
    fn destination_in(&self, root: &Path) -> Option<PathBuf> {
        let resolved = self.resolved.as_ref()?;
        nested_in(root, &resolved.root, &resolved.destination)
    }

    /// `true` if writing `source` to `destination` would write into `source` itself.
    fn writes_into_source(&self, source: &Path, destination: &Path, root: &Path) -> bool {
        let Some(resolved) = self.resolved.as_ref() else {
            return destination.starts_with(source);
        };
        let source = resolved.root.join(relative_to(source, root));
        let destination = match destination.strip_prefix(&self.options.destination) {
            Ok(rest) => resolved.destination.join(rest),
            Err(_) => destination.to_path_buf(),
        };
        destination.starts_with(source)
    }

    fn execute(&mut self, file_match: &FileMatch, ctx: &mut CommandContext) -> CoreResult<()> {
        let source = file_match.path();
        let is_directory = file_match.is_directory();
        let mut destination = self.destination_for(source, ctx.root());

        if self.writes_into_source(source, &destination, ctx.root()) {
            tracing::debug!("Skipping {}, it contains the destination", source.display());
            return Ok(());
        }

        if let Ok(existing) = fs::symlink_metadata(&destination) {
            let conflict = match (is_directory, existing.is_dir()) {
                (true, true) => false,
                (true, false) | (false, true) => true,
                (false, false) => {
                    if files_equal(source, &destination, self.options.compare).with_path(source)? {
                        tracing::debug!("{} is up to date", destination.display());
                        return Ok(());
                    }
                    true
                }
            };

            if conflict {
                let info = ConflictInfo {
                    kind: self.kind,
                    source: source.to_path_buf(),
                    destination: destination.clone(),
                };
                match self.resolver.resolve(&info)? {
                    ConflictAction::Skip => {
                        tracing::debug!("Skipping {}, {} exists", source.display(), destination.display());
                        return Ok(());
                    }
                    ConflictAction::Overwrite => {
                        if !ctx.dry_run() {
                            remove_entry(&destination)?;
                        }
                    }
                    ConflictAction::WriteTo(suffixed) => destination = suffixed,
                }
            }
        }

        if !ctx.dry_run() {
            if let Some(parent) = destination.parent() {
                fs::create_dir_all(parent).with_path(parent)?;
            }
            let skip = self.destination_in(ctx.root()).unwrap_or_default();
            match self.kind {
                OperationKind::Move => move_entry(source, &destination, is_directory, &skip)?,
                _ => copy_entry(source, &destination, is_directory, &skip)?,
            }
        }

        if is_directory {
            ctx.notify(DirectoryChange::Detached(source.to_path_buf()));
        }

        tracing::debug!("{:?} {} -> {}", self.kind, source.display(), destination.display());
        ctx.processed(is_directory);
        ctx.report(self.kind, source, Some(destination), is_directory, None);
        Ok(())
    }
}

/// Copies a file, a symlink or a directory tree. Files that already exist
/// inside a target directory are kept.
pub(crate) fn copy_entry(source: &Path, destination: &Path, is_directory: bool, skip: &Path) -> CoreResult<()> {
    if is_directory {
        copy_directory(source, destination, skip)
    } else {
        copy_file(source, destination)
    }
}

fn copy_file(source: &Path, destination: &Path) -> CoreResult<()> {
    let metadata = fs::symlink_metadata(source).with_path(source)?;
    if metadata.file_type().is_symlink() {
        let target = fs::read_link(source).with_path(source)?;
        #[cfg(unix)]
        std::os::unix::fs::symlink(&target, destination).with_path(destination)?;
        #[cfg(not(unix))]
        {
            let _ = target;
            fs::copy(source, destination).with_path(source)?;
        }
        return Ok(());
    }
    fs::copy(source, destination).with_path(source)?;
    Ok(())
}

/// Copies a directory tree without recursion.
fn copy_directory(source: &Path, destination: &Path, skip: &Path) -> CoreResult<()> {
    let mut stack = vec![(source.to_path_buf(), destination.to_path_buf())];

    while let Some((from, to)) = stack.pop() {
        fs::create_dir_all(&to).with_path(&to)?;
        for entry in fs::read_dir(&from).with_path(&from)? {
            let entry = entry.with_path(&from)?;
            let path = entry.path();
            if path == skip {
                continue;
            }
            let target = to.join(entry.file_name());
            let file_type = entry.file_type().with_path(&path)?;
            if file_type.is_dir() {
                stack.push((path, target));
            } else if target.symlink_metadata().is_err() {
                copy_file(&path, &target)?;
            }
        }
    }
    Ok(())
}

fn move_entry(source: &Path, destination: &Path, is_directory: bool, skip: &Path) -> CoreResult<()> {
    match fs::rename(source, destination) {
        Ok(()) => Ok(()),
        Err(e) => {
            tracing::debug!("Rename of {} failed ({}), copying instead", source.display(), e);
            copy_entry(source, destination, is_directory, skip)?;
            remove_entry(source)
        }
    }
}

macro_rules! transfer_command {
    ($name:ident, $kind:expr) => {
        #[derive(Debug, Clone)]
        pub struct $name {
            transfer: Transfer,
        }

        impl $name {
            pub fn new(options: CopyOptions, resolver: ConflictResolver) -> Self {
                Self {
                    transfer: Transfer {
                        kind: $kind,
                        options,
                        resolver,
                        resolved: None,
                    },
                }
            }

            pub fn destination(&self) -> &Path {
                &self.transfer.options.destination
            }
        }

        impl Command for $name {
            fn kind(&self) -> OperationKind {
                $kind
            }

            fn begin_root(&mut self, ctx: &mut CommandContext) -> CoreResult<()> {
                self.transfer.begin_root(ctx.root())
            }

            fn ignored_directory(&self, root: &Path) -> Option<PathBuf> {
                self.transfer.destination_in(root)
            }

            fn execute_match(&mut self, file_match: &FileMatch, ctx: &mut CommandContext) -> CoreResult<()> {
                self.transfer.execute(file_match, ctx)
            }
        }
    };
}

transfer_command!(CopyCommand, OperationKind::Copy);
transfer_command!(MoveCommand, OperationKind::Move);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::commands::conflict::ConflictResolution;
    use crate::core::commands::{CommandOptions, CommandRunner};
    use crate::core::filter::{FileSystemFilter, SearchTarget};
    use crate::core::matcher::{Matcher, PatternOptions};
    use crate::core::name_part::NamePartKind;
    use crate::core::commands::conflict::{ConflictDialog, ConflictInfo, DialogResult};
    use crate::core::search::{Search, SearchOptions};
    use crate::core::telemetry::TerminationReason;
    use std::sync::{Arc, Mutex};
    use tempfile::tempdir;

    /// Answers with the scripted results in order and records each question.
    struct ScriptedDialog {
        answers: Mutex<Vec<DialogResult>>,
        asked: Mutex<Vec<PathBuf>>,
    }

    impl ScriptedDialog {
        fn new(answers: Vec<DialogResult>) -> Arc<Self> {
            Arc::new(Self {
                answers: Mutex::new(answers),
                asked: Mutex::new(Vec::new()),
            })
        }
    }

    impl ConflictDialog for ScriptedDialog {
        fn resolve(&self, info: &ConflictInfo) -> DialogResult {
            self.asked.lock().unwrap().push(info.destination.clone());
            self.answers.lock().unwrap().remove(0)
        }
    }

    fn runner(pattern: &str, target: SearchTarget) -> CommandRunner {
        let filter = FileSystemFilter::new().with_name(
            Matcher::from_pattern(pattern, &PatternOptions::default()).unwrap(),
            NamePartKind::Name,
        );
        CommandRunner::new(
            Search::new(filter, SearchOptions { target, ..Default::default() }),
            CommandOptions::default(),
        )
    }

    fn options(destination: PathBuf, flat: bool) -> CopyOptions {
        CopyOptions {
            destination,
            flat,
            compare: FileCompareOptions::empty(),
        }
    }

    fn resolver(resolution: ConflictResolution) -> ConflictResolver {
        ConflictResolver::new(resolution, None).unwrap()
    }

    #[test]
    fn test_copy_preserves_structure_and_skips_destination() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("a.txt"), "a").unwrap();
        fs::write(dir.path().join("sub/b.txt"), "b").unwrap();
        let out = dir.path().join("out");

        let mut copy = CopyCommand::new(options(out.clone(), false), resolver(ConflictResolution::Skip));
        let result = runner(r"\.txt$", SearchTarget::Files)
            .run(&mut copy, &[dir.path().to_path_buf()])
            .unwrap();

        assert_eq!(fs::read_to_string(out.join("a.txt")).unwrap(), "a");
        assert_eq!(fs::read_to_string(out.join("sub/b.txt")).unwrap(), "b");
        assert!(!out.join("out").exists());
        assert_eq!(result.telemetry.processed_file_count, 2);
        assert!(dir.path().join("a.txt").exists());
    }

    #[test]
    fn test_copy_with_suffix_keeps_existing_file() {
        let src = tempdir().unwrap();
        let dst = tempdir().unwrap();
        fs::write(src.path().join("a.txt"), "new").unwrap();
        fs::write(dst.path().join("a.txt"), "old").unwrap();

        let mut copy = CopyCommand::new(options(dst.path().to_path_buf(), true), resolver(ConflictResolution::Suffix));
        runner("a", SearchTarget::Files)
            .run(&mut copy, &[src.path().to_path_buf()])
            .unwrap();

        assert_eq!(fs::read_to_string(dst.path().join("a.txt")).unwrap(), "old");
        assert_eq!(fs::read_to_string(dst.path().join("a (2).txt")).unwrap(), "new");
    }

    #[test]
    fn test_equal_files_are_not_copied() {
        let src = tempdir().unwrap();
        let dst = tempdir().unwrap();
        fs::write(src.path().join("a.txt"), "same").unwrap();
        fs::write(dst.path().join("a.txt"), "same").unwrap();

        let mut copy = CopyCommand::new(
            CopyOptions {
                destination: dst.path().to_path_buf(),
                flat: true,
                compare: FileCompareOptions::CONTENT,
            },
            resolver(ConflictResolution::Suffix),
        );
        let result = runner("a", SearchTarget::Files)
            .run(&mut copy, &[src.path().to_path_buf()])
            .unwrap();
        assert_eq!(result.telemetry.processed_file_count, 0);
        assert!(!dst.path().join("a (2).txt").exists());
    }

    #[test]
    fn test_file_onto_directory_is_a_conflict() {
        let src = tempdir().unwrap();
        let dst = tempdir().unwrap();
        fs::write(src.path().join("x"), "file").unwrap();
        fs::create_dir(dst.path().join("x")).unwrap();

        let mut copy = CopyCommand::new(options(dst.path().to_path_buf(), true), resolver(ConflictResolution::Overwrite));
        runner("^x$", SearchTarget::Files)
            .run(&mut copy, &[src.path().to_path_buf()])
            .unwrap();
        assert_eq!(fs::read_to_string(dst.path().join("x")).unwrap(), "file");
    }

    #[test]
    fn test_move_directory_tree() {
        let src = tempdir().unwrap();
        let dst = tempdir().unwrap();
        fs::create_dir_all(src.path().join("pkg/deep")).unwrap();
        fs::write(src.path().join("pkg/deep/f.txt"), "f").unwrap();

        let mut mv = MoveCommand::new(options(dst.path().to_path_buf(), false), resolver(ConflictResolution::Skip));
        let result = runner("^pkg$", SearchTarget::Directories)
            .run(&mut mv, &[src.path().to_path_buf()])
            .unwrap();

        assert!(!src.path().join("pkg").exists());
        assert_eq!(fs::read_to_string(dst.path().join("pkg/deep/f.txt")).unwrap(), "f");
        assert_eq!(result.telemetry.processed_directory_count, 1);
    }

    #[test]
    fn test_copy_directory_without_recursion() {
        let src = tempdir().unwrap();
        let dst = tempdir().unwrap();
        let mut deep = src.path().join("d0");
        for i in 1..50 {
            deep = deep.join(format!("d{}", i));
        }
        fs::create_dir_all(&deep).unwrap();
        fs::write(deep.join("leaf.txt"), "leaf").unwrap();

        copy_entry(&src.path().join("d0"), &dst.path().join("d0"), true, dst.path()).unwrap();
        let copied = dst.path().join(deep.strip_prefix(src.path()).unwrap()).join("leaf.txt");
        assert_eq!(fs::read_to_string(copied).unwrap(), "leaf");
    }

    #[test]
    fn test_destination_equal_to_root_is_rejected() {
        let dir = tempdir().unwrap();
        let mut copy = CopyCommand::new(options(dir.path().to_path_buf(), false), resolver(ConflictResolution::Skip));
        let err = runner("x", SearchTarget::Files)
            .run(&mut copy, &[dir.path().to_path_buf()])
            .unwrap_err();
        assert!(matches!(err, CoreError::Config(_)));
    }

    #[test]
    fn test_nested_destination_written_with_dot_dot_is_skipped() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("x")).unwrap();
        fs::create_dir_all(dir.path().join("out")).unwrap();
        fs::write(dir.path().join("a.txt"), "a").unwrap();
        fs::write(dir.path().join("out/old.txt"), "old").unwrap();
        let destination = dir.path().join("x").join("..").join("out");

        let mut copy = CopyCommand::new(options(destination, false), resolver(ConflictResolution::Skip));
        let result = runner(r"\.txt$", SearchTarget::Files)
            .run(&mut copy, &[dir.path().to_path_buf()])
            .unwrap();

        assert_eq!(result.telemetry.processed_file_count, 1);
        assert_eq!(fs::read_to_string(dir.path().join("out/a.txt")).unwrap(), "a");
        assert!(!dir.path().join("out/out").exists());
        assert_eq!(fs::read_to_string(dir.path().join("out/old.txt")).unwrap(), "old");
    }

    #[test]
    fn test_ask_yes_to_all_overwrites_later_conflicts() {
        let src = tempdir().unwrap();
        let dst = tempdir().unwrap();
        for name in ["a.txt", "b.txt", "c.txt"] {
            fs::write(src.path().join(name), "new").unwrap();
            fs::write(dst.path().join(name), "old").unwrap();
        }

        let dialog = ScriptedDialog::new(vec![DialogResult::YesToAll]);
        let resolver = ConflictResolver::new(ConflictResolution::Ask, Some(dialog.clone())).unwrap();
        let mut copy = CopyCommand::new(options(dst.path().to_path_buf(), true), resolver);
        let result = runner(r"\.txt$", SearchTarget::Files)
            .run(&mut copy, &[src.path().to_path_buf()])
            .unwrap();

        for name in ["a.txt", "b.txt", "c.txt"] {
            assert_eq!(fs::read_to_string(dst.path().join(name)).unwrap(), "new");
        }
        assert_eq!(dialog.asked.lock().unwrap().as_slice(), [dst.path().join("a.txt")]);
        assert_eq!(result.telemetry.processed_file_count, 3);
        assert_eq!(result.termination_reason, TerminationReason::None);
    }

    #[test]
    fn test_ask_cancel_stops_the_run_and_keeps_finished_copies() {
        let src = tempdir().unwrap();
        let dst = tempdir().unwrap();
        for name in ["a.txt", "b.txt", "c.txt"] {
            fs::write(src.path().join(name), "new").unwrap();
        }
        fs::write(dst.path().join("b.txt"), "old").unwrap();

        let dialog = ScriptedDialog::new(vec![DialogResult::Cancel]);
        let resolver = ConflictResolver::new(ConflictResolution::Ask, Some(dialog)).unwrap();
        let mut copy = CopyCommand::new(options(dst.path().to_path_buf(), true), resolver);
        let result = runner(r"\.txt$", SearchTarget::Files)
            .run(&mut copy, &[src.path().to_path_buf()])
            .unwrap();

        assert_eq!(result.termination_reason, TerminationReason::Canceled);
        assert_eq!(result.telemetry.processed_file_count, 1);
        assert_eq!(fs::read_to_string(dst.path().join("a.txt")).unwrap(), "new");
        assert_eq!(fs::read_to_string(dst.path().join("b.txt")).unwrap(), "old");
        assert!(!dst.path().join("c.txt").exists());
    }
}
