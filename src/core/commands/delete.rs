use std::fs::{self, OpenOptions};
use std::path::Path;

use crate::core::error::{CoreResult, IoResultExt};
use crate::core::file_match::FileMatch;
use crate::core::progress::OperationKind;
use crate::core::walker::DirectoryChange;

use super::{remove_entry, Command, CommandContext};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeleteOptions {
    /// Empty files and directories instead of removing them.
    pub content_only: bool,
    /// With `content_only`, also drop a file's byte order mark.
    pub including_bom: bool,
    /// With `content_only` on a directory, remove only the files directly inside it.
    pub files_only: bool,
    /// With `content_only` on a directory, remove only its subdirectories.
    pub directories_only: bool,
}

#[derive(Debug, Clone, Default)]
pub struct DeleteCommand {
    options: DeleteOptions,
}

impl DeleteCommand {
    pub fn new(options: DeleteOptions) -> Self {
        Self { options }
    }

    fn truncate(&self, path: &Path, ctx: &CommandContext) -> CoreResult<()> {
        let keep = if self.options.including_bom {
            0
        } else {
            ctx.reader().preamble_len(path)?
        };
        let file = OpenOptions::new().write(true).open(path).with_path(path)?;
        file.set_len(keep as u64).with_path(path)
    }

    fn clear_directory(&self, path: &Path) -> CoreResult<()> {
        for entry in fs::read_dir(path).with_path(path)? {
            let entry = entry.with_path(path)?;
            let child = entry.path();
            let is_dir = entry.file_type().with_path(&child)?.is_dir();
            if is_dir && !self.options.files_only {
                fs::remove_dir_all(&child).with_path(&child)?;
            } else if !is_dir && !self.options.directories_only {
                fs::remove_file(&child).with_path(&child)?;
            }
        }
        Ok(())
    }
}

impl Command for DeleteCommand {
    fn kind(&self) -> OperationKind {
        OperationKind::Delete
    }

    fn execute_match(&mut self, file_match: &FileMatch, ctx: &mut CommandContext) -> CoreResult<()> {
        let path = file_match.path();
        let is_directory = file_match.is_directory();

        if !ctx.dry_run() {
            match (self.options.content_only, is_directory) {
                (true, true) => self.clear_directory(path)?,
                (true, false) => self.truncate(path, ctx)?,
                (false, _) => remove_entry(path)?,
            }
        }

        if is_directory {
            ctx.notify(DirectoryChange::Detached(path.to_path_buf()));
        }

        tracing::debug!("Deleted {}", path.display());
        ctx.processed(is_directory);
        ctx.report(OperationKind::Delete, path, None, is_directory, None);
        Ok(())
    }
}
