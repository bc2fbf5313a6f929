use std::fs;
use std::path::PathBuf;

use crate::core::error::{CoreError, CoreResult, IoResultExt};
use crate::core::file_match::FileMatch;
use crate::core::name_part::NamePartKind;
use crate::core::progress::OperationKind;
use crate::core::replace::Replacer;
use crate::core::search::Search;
use crate::core::walker::DirectoryChange;
use crate::utils::paths::is_valid_file_name;

use super::conflict::{ConflictAction, ConflictInfo, ConflictResolver};
use super::{remove_entry, Command, CommandContext};

/// Renames matches by replacing the captures of the name filter within the matched name part.
#[derive(Debug, Clone)]
pub struct RenameCommand {
    replacer: Replacer,
    resolver: ConflictResolver,
}

impl RenameCommand {
    pub fn new(replacer: Replacer, resolver: ConflictResolver) -> Self {
        Self { replacer, resolver }
    }

    /// New path for `file_match` and the number of replaced captures, `None`
    /// if the name would not change.
    ///
    /// Only the lossy text of a name is matched, so an entry whose affected
    /// part is not valid UTF-8 cannot be renamed.
    fn new_path(&self, file_match: &FileMatch, ctx: &CommandContext) -> CoreResult<Option<(PathBuf, usize)>> {
        let Some(matcher) = ctx.filter().name.as_ref() else {
            return Ok(None);
        };
        let part = file_match.name_part();
        let replaced = self.replacer.replace(matcher, part.as_str());
        if replaced.is_unchanged(part.as_str()) {
            return Ok(None);
        }

        let path = file_match.path();
        let invalid = |name: String| CoreError::InvalidName {
            name,
            path: path.to_path_buf(),
        };

        let (new_path, new_name) = if part.kind() == NamePartKind::FullName {
            if path.to_str().is_none() {
                return Err(invalid(path.to_string_lossy().into_owned()));
            }
            let text = part.path();
            let new_text = format!("{}{}{}", &text[..part.start()], replaced.text, &text[part.end()..]);
            if new_text.ends_with(std::path::is_separator) {
                return Err(CoreError::EmptyName(path.to_path_buf()));
            }
            let new_path = PathBuf::from(new_text);
            let new_name = new_path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            (new_path, new_name)
        } else {
            if replaced.text.contains(|c| c == '/' || c == '\0' || std::path::is_separator(c)) {
                return Err(invalid(replaced.text));
            }
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                let lossy = path.file_name().map(|n| n.to_string_lossy().into_owned());
                return Err(invalid(lossy.unwrap_or_default()));
            };
            // The part lies within the file name, which ends the path text.
            let offset = part.path().len().saturating_sub(name.len());
            let prefix = part.start().checked_sub(offset).and_then(|start| name.get(..start));
            let suffix = part.end().checked_sub(offset).and_then(|end| name.get(end..));
            let (Some(prefix), Some(suffix)) = (prefix, suffix) else {
                return Err(invalid(name.to_string()));
            };
            let new_name = format!("{}{}{}", prefix, replaced.text, suffix);
            (path.with_file_name(&new_name), new_name)
        };

        if new_name.trim().is_empty() {
            return Err(CoreError::EmptyName(path.to_path_buf()));
        }
        if !is_valid_file_name(&new_name) {
            return Err(invalid(new_name));
        }

        Ok(Some((new_path, replaced.count)))
    }
}

impl Command for RenameCommand {
    fn kind(&self) -> OperationKind {
        OperationKind::Rename
    }

    fn validate(&self, search: &Search) -> CoreResult<()> {
        match &search.filter().name {
            Some(name) if !name.is_negative() => Ok(()),
            Some(_) => Err(CoreError::Config("rename requires a non-inverted name pattern".into())),
            None => Err(CoreError::Config("rename requires a name pattern".into())),
        }
    }

    fn execute_match(&mut self, file_match: &FileMatch, ctx: &mut CommandContext) -> CoreResult<()> {
        let Some((mut new_path, count)) = self.new_path(file_match, ctx)? else {
            return Ok(());
        };
        let path = file_match.path();
        let is_directory = file_match.is_directory();

        if new_path.symlink_metadata().is_ok() && !same_entry(path, &new_path) {
            let info = ConflictInfo {
                kind: OperationKind::Rename,
                source: path.to_path_buf(),
                destination: new_path.clone(),
            };
            match self.resolver.resolve(&info)? {
                ConflictAction::Skip => {
                    tracing::debug!("Skipping rename of {}, {} exists", path.display(), new_path.display());
                    return Ok(());
                }
                ConflictAction::Overwrite => {
                    if !ctx.dry_run() {
                        remove_entry(&new_path)?;
                    }
                }
                ConflictAction::WriteTo(suffixed) => new_path = suffixed,
            }
        }

        if !ctx.dry_run() {
            if let Some(parent) = new_path.parent() {
                if !parent.as_os_str().is_empty() && !parent.exists() {
                    fs::create_dir_all(parent).with_path(parent)?;
                }
            }
            fs::rename(path, &new_path).with_path(path)?;
            if is_directory {
                ctx.notify(DirectoryChange::Renamed {
                    from: path.to_path_buf(),
                    to: new_path.clone(),
                });
            }
        }

        tracing::debug!("Renamed {} -> {}", path.display(), new_path.display());
        ctx.telemetry.match_count += count;
        ctx.processed(is_directory);
        ctx.report(OperationKind::Rename, path, Some(new_path), is_directory, None);
        Ok(())
    }
}

/// Case-only renames on case-insensitive file systems resolve to the same entry.
fn same_entry(a: &std::path::Path, b: &std::path::Path) -> bool {
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}
