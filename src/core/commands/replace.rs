use std::fs;
use std::io::Write;
use std::path::Path;

use tempfile::NamedTempFile;

use crate::core::error::{CoreError, CoreResult, IoResultExt};
use crate::core::file_match::FileMatch;
use crate::core::progress::OperationKind;
use crate::core::replace::Replacer;
use crate::core::search::Search;

use super::{Command, CommandContext};

/// Rewrites the content of matching files, substituting every accepted capture
/// of the content filter.
#[derive(Debug, Clone)]
pub struct ReplaceCommand {
    replacer: Replacer,
}

impl ReplaceCommand {
    pub fn new(replacer: Replacer) -> Self {
        Self { replacer }
    }
}

impl Command for ReplaceCommand {
    fn kind(&self) -> OperationKind {
        OperationKind::Replace
    }

    fn validate(&self, search: &Search) -> CoreResult<()> {
        match &search.filter().content {
            Some(content) if !content.is_negative() => Ok(()),
            _ => Err(CoreError::Config(
                "replace requires a non-inverted content pattern".into(),
            )),
        }
    }

    fn execute_match(&mut self, file_match: &FileMatch, ctx: &mut CommandContext) -> CoreResult<()> {
        let path = file_match.path();
        let (Some(matcher), Some(content)) = (ctx.filter().content.as_ref(), file_match.content()) else {
            return Ok(());
        };

        if content.lossy {
            return Err(CoreError::InvalidData {
                path: path.to_path_buf(),
                message: format!("content is not valid {}", content.effective_encoding()),
            });
        }

        let replaced = self.replacer.replace(matcher, &content.text);
        ctx.telemetry.match_count += replaced.count;
        if replaced.count == 0 {
            return Ok(());
        }

        if replaced.text != content.text {
            let encoding = content.effective_encoding();
            let bytes = encoding
                .encode(&replaced.text, content.has_bom())
                .ok_or_else(|| CoreError::InvalidData {
                    path: path.to_path_buf(),
                    message: format!("replaced content cannot be encoded as {}", encoding),
                })?;
            if !ctx.dry_run() {
                write_content(path, &bytes)?;
            }
        }

        tracing::debug!("Replaced {} match(es) in {}", replaced.count, path.display());
        ctx.telemetry.processed_match_count += replaced.count;
        ctx.processed(false);
        ctx.report(OperationKind::Replace, path, None, false, None);
        Ok(())
    }
}

/// Replaces the file at `path` with `bytes`, keeping its permissions.
fn write_content(path: &Path, bytes: &[u8]) -> CoreResult<()> {
    let permissions = fs::metadata(path).with_path(path)?.permissions();
    let directory = path.parent().unwrap_or_else(|| Path::new("."));

    let mut file = NamedTempFile::new_in(directory).with_path(directory)?;
    file.write_all(bytes).with_path(file.path())?;
    file.as_file().sync_all().with_path(file.path())?;
    fs::set_permissions(file.path(), permissions).with_path(file.path())?;
    file.persist(path).map_err(|e| CoreError::io(e.error, path))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::commands::{CommandOptions, CommandRunner};
    use crate::core::encoding::Encoding;
    use crate::core::filter::FileSystemFilter;
    use crate::core::matcher::{Matcher, PatternOptions};
    use crate::core::search::SearchOptions;
    use tempfile::tempdir;

    fn runner(pattern: &str, dry_run: bool) -> CommandRunner {
        let filter = FileSystemFilter::new().with_content(Matcher::from_pattern(pattern, &PatternOptions::default()).unwrap());
        CommandRunner::new(
            Search::new(filter, SearchOptions::default()),
            CommandOptions {
                dry_run,
                ..Default::default()
            },
        )
    }

    #[test]
    fn test_replace_keeps_bom_and_encoding() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("utf16.txt");
        fs::write(&path, Encoding::Utf16Le.encode("prefix OLD suffix", true).unwrap()).unwrap();

        let result = runner("OLD", false)
            .run(&mut ReplaceCommand::new(Replacer::literal("new")), &[dir.path().to_path_buf()])
            .unwrap();

        assert_eq!(fs::read(&path).unwrap(), Encoding::Utf16Le.encode("prefix new suffix", true).unwrap());
        assert_eq!(result.telemetry.match_count, 1);
        assert_eq!(result.telemetry.processed_match_count, 1);
    }

    #[test]
    fn test_replace_without_bom_writes_none() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("plain.txt");
        fs::write(&path, "a-b-c").unwrap();
        runner("-", false)
            .run(&mut ReplaceCommand::new(Replacer::literal("+")), &[dir.path().to_path_buf()])
            .unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"a+b+c");
    }

    #[test]
    fn test_dry_run_counts_without_writing() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a.txt");
        fs::write(&path, "x x x").unwrap();
        let result = runner("x", true)
            .run(&mut ReplaceCommand::new(Replacer::literal("y")), &[dir.path().to_path_buf()])
            .unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "x x x");
        assert_eq!(result.telemetry.processed_match_count, 3);
        assert_eq!(result.telemetry.processed_file_count, 1);
    }

    #[test]
    fn test_lossy_content_is_not_rewritten() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bin.dat");
        fs::write(&path, [b'x', 0xFF, 0xFE, b'x']).unwrap();
        let result = runner("x", false)
            .run(&mut ReplaceCommand::new(Replacer::literal("y")), &[dir.path().to_path_buf()])
            .unwrap();
        assert_eq!(fs::read(&path).unwrap(), [b'x', 0xFF, 0xFE, b'x']);
        assert_eq!(result.telemetry.processed_file_count, 0);
    }

    #[test]
    fn test_unencodable_replacement_leaves_latin1_file_untouched() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("prices.txt");
        fs::write(&path, "price: EUR").unwrap();
        let filter = FileSystemFilter::new().with_content(Matcher::from_pattern("EUR", &PatternOptions::default()).unwrap());
        let options = SearchOptions {
            default_encoding: Encoding::Latin1,
            ..Default::default()
        };

        for dry_run in [false, true] {
            let result = CommandRunner::new(
                Search::new(filter.clone(), options),
                CommandOptions {
                    dry_run,
                    ..Default::default()
                },
            )
            .run(&mut ReplaceCommand::new(Replacer::literal("€")), &[dir.path().to_path_buf()])
            .unwrap();

            assert_eq!(fs::read(&path).unwrap(), b"price: EUR");
            assert_eq!(result.telemetry.processed_file_count, 0);
            assert_eq!(result.telemetry.processed_match_count, 0);
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_permissions_survive_rewrite() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempdir().unwrap();
        let path = dir.path().join("run.sh");
        fs::write(&path, "echo old").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o750)).unwrap();
        runner("old", false)
            .run(&mut ReplaceCommand::new(Replacer::literal("new")), &[dir.path().to_path_buf()])
            .unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "echo new");
        assert_eq!(fs::metadata(&path).unwrap().permissions().mode() & 0o777, 0o750);
    }
}
