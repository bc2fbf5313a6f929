//! Runs a command on the blocking pool while progress is printed and Ctrl-C is watched.

use anyhow::{Context, Result};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::core::cancel::CancellationToken;
use crate::core::commands::{Command, CommandOptions, CommandResult, CommandRunner};
use crate::core::progress::{LogReporter, OperationProgress, ProgressEvent, ProgressReporter};
use crate::core::search::Search;

/// One output line for a successful operation, `None` for events that are not printed.
pub fn format_operation(progress: &OperationProgress) -> Option<String> {
    if progress.error.is_some() {
        return None;
    }
    let prefix = if progress.dry_run { "[dry-run] " } else { "" };
    let suffix = if progress.is_directory { "/" } else { "" };
    Some(match &progress.new_path {
        Some(new_path) => format!(
            "{}{}{} -> {}{}",
            prefix,
            progress.path.display(),
            suffix,
            new_path.display(),
            suffix
        ),
        None => format!("{}{}{}", prefix, progress.path.display(), suffix),
    })
}

/// Prints operations to stdout and hands every event to the log.
async fn print_progress(mut receiver: mpsc::UnboundedReceiver<ProgressEvent>) {
    let log = LogReporter;
    let stdout = std::io::stdout();
    while let Some(event) = receiver.recv().await {
        if let ProgressEvent::Operation(progress) = &event {
            if let Some(line) = format_operation(progress) {
                let mut out = stdout.lock();
                if let Err(e) = writeln!(out, "{}", line) {
                    tracing::error!("Failed to write to stdout: {}", e);
                    break;
                }
            }
        }
        log.report(event);
    }
}

/// Runs `command` over `roots`, returning it together with the run result.
///
/// Ctrl-C cancels the run; the command then finishes with
/// `TerminationReason::Canceled` and partial telemetry.
pub async fn execute<C>(
    search: Search,
    options: CommandOptions,
    mut command: C,
    roots: Vec<PathBuf>,
) -> Result<(C, CommandResult)>
where
    C: Command + Send + 'static,
{
    let (sender, receiver) = mpsc::unbounded_channel::<ProgressEvent>();
    let cancellation = CancellationToken::new();
    let runner = CommandRunner::new(search.with_progress(Arc::new(sender)), options)
        .with_cancellation(cancellation.clone());

    let printer = tokio::spawn(print_progress(receiver));

    let interrupt = tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::info!("Interrupted, cancelling...");
                cancellation.cancel();
            }
            Err(e) => tracing::warn!("Failed to listen for Ctrl-C: {}", e),
        }
    });

    let handle = tokio::task::spawn_blocking(move || {
        let result = runner.run(&mut command, &roots);
        (command, result)
    });
    let joined = handle.await;
    interrupt.abort();

    let (command, result) = joined.context("command task panicked")?;
    // The runner and its sender are gone, so the printer drains and stops.
    printer.await.context("progress printer panicked")?;

    Ok((command, result?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::commands::FindCommand;
    use crate::core::filter::FileSystemFilter;
    use crate::core::progress::OperationKind;
    use crate::core::search::SearchOptions;
    use crate::utils::test_helpers::write_tree;
    use tempfile::tempdir;

    fn operation(new_path: Option<&str>, is_directory: bool, dry_run: bool) -> OperationProgress {
        OperationProgress {
            path: PathBuf::from("a"),
            new_path: new_path.map(PathBuf::from),
            is_directory,
            kind: OperationKind::Rename,
            dry_run,
            error: None,
        }
    }

    #[test]
    fn test_format_operation() {
        assert_eq!(format_operation(&operation(None, false, false)).unwrap(), "a");
        assert_eq!(format_operation(&operation(Some("b"), false, true)).unwrap(), "[dry-run] a -> b");
        assert_eq!(format_operation(&operation(Some("b"), true, false)).unwrap(), "a/ -> b/");
    }

    #[tokio::test]
    async fn test_execute_returns_command_and_telemetry() {
        let dir = tempdir().unwrap();
        write_tree(dir.path(), &[("a.txt", "a"), ("sub/b.txt", "b")]).unwrap();

        let search = Search::new(FileSystemFilter::new(), SearchOptions::default());
        let (_command, result) = execute(
            search,
            CommandOptions::default(),
            FindCommand::new(),
            vec![dir.path().to_path_buf()],
        )
        .await
        .unwrap();

        assert_eq!(result.telemetry.matching_file_count, 2);
        assert_eq!(result.telemetry.searched_directory_count, 2);
    }

    #[tokio::test]
    async fn test_execute_propagates_invalid_root() {
        let search = Search::new(FileSystemFilter::new(), SearchOptions::default());
        let result = execute(
            search,
            CommandOptions::default(),
            FindCommand::new(),
            vec![PathBuf::from("/definitely/not/here")],
        )
        .await;
        assert!(result.is_err());
    }
}
