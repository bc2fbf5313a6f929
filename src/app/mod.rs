//! The `fsm` command-line front end.

pub mod cli;
pub mod dialog;
pub mod tasks;

use anyhow::Result;
use std::path::PathBuf;
use std::sync::Arc;

use crate::config::AppConfig;
use crate::core::aggregate::{AggregateManager, AggregateResult};
use crate::core::cancel::CancellationToken;
use crate::core::commands::{
    CommandResult, ConflictDialog, ConflictResolution, ConflictResolver, CopyCommand, CopyOptions,
    DeleteCommand, DeleteOptions, FindCommand, MoveCommand, RenameCommand, ReplaceCommand,
    SyncCommand,
};
use crate::core::filter::SearchTarget;
use crate::core::search::Search;
use crate::core::telemetry::TerminationReason;

use cli::{Cli, Commands, TransferArgs};
use dialog::ConsoleDialog;

/// Exit status when the run found nothing.
pub const EXIT_NO_MATCH: i32 = 1;
/// Exit status after Ctrl-C, as shells report SIGINT.
pub const EXIT_CANCELLED: i32 = 130;

fn dialog() -> Option<Arc<dyn ConflictDialog>> {
    Some(Arc::new(ConsoleDialog::new()))
}

fn resolver(resolution: Option<ConflictResolution>, config: &AppConfig) -> Result<ConflictResolver> {
    Ok(ConflictResolver::new(
        resolution.unwrap_or(config.conflict_resolution),
        dialog(),
    )?)
}

fn copy_options(args: &TransferArgs, config: &AppConfig) -> CopyOptions {
    CopyOptions {
        destination: args.target.clone(),
        flat: args.flat,
        compare: args.compare.unwrap_or(config.compare),
    }
}

/// Parses the command line, runs the command and returns the process exit code.
pub async fn run(cli: Cli) -> Result<i32> {
    let config = AppConfig::load(cli.config.as_deref())?;

    let result = match cli.command {
        Commands::Find(args) => {
            let (filter, options) = args.filter.build(&config, SearchTarget::Files)?;
            let mut command = FindCommand::new();
            if let Some(mode) = args.aggregate {
                command = command.with_aggregate(AggregateManager::new(mode, args.aggregate_ignore_case));
            }
            let (command, result) =
                tasks::execute(Search::new(filter, options), args.run.options(&config), command, args.paths).await?;
            if let Some(aggregate) = command.into_aggregate() {
                print_aggregate(&aggregate.compute(&CancellationToken::new())?);
            }
            result
        }
        Commands::Delete(args) => {
            let (filter, options) = args.filter.build(&config, SearchTarget::Files)?;
            let command = DeleteCommand::new(DeleteOptions {
                content_only: args.content_only,
                including_bom: args.including_bom,
                files_only: args.files_only,
                directories_only: args.directories_only,
            });
            let (_, result) =
                tasks::execute(Search::new(filter, options), args.run.options(&config), command, args.paths).await?;
            result
        }
        Commands::Rename(args) => {
            let (filter, options) = args.filter.build(&config, SearchTarget::Files)?;
            let command = RenameCommand::new(args.replacement.replacer(), resolver(args.conflict, &config)?);
            let (_, result) =
                tasks::execute(Search::new(filter, options), args.run.options(&config), command, args.paths).await?;
            result
        }
        Commands::Copy(args) => {
            let (filter, options) = args.filter.build(&config, SearchTarget::Files)?;
            let command = CopyCommand::new(copy_options(&args, &config), resolver(args.conflict, &config)?);
            let (_, result) =
                tasks::execute(Search::new(filter, options), args.run.options(&config), command, args.paths).await?;
            result
        }
        Commands::Move(args) => {
            let (filter, options) = args.filter.build(&config, SearchTarget::Files)?;
            let command = MoveCommand::new(copy_options(&args, &config), resolver(args.conflict, &config)?);
            let (_, result) =
                tasks::execute(Search::new(filter, options), args.run.options(&config), command, args.paths).await?;
            result
        }
        Commands::Replace(args) => {
            let (filter, options) = args.filter.build(&config, SearchTarget::Files)?;
            let command = ReplaceCommand::new(args.replacement.replacer());
            let (_, result) =
                tasks::execute(Search::new(filter, options), args.run.options(&config), command, args.paths).await?;
            result
        }
        Commands::Sync(args) => {
            args.check()?;
            let (filter, options) = args.filter.build(&config, SearchTarget::All)?;
            let command = SyncCommand::new(
                args.first.clone(),
                args.second.clone(),
                args.conflict.unwrap_or(config.sync_conflict_resolution),
                args.compare.unwrap_or(config.compare),
                dialog(),
            )?;
            let roots: Vec<PathBuf> = command.roots().into();
            let (_, result) =
                tasks::execute(Search::new(filter, options), args.run.options(&config), command, roots).await?;
            result
        }
    };

    print_summary(&result);
    Ok(exit_code(&result))
}

pub fn exit_code(result: &CommandResult) -> i32 {
    if result.termination_reason == TerminationReason::Canceled {
        EXIT_CANCELLED
    } else if result.telemetry.matching_count() > 0 {
        0
    } else {
        EXIT_NO_MATCH
    }
}

fn print_aggregate(result: &AggregateResult) {
    match result {
        AggregateResult::Values(values) => {
            for value in values {
                println!("{}", value);
            }
        }
        AggregateResult::Groups(groups) => {
            for group in groups {
                println!("{:>6}  {}", group.count, group.value);
            }
        }
    }
}

fn print_summary(result: &CommandResult) {
    let t = &result.telemetry;
    eprintln!(
        "{} matching file(s), {} matching director(y/ies), {} processed, {} match(es); searched {} director(y/ies) in {:.2?}",
        t.matching_file_count,
        t.matching_directory_count,
        t.processed_count(),
        t.match_count,
        t.searched_directory_count,
        t.elapsed
    );
    match result.termination_reason {
        TerminationReason::MaxReached => eprintln!("Stopped after reaching the maximum number of matches."),
        TerminationReason::Canceled => eprintln!("Cancelled."),
        TerminationReason::None => {}
    }
}
