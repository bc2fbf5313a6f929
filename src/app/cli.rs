//! Command-line arguments of the `fsm` binary and their translation into engine options.

use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use clap::{ArgAction, Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::config::AppConfig;
use crate::core::aggregate::AggregateMode;
use crate::core::commands::{CommandOptions, ConflictResolution, SyncConflictResolution};
use crate::core::compare::FileCompareOptions;
use crate::core::encoding::Encoding;
use crate::core::filter::{FileEmptyOption, FileSystemFilter, SearchTarget};
use crate::core::matcher::{Matcher, PatternOptions};
use crate::core::name_part::NamePartKind;
use crate::core::properties::{parse_date, parse_size, Comparison, FileAttributes, FilePropertyFilter};
use crate::core::replace::{ReplaceFunctions, Replacer};
use crate::core::search::SearchOptions;

/// fsm: find, filter and rewrite files with regular expressions
#[derive(Parser, Debug)]
#[command(name = "fsm", version)]
#[command(about = "Search, rename, copy, move, delete and rewrite files using regular expressions", long_about = None)]
pub struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Read defaults from this config file instead of the platform location
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Parse CLI arguments from the environment
    pub fn parse() -> Self {
        <Self as Parser>::parse()
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List matching files and directories
    Find(FindArgs),
    /// Delete matches, or only their content
    Delete(DeleteArgs),
    /// Rename matches by replacing the matched part of their name
    Rename(RenameArgs),
    /// Copy matches into a target directory
    Copy(TransferArgs),
    /// Move matches into a target directory
    Move(TransferArgs),
    /// Replace matched content inside files
    Replace(ReplaceArgs),
    /// Synchronise two directories
    Sync(SyncArgs),
}

fn parse_part(value: &str) -> Result<NamePartKind, String> {
    match value {
        "full" | "full-name" => Ok(NamePartKind::FullName),
        "name" => Ok(NamePartKind::Name),
        "stem" | "name-without-extension" => Ok(NamePartKind::NameWithoutExtension),
        "extension" | "ext" => Ok(NamePartKind::Extension),
        other => Err(format!("unknown name part '{}'", other)),
    }
}

fn parse_conflict(value: &str) -> Result<ConflictResolution, String> {
    match value {
        "skip" => Ok(ConflictResolution::Skip),
        "overwrite" => Ok(ConflictResolution::Overwrite),
        "suffix" => Ok(ConflictResolution::Suffix),
        "ask" => Ok(ConflictResolution::Ask),
        other => Err(format!("unknown conflict resolution '{}'", other)),
    }
}

fn parse_sync_conflict(value: &str) -> Result<SyncConflictResolution, String> {
    match value {
        "first" | "first-wins" => Ok(SyncConflictResolution::FirstWins),
        "second" | "second-wins" => Ok(SyncConflictResolution::SecondWins),
        "ask" => Ok(SyncConflictResolution::Ask),
        other => Err(format!("unknown sync conflict resolution '{}'", other)),
    }
}

fn parse_aggregate(value: &str) -> Result<AggregateMode, String> {
    match value {
        "except" => Ok(AggregateMode::Except),
        "intersect" => Ok(AggregateMode::Intersect),
        "group" => Ok(AggregateMode::Group),
        other => Err(format!("unknown aggregation '{}'", other)),
    }
}

fn parse_size_comparison(value: &str) -> Result<Comparison<u64>, String> {
    Comparison::parse(value, parse_size)
}

fn parse_date_comparison(value: &str) -> Result<Comparison<DateTime<Utc>>, String> {
    Comparison::parse(value, parse_date)
}

/// Filter flags shared by every subcommand.
#[derive(Args, Debug, Clone, Default)]
pub struct FilterArgs {
    /// Pattern the file name must match
    #[arg(short, long)]
    pub name: Option<String>,

    /// Part of the path the name pattern is matched against: full, name, stem, extension
    #[arg(long, value_parser = parse_part, default_value = "name")]
    pub part: NamePartKind,

    /// Accept entries whose name does NOT match
    #[arg(long)]
    pub invert_name: bool,

    /// Pattern the extension (without the dot) must match
    #[arg(short, long)]
    pub extension: Option<String>,

    #[arg(long)]
    pub invert_extension: bool,

    /// Pattern the file content must match
    #[arg(short, long)]
    pub content: Option<String>,

    #[arg(long)]
    pub invert_content: bool,

    /// Only search files in directories whose name matches
    #[arg(long, conflicts_with = "exclude_directory")]
    pub include_directory: Option<String>,

    /// Never descend into directories whose name matches
    #[arg(long)]
    pub exclude_directory: Option<String>,

    /// Do not exclude the directories listed in the config (node_modules, .git, ...)
    #[arg(long)]
    pub no_default_excludes: bool,

    #[arg(short, long)]
    pub ignore_case: bool,

    /// Treat patterns as literal text
    #[arg(long)]
    pub literal: bool,

    #[arg(long)]
    pub whole_word: bool,

    /// `^` and `$` match at line boundaries in content
    #[arg(long)]
    pub multiline: bool,

    /// Yield files (default unless --directories is given)
    #[arg(long)]
    pub files: bool,

    /// Yield directories
    #[arg(long)]
    pub directories: bool,

    #[arg(long)]
    pub no_recurse: bool,

    #[arg(long, conflicts_with = "non_empty")]
    pub empty: bool,

    #[arg(long)]
    pub non_empty: bool,

    /// Size predicate such as `>10kb`; repeatable
    #[arg(long, value_parser = parse_size_comparison)]
    pub size: Vec<Comparison<u64>>,

    /// Modification time predicate such as `>=2024-01-01`; repeatable
    #[arg(long, value_parser = parse_date_comparison)]
    pub modified: Vec<Comparison<DateTime<Utc>>>,

    /// Creation time predicate; repeatable
    #[arg(long, value_parser = parse_date_comparison)]
    pub created: Vec<Comparison<DateTime<Utc>>>,

    /// Attributes that must be present, e.g. `hidden,read-only`
    #[arg(long, value_parser = FileAttributes::parse_list)]
    pub attributes: Option<FileAttributes>,

    /// Attributes that exclude an entry
    #[arg(long, value_parser = FileAttributes::parse_list)]
    pub skip_attributes: Option<FileAttributes>,

    /// Encoding used when a file has no byte order mark
    #[arg(long)]
    pub encoding: Option<Encoding>,
}

impl FilterArgs {
    fn pattern_options(&self) -> PatternOptions {
        PatternOptions {
            ignore_case: self.ignore_case,
            multiline: self.multiline,
            literal: self.literal,
            whole_word: self.whole_word,
            whole_input: false,
        }
    }

    fn matcher(&self, pattern: &str, invert: bool) -> Result<Matcher> {
        Ok(Matcher::from_pattern(pattern, &self.pattern_options())?.inverted(invert))
    }

    pub fn target(&self, default: SearchTarget) -> SearchTarget {
        match (self.files, self.directories) {
            (true, true) => SearchTarget::All,
            (false, true) => SearchTarget::Directories,
            (true, false) => SearchTarget::Files,
            (false, false) => default,
        }
    }

    /// Builds the walker configuration, falling back to `config` for unset flags.
    pub fn build(&self, config: &AppConfig, default_target: SearchTarget) -> Result<(FileSystemFilter, SearchOptions)> {
        let mut filter = FileSystemFilter::new();

        if let Some(name) = &self.name {
            filter = filter.with_name(self.matcher(name, self.invert_name)?, self.part);
        }
        if let Some(extension) = &self.extension {
            filter = filter.with_extension(self.matcher(extension, self.invert_extension)?);
        }
        if let Some(content) = &self.content {
            filter = filter.with_content(self.matcher(content, self.invert_content)?);
        }

        let directory = match (&self.include_directory, &self.exclude_directory) {
            (Some(include), _) => Some(self.matcher(include, false)?),
            (None, Some(exclude)) => Some(self.matcher(exclude, true)?),
            (None, None) if !self.no_default_excludes => match config.excluded_directory_pattern() {
                Some(pattern) => Some(Matcher::from_pattern(&pattern, &PatternOptions::default())?.inverted(true)),
                None => None,
            },
            (None, None) => None,
        };
        if let Some(directory) = directory {
            filter = filter.with_directory(directory, NamePartKind::Name);
        }

        filter = filter
            .with_properties(FilePropertyFilter {
                size: self.size.clone(),
                creation_time: self.created.clone(),
                modified_time: self.modified.clone(),
            })
            .with_attributes(
                self.attributes.unwrap_or_default(),
                self.skip_attributes.unwrap_or_default(),
            )
            .with_empty(match (self.empty, self.non_empty) {
                (true, _) => FileEmptyOption::Empty,
                (false, true) => FileEmptyOption::NonEmpty,
                (false, false) => FileEmptyOption::None,
            });

        let options = SearchOptions {
            recurse: config.recurse && !self.no_recurse,
            target: self.target(default_target),
            default_encoding: self.encoding.unwrap_or(config.default_encoding),
        };
        Ok((filter, options))
    }
}

#[derive(Args, Debug, Clone, Default)]
pub struct RunArgs {
    /// Stop after this many matches
    #[arg(long)]
    pub max_count: Option<usize>,

    /// Report what would happen without changing anything
    #[arg(short = 'd', long)]
    pub dry_run: bool,
}

impl RunArgs {
    pub fn options(&self, config: &AppConfig) -> CommandOptions {
        CommandOptions {
            dry_run: self.dry_run,
            max_matching_files: self.max_count.or(config.max_matching_files),
        }
    }
}

#[derive(Args, Debug, Clone, Default)]
pub struct ReplacementArgs {
    /// Replacement; `$1` and `${name}` refer to capture groups
    #[arg(short, long, default_value = "")]
    pub replacement: String,

    /// Insert the replacement verbatim
    #[arg(long)]
    pub literal_replacement: bool,

    /// Post-processing of each replacement: trim, trim-start, trim-end, to-lower, to-upper
    #[arg(long, value_parser = ReplaceFunctions::parse_list)]
    pub functions: Option<ReplaceFunctions>,

    /// Replace at most this many captures per file or name
    #[arg(long)]
    pub max_replacements: Option<usize>,
}

impl ReplacementArgs {
    pub fn replacer(&self) -> Replacer {
        let replacer = if self.literal_replacement {
            Replacer::literal(self.replacement.clone())
        } else {
            Replacer::pattern(self.replacement.clone())
        };
        replacer
            .with_functions(self.functions.unwrap_or_default())
            .with_max_count(self.max_replacements)
    }
}

#[derive(Args, Debug)]
pub struct FindArgs {
    /// Directories to search
    #[arg(default_value = ".")]
    pub paths: Vec<PathBuf>,

    #[command(flatten)]
    pub filter: FilterArgs,

    #[command(flatten)]
    pub run: RunArgs,

    /// Combine the values found in each path: except, intersect, group
    #[arg(long, value_parser = parse_aggregate)]
    pub aggregate: Option<AggregateMode>,

    /// Compare aggregated values case-insensitively
    #[arg(long)]
    pub aggregate_ignore_case: bool,
}

#[derive(Args, Debug)]
pub struct DeleteArgs {
    #[arg(default_value = ".")]
    pub paths: Vec<PathBuf>,

    #[command(flatten)]
    pub filter: FilterArgs,

    #[command(flatten)]
    pub run: RunArgs,

    /// Empty files and directories instead of removing them
    #[arg(long)]
    pub content_only: bool,

    /// With --content-only, also drop the byte order mark
    #[arg(long, requires = "content_only")]
    pub including_bom: bool,

    /// With --content-only, only remove the files inside matched directories
    #[arg(long, requires = "content_only", conflicts_with = "directories_only")]
    pub files_only: bool,

    /// With --content-only, only remove the subdirectories of matched directories
    #[arg(long, requires = "content_only")]
    pub directories_only: bool,
}

#[derive(Args, Debug)]
pub struct RenameArgs {
    #[arg(default_value = ".")]
    pub paths: Vec<PathBuf>,

    #[command(flatten)]
    pub filter: FilterArgs,

    #[command(flatten)]
    pub run: RunArgs,

    #[command(flatten)]
    pub replacement: ReplacementArgs,

    /// skip, overwrite, suffix or ask
    #[arg(long, value_parser = parse_conflict)]
    pub conflict: Option<ConflictResolution>,
}

#[derive(Args, Debug)]
pub struct TransferArgs {
    #[arg(default_value = ".")]
    pub paths: Vec<PathBuf>,

    #[command(flatten)]
    pub filter: FilterArgs,

    #[command(flatten)]
    pub run: RunArgs,

    /// Destination directory
    #[arg(short, long)]
    pub target: PathBuf,

    /// Put all matches directly into the target directory
    #[arg(long)]
    pub flat: bool,

    /// skip, overwrite, suffix or ask
    #[arg(long, value_parser = parse_conflict)]
    pub conflict: Option<ConflictResolution>,

    /// Properties that make an existing file count as identical: size, modified, attributes, content
    #[arg(long, value_parser = FileCompareOptions::parse_list)]
    pub compare: Option<FileCompareOptions>,
}

#[derive(Args, Debug)]
pub struct ReplaceArgs {
    #[arg(default_value = ".")]
    pub paths: Vec<PathBuf>,

    #[command(flatten)]
    pub filter: FilterArgs,

    #[command(flatten)]
    pub run: RunArgs,

    #[command(flatten)]
    pub replacement: ReplacementArgs,
}

#[derive(Args, Debug)]
pub struct SyncArgs {
    pub first: PathBuf,

    pub second: PathBuf,

    #[command(flatten)]
    pub filter: FilterArgs,

    #[command(flatten)]
    pub run: RunArgs,

    /// first, second or ask
    #[arg(long, value_parser = parse_sync_conflict)]
    pub conflict: Option<SyncConflictResolution>,

    #[arg(long, value_parser = FileCompareOptions::parse_list)]
    pub compare: Option<FileCompareOptions>,
}

impl SyncArgs {
    pub fn check(&self) -> Result<()> {
        if self.first == self.second {
            bail!("cannot synchronise {} with itself", self.first.display());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).unwrap()
    }

    #[test]
    fn test_find_defaults() {
        let cli = parse(&["fsm", "find"]);
        let Commands::Find(args) = cli.command else {
            panic!("expected find");
        };
        assert_eq!(args.paths, vec![PathBuf::from(".")]);
        assert_eq!(args.filter.part, NamePartKind::Name);
        assert!(!args.run.dry_run);
        assert_eq!(cli.verbose, 0);
    }

    #[test]
    fn test_filter_flags_build_a_filter() {
        let cli = parse(&[
            "fsm", "find", "src", "-n", "^old_", "--content", "foo", "--size", ">1kb", "--directories", "--files",
            "--no-recurse", "--encoding", "utf-16le",
        ]);
        let Commands::Find(args) = cli.command else {
            panic!("expected find");
        };
        let (filter, options) = args.filter.build(&AppConfig::default(), SearchTarget::Files).unwrap();
        assert!(filter.name.is_some());
        assert!(filter.content.is_some());
        assert!(filter.directory.as_ref().is_some_and(|d| d.is_negative()));
        assert_eq!(filter.properties.size, vec![Comparison::new(crate::core::properties::CompareOp::Gt, 1024)]);
        assert_eq!(options.target, SearchTarget::All);
        assert!(!options.recurse);
        assert_eq!(options.default_encoding, Encoding::Utf16Le);
    }

    #[test]
    fn test_include_directory_replaces_default_excludes() {
        let cli = parse(&["fsm", "find", "--include-directory", "src"]);
        let Commands::Find(args) = cli.command else {
            panic!("expected find");
        };
        let (filter, _) = args.filter.build(&AppConfig::default(), SearchTarget::Files).unwrap();
        assert!(filter.directory.as_ref().is_some_and(|d| !d.is_negative()));

        let cli = parse(&["fsm", "find", "--no-default-excludes"]);
        let Commands::Find(args) = cli.command else {
            panic!("expected find");
        };
        let (filter, _) = args.filter.build(&AppConfig::default(), SearchTarget::Files).unwrap();
        assert!(filter.directory.is_none());
    }

    #[test]
    fn test_copy_requires_target() {
        assert!(Cli::try_parse_from(["fsm", "copy", "src"]).is_err());
        let cli = parse(&["fsm", "copy", "src", "-t", "out", "--conflict", "suffix", "--compare", "size,content"]);
        let Commands::Copy(args) = cli.command else {
            panic!("expected copy");
        };
        assert_eq!(args.conflict, Some(ConflictResolution::Suffix));
        assert_eq!(args.compare, Some(FileCompareOptions::SIZE | FileCompareOptions::CONTENT));
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        assert!(Cli::try_parse_from(["fsm", "rename", "--conflict", "maybe"]).is_err());
        assert!(Cli::try_parse_from(["fsm", "find", "--size", ">3 parsecs"]).is_err());
        assert!(Cli::try_parse_from(["fsm", "delete", "--including-bom"]).is_err());
    }
}
