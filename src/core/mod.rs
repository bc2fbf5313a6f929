//! The search engine: name parts, matchers, filters, the tree walker and the
//! commands that act on its matches.

pub mod aggregate;
pub mod cancel;
pub mod commands;
pub mod compare;
pub mod content;
pub mod encoding;
pub mod error;
pub mod file_match;
pub mod filter;
pub mod matcher;
pub mod name_part;
pub mod progress;
pub mod properties;
pub mod replace;
pub mod search;
pub mod telemetry;
pub mod walker;

pub use aggregate::{AggregateManager, AggregateMode, AggregateResult, ListResultStorage, ResultStorage};
pub use cancel::CancellationToken;
pub use commands::{
    Command, CommandContext, CommandOptions, CommandResult, CommandRunner, ConflictDialog,
    ConflictResolution, ConflictResolver, CopyCommand, CopyOptions, DeleteCommand, DeleteOptions,
    DialogResult, FindCommand, MoveCommand, RenameCommand, ReplaceCommand, SyncCommand,
    SyncConflictResolution,
};
pub use compare::{files_equal, FileCompareOptions};
pub use content::{ContentReader, FileContent};
pub use encoding::{BomDetector, Encoding, EncodingDetector};
pub use error::{CoreError, CoreResult, ErrorKind};
pub use file_match::FileMatch;
pub use filter::{FileEmptyOption, FileSystemFilter, SearchTarget};
pub use matcher::{Capture, GroupSelector, MatchResult, Matcher, PatternOptions};
pub use name_part::{NamePart, NamePartKind};
pub use progress::{
    CollectingReporter, FnReporter, LogReporter, NullReporter, OperationKind, OperationProgress,
    ProgressEvent, ProgressReporter, SearchProgress, SearchProgressKind,
};
pub use properties::{parse_date, parse_size, CompareOp, Comparison, FileAttributes, FilePropertyFilter};
pub use replace::{Replacement, ReplaceFunctions, Replacer};
pub use search::{Search, SearchOptions};
pub use telemetry::{SearchTelemetry, TerminationReason};
pub use walker::{DirectoryChange, FileSystemWalker, WalkOptions};
