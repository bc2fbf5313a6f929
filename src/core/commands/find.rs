use crate::core::aggregate::AggregateManager;
use crate::core::error::CoreResult;
use crate::core::file_match::FileMatch;
use crate::core::progress::OperationKind;

use super::{Command, CommandContext};

/// Reports every match; optionally feeds matched values into an [`AggregateManager`].
///
/// With a content filter the collected values are the content captures,
/// otherwise the matched name part.
#[derive(Debug, Default)]
pub struct FindCommand {
    aggregate: Option<AggregateManager>,
}

impl FindCommand {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_aggregate(mut self, aggregate: AggregateManager) -> Self {
        self.aggregate = Some(aggregate);
        self
    }

    pub fn aggregate(&self) -> Option<&AggregateManager> {
        self.aggregate.as_ref()
    }

    pub fn into_aggregate(self) -> Option<AggregateManager> {
        self.aggregate
    }
}

impl Command for FindCommand {
    fn kind(&self) -> OperationKind {
        OperationKind::Find
    }

    fn begin_root(&mut self, _ctx: &mut CommandContext) -> CoreResult<()> {
        if let Some(aggregate) = self.aggregate.as_mut() {
            aggregate.begin_root();
        }
        Ok(())
    }

    fn execute_match(&mut self, file_match: &FileMatch, ctx: &mut CommandContext) -> CoreResult<()> {
        let captures = match (&ctx.filter().content, file_match.content_text()) {
            (Some(content), Some(text)) if !content.is_negative() => content.captures(text),
            _ => Vec::new(),
        };
        ctx.telemetry.match_count += captures.len();

        if let Some(aggregate) = self.aggregate.as_mut() {
            if captures.is_empty() {
                let value = match file_match.name_match().and_then(|m| m.capture()) {
                    Some(capture) => capture.value.clone(),
                    None => file_match.name_part().as_str().to_string(),
                };
                aggregate.add(value);
            } else {
                for capture in captures {
                    ctx.cancellation().check()?;
                    aggregate.add(capture.value);
                }
            }
        }

        ctx.processed(file_match.is_directory());
        ctx.report(OperationKind::Find, file_match.path(), None, file_match.is_directory(), None);
        Ok(())
    }
}
