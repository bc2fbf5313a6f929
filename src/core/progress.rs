//! Progress events emitted by the walker and the commands, and the sinks that receive them.

use std::path::PathBuf;
use std::sync::Mutex;
use tokio::sync::mpsc;

use super::error::CoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchProgressKind {
    /// A directory is about to be enumerated.
    SearchedDirectory,
    /// A subdirectory was seen.
    Directory,
    /// A file was seen.
    File,
}

#[derive(Debug)]
pub struct SearchProgress {
    pub path: PathBuf,
    pub kind: SearchProgressKind,
    pub error: Option<CoreError>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum OperationKind {
    Find,
    Delete,
    Rename,
    Copy,
    Move,
    Replace,
    Sync,
}

#[derive(Debug)]
pub struct OperationProgress {
    pub path: PathBuf,
    pub new_path: Option<PathBuf>,
    pub is_directory: bool,
    pub kind: OperationKind,
    pub dry_run: bool,
    pub error: Option<CoreError>,
}

#[derive(Debug)]
pub enum ProgressEvent {
    Search(SearchProgress),
    Operation(OperationProgress),
}

impl ProgressEvent {
    pub fn error(&self) -> Option<&CoreError> {
        match self {
            ProgressEvent::Search(p) => p.error.as_ref(),
            ProgressEvent::Operation(p) => p.error.as_ref(),
        }
    }
}

/// A fire-and-forget sink for progress events.
pub trait ProgressReporter: Send + Sync {
    fn report(&self, event: ProgressEvent);
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullReporter;

impl ProgressReporter for NullReporter {
    fn report(&self, _event: ProgressEvent) {}
}

/// Forwards failures to `tracing`, everything else at trace level.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogReporter;

impl ProgressReporter for LogReporter {
    fn report(&self, event: ProgressEvent) {
        match &event {
            ProgressEvent::Search(p) => match &p.error {
                Some(e) => tracing::warn!("{:?} {}: {}", p.kind, p.path.display(), e),
                None => tracing::trace!("{:?} {}", p.kind, p.path.display()),
            },
            ProgressEvent::Operation(p) => match &p.error {
                Some(e) => tracing::warn!("{:?} failed for {}: {}", p.kind, p.path.display(), e),
                None => tracing::debug!(
                    "{:?} {}{}",
                    p.kind,
                    p.path.display(),
                    p.new_path
                        .as_ref()
                        .map(|n| format!(" -> {}", n.display()))
                        .unwrap_or_default()
                ),
            },
        }
    }
}

/// Keeps every event in memory.
#[derive(Debug, Default)]
pub struct CollectingReporter {
    events: Mutex<Vec<ProgressEvent>>,
}

impl CollectingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn take(&self) -> Vec<ProgressEvent> {
        match self.events.lock() {
            Ok(mut events) => std::mem::take(&mut *events),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        }
    }
}

impl ProgressReporter for CollectingReporter {
    fn report(&self, event: ProgressEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

/// Adapts a closure into a reporter.
pub struct FnReporter<F>(pub F);

impl<F> ProgressReporter for FnReporter<F>
where
    F: Fn(ProgressEvent) + Send + Sync,
{
    fn report(&self, event: ProgressEvent) {
        (self.0)(event)
    }
}

/// Streams events to an async consumer. A dropped receiver is logged and ignored.
impl ProgressReporter for mpsc::UnboundedSender<ProgressEvent> {
    fn report(&self, event: ProgressEvent) {
        if let Err(e) = self.send(event) {
            tracing::warn!("Failed to send progress event: {}", e);
        }
    }
}
