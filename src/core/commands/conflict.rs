//! What to do when a destination path already exists.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::core::error::{CoreError, CoreResult};
use crate::core::progress::OperationKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConflictResolution {
    #[default]
    Skip,
    Overwrite,
    /// Write next to the existing entry under a name like `a (2).txt`.
    Suffix,
    Ask,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialogResult {
    Yes,
    YesToAll,
    No,
    NoToAll,
    Cancel,
}

#[derive(Debug, Clone)]
pub struct ConflictInfo {
    pub kind: OperationKind,
    pub source: PathBuf,
    pub destination: PathBuf,
}

/// Asks the user how to resolve one conflict.
pub trait ConflictDialog: Send + Sync {
    fn resolve(&self, info: &ConflictInfo) -> DialogResult;
}

/// Decision for a single conflict.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConflictAction {
    Skip,
    Overwrite,
    WriteTo(PathBuf),
}

/// Run-scoped conflict policy. An `Ask` policy is downgraded to `Overwrite`
/// or `Skip` once the user answers "yes to all" or "no to all".
#[derive(Clone)]
pub struct ConflictResolver {
    resolution: ConflictResolution,
    dialog: Option<Arc<dyn ConflictDialog>>,
}

impl fmt::Debug for ConflictResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConflictResolver")
            .field("resolution", &self.resolution)
            .field("dialog", &self.dialog.is_some())
            .finish()
    }
}

impl ConflictResolver {
    pub fn new(resolution: ConflictResolution, dialog: Option<Arc<dyn ConflictDialog>>) -> CoreResult<Self> {
        if resolution == ConflictResolution::Ask && dialog.is_none() {
            return Err(CoreError::Config(
                "conflict resolution 'ask' requires an interactive dialog".into(),
            ));
        }
        Ok(Self { resolution, dialog })
    }

    pub fn resolution(&self) -> ConflictResolution {
        self.resolution
    }

    pub fn resolve(&mut self, info: &ConflictInfo) -> CoreResult<ConflictAction> {
        match self.resolution {
            ConflictResolution::Skip => Ok(ConflictAction::Skip),
            ConflictResolution::Overwrite => Ok(ConflictAction::Overwrite),
            ConflictResolution::Suffix => Ok(ConflictAction::WriteTo(next_available_path(&info.destination))),
            ConflictResolution::Ask => {
                let Some(dialog) = self.dialog.as_ref() else {
                    return Ok(ConflictAction::Skip);
                };
                match dialog.resolve(info) {
                    DialogResult::Yes => Ok(ConflictAction::Overwrite),
                    DialogResult::YesToAll => {
                        tracing::info!("Overwriting all further conflicts");
                        self.resolution = ConflictResolution::Overwrite;
                        Ok(ConflictAction::Overwrite)
                    }
                    DialogResult::No => Ok(ConflictAction::Skip),
                    DialogResult::NoToAll => {
                        tracing::info!("Skipping all further conflicts");
                        self.resolution = ConflictResolution::Skip;
                        Ok(ConflictAction::Skip)
                    }
                    DialogResult::Cancel => Err(CoreError::Cancelled),
                }
            }
        }
    }

    /// Asks a yes/no question through the dialog, honouring earlier "to all" answers.
    pub(crate) fn confirm(&mut self, info: &ConflictInfo) -> CoreResult<bool> {
        Ok(matches!(self.resolve(info)?, ConflictAction::Overwrite))
    }
}

/// First of `name (2).ext`, `name (3).ext`, ... that does not exist yet.
pub fn next_available_path(path: &Path) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let extension = path.extension().map(|e| e.to_string_lossy().into_owned());
    let parent = path.parent().unwrap_or_else(|| Path::new(""));

    (2u32..)
        .map(|n| {
            let name = match &extension {
                Some(ext) => format!("{} ({}).{}", stem, n, ext),
                None => format!("{} ({})", stem, n),
            };
            parent.join(name)
        })
        .find(|candidate| candidate.symlink_metadata().is_err())
        .unwrap_or_else(|| path.to_path_buf())
}
