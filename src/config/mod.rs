pub mod settings;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::core::commands::{ConflictResolution, SyncConflictResolution};
use crate::core::compare::FileCompareOptions;
use crate::core::encoding::Encoding;

/// Defaults the command line falls back to when a flag is not given.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub conflict_resolution: ConflictResolution,
    pub sync_conflict_resolution: SyncConflictResolution,
    pub default_encoding: Encoding,
    pub recurse: bool,
    /// Directory names that are never descended unless a directory filter is given.
    pub excluded_directories: Vec<String>,
    pub max_matching_files: Option<usize>,
    pub compare: FileCompareOptions,
}

impl AppConfig {
    pub fn load(path: Option<&Path>) -> Result<Self> {
        settings::load_config(path)
    }

    /// Anchored alternation of the excluded names, `None` if there are none.
    pub fn excluded_directory_pattern(&self) -> Option<String> {
        let names: Vec<String> = self
            .excluded_directories
            .iter()
            .map(|name| name.trim())
            .filter(|name| !name.is_empty())
            .map(regex::escape)
            .collect();
        if names.is_empty() {
            None
        } else {
            Some(format!("^(?:{})$", names.join("|")))
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        let excluded_directories = [
            "node_modules",
            ".git",
            ".svn",
            ".hg",
            "target",
            "venv",
            ".venv",
            "__pycache__",
            ".idea",
        ]
        .iter()
        .map(|name| name.to_string())
        .collect();

        Self {
            conflict_resolution: ConflictResolution::Skip,
            sync_conflict_resolution: SyncConflictResolution::FirstWins,
            default_encoding: Encoding::Utf8,
            recurse: true,
            excluded_directories,
            max_matching_files: None,
            compare: FileCompareOptions::SIZE | FileCompareOptions::MODIFIED_TIME,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use regex::Regex;

    #[test]
    fn test_excluded_pattern_matches_whole_names() {
        let config = AppConfig {
            excluded_directories: vec!["node_modules".into(), ".git".into()],
            ..Default::default()
        };
        let pattern = Regex::new(&config.excluded_directory_pattern().unwrap()).unwrap();
        assert!(pattern.is_match("node_modules"));
        assert!(pattern.is_match(".git"));
        assert!(!pattern.is_match("xgit"));
        assert!(!pattern.is_match("my_node_modules"));

        let empty = AppConfig {
            excluded_directories: vec![" ".into()],
            ..Default::default()
        };
        assert!(empty.excluded_directory_pattern().is_none());
    }
}
