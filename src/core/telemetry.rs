//! Run-scoped counters describing how much of a tree was visited, matched and mutated.

use serde::Serialize;
use std::ops::AddAssign;
use std::time::Duration;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SearchTelemetry {
    pub searched_directory_count: usize,
    pub directory_count: usize,
    pub file_count: usize,
    pub matching_directory_count: usize,
    pub matching_file_count: usize,
    pub processed_directory_count: usize,
    pub processed_file_count: usize,
    /// Content matches found (or replacements computed).
    pub match_count: usize,
    /// Content matches acted upon, e.g. replaced.
    pub processed_match_count: usize,
    pub files_total_size: u64,
    pub elapsed: Duration,
}

impl SearchTelemetry {
    pub fn matching_count(&self) -> usize {
        self.matching_file_count + self.matching_directory_count
    }

    pub fn processed_count(&self) -> usize {
        self.processed_file_count + self.processed_directory_count
    }

    /// Merges counters collected for another root directory.
    pub fn add(&mut self, other: &SearchTelemetry) {
        self.searched_directory_count += other.searched_directory_count;
        self.directory_count += other.directory_count;
        self.file_count += other.file_count;
        self.matching_directory_count += other.matching_directory_count;
        self.matching_file_count += other.matching_file_count;
        self.processed_directory_count += other.processed_directory_count;
        self.processed_file_count += other.processed_file_count;
        self.match_count += other.match_count;
        self.processed_match_count += other.processed_match_count;
        self.files_total_size += other.files_total_size;
        self.elapsed += other.elapsed;
    }
}

impl AddAssign<&SearchTelemetry> for SearchTelemetry {
    fn add_assign(&mut self, rhs: &SearchTelemetry) {
        self.add(rhs);
    }
}

/// Why a command stopped before the match stream was exhausted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum TerminationReason {
    #[default]
    None,
    MaxReached,
    Canceled,
}
