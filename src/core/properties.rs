//! Pure predicates over file size, timestamps and attributes.

use bitflags::bitflags;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fs::Metadata;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

/// A single comparison such as `size > 10kb`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comparison<T> {
    pub op: CompareOp,
    pub value: T,
}

impl<T: PartialOrd> Comparison<T> {
    pub fn new(op: CompareOp, value: T) -> Self {
        Self { op, value }
    }

    pub fn test(&self, actual: &T) -> bool {
        match self.op {
            CompareOp::Eq => actual == &self.value,
            CompareOp::Ne => actual != &self.value,
            CompareOp::Lt => actual < &self.value,
            CompareOp::Le => actual <= &self.value,
            CompareOp::Gt => actual > &self.value,
            CompareOp::Ge => actual >= &self.value,
        }
    }

    /// Parses `"<=value"`; a missing operator means equality.
    pub fn parse<F>(input: &str, parse_value: F) -> Result<Self, String>
    where
        F: Fn(&str) -> Result<T, String>,
    {
        let input = input.trim();
        let (op, rest) = [
            ("<=", CompareOp::Le),
            (">=", CompareOp::Ge),
            ("!=", CompareOp::Ne),
            ("<", CompareOp::Lt),
            (">", CompareOp::Gt),
            ("=", CompareOp::Eq),
        ]
        .into_iter()
        .find_map(|(prefix, op)| input.strip_prefix(prefix).map(|rest| (op, rest)))
        .unwrap_or((CompareOp::Eq, input));

        Ok(Self::new(op, parse_value(rest.trim())?))
    }
}

/// Parses a size such as `512`, `10kb` or `1.5mb` into bytes (binary multiples).
pub fn parse_size(input: &str) -> Result<u64, String> {
    let lower = input.trim().to_ascii_lowercase();
    let split = lower
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(lower.len());
    let (number, unit) = lower.split_at(split);
    let multiplier: u64 = match unit.trim() {
        "" | "b" => 1,
        "k" | "kb" => 1024,
        "m" | "mb" => 1024 * 1024,
        "g" | "gb" => 1024 * 1024 * 1024,
        other => return Err(format!("unknown size unit '{}'", other)),
    };
    let number: f64 = number
        .parse()
        .map_err(|_| format!("invalid size '{}'", input))?;
    Ok((number * multiplier as f64) as u64)
}

/// Parses `YYYY-MM-DD` (midnight UTC) or an RFC 3339 timestamp.
pub fn parse_date(input: &str) -> Result<DateTime<Utc>, String> {
    if let Ok(date) = NaiveDate::parse_from_str(input, "%Y-%m-%d") {
        if let Some(midnight) = date.and_hms_opt(0, 0, 0) {
            return Ok(midnight.and_utc());
        }
    }
    DateTime::parse_from_rfc3339(input)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| format!("invalid date '{}': {}", input, e))
}

/// Size and time predicates, all combined with AND.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilePropertyFilter {
    pub size: Vec<Comparison<u64>>,
    pub creation_time: Vec<Comparison<DateTime<Utc>>>,
    pub modified_time: Vec<Comparison<DateTime<Utc>>>,
}

impl FilePropertyFilter {
    pub fn is_empty(&self) -> bool {
        self.size.is_empty() && self.creation_time.is_empty() && self.modified_time.is_empty()
    }

    /// Size predicates only apply to files. A timestamp the platform cannot
    /// provide fails its predicate.
    pub fn matches(&self, metadata: &Metadata, is_directory: bool) -> bool {
        if !is_directory && !self.size.iter().all(|c| c.test(&metadata.len())) {
            return false;
        }

        if !self.creation_time.is_empty() {
            match metadata.created() {
                Ok(created) => {
                    let created = DateTime::<Utc>::from(created);
                    if !self.creation_time.iter().all(|c| c.test(&created)) {
                        return false;
                    }
                }
                Err(_) => return false,
            }
        }

        if !self.modified_time.is_empty() {
            match metadata.modified() {
                Ok(modified) => {
                    let modified = DateTime::<Utc>::from(modified);
                    if !self.modified_time.iter().all(|c| c.test(&modified)) {
                        return false;
                    }
                }
                Err(_) => return false,
            }
        }

        true
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct FileAttributes: u32 {
        const READ_ONLY = 1;
        const HIDDEN = 1 << 1;
        const DIRECTORY = 1 << 2;
        const SYMLINK = 1 << 3;
        const EXECUTABLE = 1 << 4;
    }
}

impl FileAttributes {
    /// Attributes of `path`, where `metadata` must not follow symlinks.
    pub fn from_metadata(path: &Path, metadata: &Metadata) -> Self {
        let mut attributes = FileAttributes::empty();
        if metadata.permissions().readonly() {
            attributes |= FileAttributes::READ_ONLY;
        }
        if path
            .file_name()
            .is_some_and(|name| name.to_string_lossy().starts_with('.'))
        {
            attributes |= FileAttributes::HIDDEN;
        }
        if metadata.is_dir() {
            attributes |= FileAttributes::DIRECTORY;
        }
        if metadata.file_type().is_symlink() {
            attributes |= FileAttributes::SYMLINK;
        }
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if !metadata.is_dir() && metadata.permissions().mode() & 0o111 != 0 {
                attributes |= FileAttributes::EXECUTABLE;
            }
        }
        attributes
    }

    pub fn parse_list(input: &str) -> Result<Self, String> {
        input
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .try_fold(FileAttributes::empty(), |acc, name| {
                let flag = match name.to_ascii_lowercase().as_str() {
                    "read-only" | "readonly" => FileAttributes::READ_ONLY,
                    "hidden" => FileAttributes::HIDDEN,
                    "directory" => FileAttributes::DIRECTORY,
                    "symlink" => FileAttributes::SYMLINK,
                    "executable" => FileAttributes::EXECUTABLE,
                    other => return Err(format!("unknown attribute '{}'", other)),
                };
                Ok(acc | flag)
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn parses_sizes_with_units() {
        assert_eq!(parse_size("512"), Ok(512));
        assert_eq!(parse_size("10kb"), Ok(10 * 1024));
        assert_eq!(parse_size("1.5MB"), Ok(1024 * 1024 * 3 / 2));
        assert!(parse_size("3 parsecs").is_err());
    }

    #[test]
    fn parses_comparisons() {
        let c = Comparison::parse(">=10kb", parse_size).unwrap();
        assert_eq!(c, Comparison::new(CompareOp::Ge, 10 * 1024));
        let c = Comparison::parse("42", parse_size).unwrap();
        assert_eq!(c.op, CompareOp::Eq);
        assert!(c.test(&42));
        assert!(!c.test(&43));
    }

    #[test]
    fn parses_dates() {
        let date = parse_date("2024-03-01").unwrap();
        assert_eq!(date.to_rfc3339(), "2024-03-01T00:00:00+00:00");
        assert!(parse_date("2024-03-01T12:00:00Z").is_ok());
        assert!(parse_date("yesterday").is_err());
    }

    #[test]
    fn size_filter_applies_to_files_only() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a.txt");
        fs::write(&path, "12345").unwrap();

        let filter = FilePropertyFilter {
            size: vec![Comparison::new(CompareOp::Gt, 10)],
            ..Default::default()
        };
        assert!(!filter.matches(&fs::metadata(&path).unwrap(), false));
        assert!(filter.matches(&fs::metadata(dir.path()).unwrap(), true));
    }

    #[test]
    fn modified_time_filter() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a.txt");
        fs::write(&path, "x").unwrap();
        let metadata = fs::metadata(&path).unwrap();

        let recent = FilePropertyFilter {
            modified_time: vec![Comparison::new(CompareOp::Gt, parse_date("2000-01-01").unwrap())],
            ..Default::default()
        };
        assert!(recent.matches(&metadata, false));

        let ancient = FilePropertyFilter {
            modified_time: vec![Comparison::new(CompareOp::Lt, parse_date("2000-01-01").unwrap())],
            ..Default::default()
        };
        assert!(!ancient.matches(&metadata, false));
    }

    #[test]
    fn attributes_reflect_name_and_type() {
        let dir = tempdir().unwrap();
        let hidden = dir.path().join(".hidden");
        fs::write(&hidden, "x").unwrap();

        let attributes =
            FileAttributes::from_metadata(&hidden, &fs::symlink_metadata(&hidden).unwrap());
        assert!(attributes.contains(FileAttributes::HIDDEN));
        assert!(!attributes.contains(FileAttributes::DIRECTORY));

        let attributes =
            FileAttributes::from_metadata(dir.path(), &fs::symlink_metadata(dir.path()).unwrap());
        assert!(attributes.contains(FileAttributes::DIRECTORY));
    }

    #[test]
    fn parses_attribute_lists() {
        assert_eq!(
            FileAttributes::parse_list("hidden, read-only"),
            Ok(FileAttributes::HIDDEN | FileAttributes::READ_ONLY)
        );
        assert!(FileAttributes::parse_list("archive").is_err());
    }
}
