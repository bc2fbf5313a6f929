//! Deciding whether two files are equal for conflict handling.

use std::fs::{self, File};
use std::io::{self, BufReader, Read};
use std::path::Path;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use super::properties::FileAttributes;

const CHUNK_SIZE: usize = 64 * 1024;

bitflags! {
    /// Properties that must be equal for two files to count as the same file.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
    pub struct FileCompareOptions: u8 {
        const SIZE = 1;
        const MODIFIED_TIME = 1 << 1;
        const ATTRIBUTES = 1 << 2;
        const CONTENT = 1 << 3;
    }
}

impl FileCompareOptions {
    pub fn parse_list(input: &str) -> Result<Self, String> {
        input
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .try_fold(FileCompareOptions::empty(), |acc, name| {
                let flag = match name.to_ascii_lowercase().as_str() {
                    "size" => FileCompareOptions::SIZE,
                    "modified" | "modified-time" => FileCompareOptions::MODIFIED_TIME,
                    "attributes" => FileCompareOptions::ATTRIBUTES,
                    "content" => FileCompareOptions::CONTENT,
                    other => return Err(format!("unknown compare option '{}'", other)),
                };
                Ok(acc | flag)
            })
    }
}

/// Compares `first` and `second` on every property in `options`.
///
/// Empty options never report equality.
pub fn files_equal(first: &Path, second: &Path, options: FileCompareOptions) -> io::Result<bool> {
    if options.is_empty() {
        return Ok(false);
    }

    let a = fs::metadata(first)?;
    let b = fs::metadata(second)?;

    if (options.contains(FileCompareOptions::SIZE) || options.contains(FileCompareOptions::CONTENT))
        && a.len() != b.len()
    {
        return Ok(false);
    }

    if options.contains(FileCompareOptions::MODIFIED_TIME) && a.modified()? != b.modified()? {
        return Ok(false);
    }

    if options.contains(FileCompareOptions::ATTRIBUTES)
        && FileAttributes::from_metadata(first, &a) != FileAttributes::from_metadata(second, &b)
    {
        return Ok(false);
    }

    if options.contains(FileCompareOptions::CONTENT) {
        return contents_equal(first, second);
    }

    Ok(true)
}

fn contents_equal(first: &Path, second: &Path) -> io::Result<bool> {
    let mut a = BufReader::new(File::open(first)?);
    let mut b = BufReader::new(File::open(second)?);
    let mut buf_a = vec![0u8; CHUNK_SIZE];
    let mut buf_b = vec![0u8; CHUNK_SIZE];

    loop {
        let n = read_full(&mut a, &mut buf_a)?;
        let m = read_full(&mut b, &mut buf_b)?;
        if n != m || buf_a[..n] != buf_b[..m] {
            return Ok(false);
        }
        if n == 0 {
            return Ok(true);
        }
    }
}

fn read_full(reader: &mut impl Read, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
