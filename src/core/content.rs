//! Reads file content for content filters and emptiness checks.

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use std::sync::Arc;

use super::encoding::{BomDetector, Encoding, EncodingDetector, MAX_PREAMBLE_LEN};
use super::error::{CoreResult, IoResultExt};

/// Decoded text of a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileContent {
    pub text: String,
    /// Encoding announced by the byte order mark, if the file had one.
    pub bom_encoding: Option<Encoding>,
    /// Encoding that was in effect when no byte order mark was found.
    pub encoding: Encoding,
    /// `true` if invalid sequences were replaced while decoding.
    pub lossy: bool,
}

impl FileContent {
    pub fn empty(encoding: Encoding) -> Self {
        Self {
            text: String::new(),
            bom_encoding: None,
            encoding,
            lossy: false,
        }
    }

    /// The byte order mark encoding wins over the default encoding.
    pub fn effective_encoding(&self) -> Encoding {
        self.bom_encoding.unwrap_or(self.encoding)
    }

    pub fn has_bom(&self) -> bool {
        self.bom_encoding.is_some()
    }
}

/// What a single read of a file found out.
#[derive(Debug, Clone)]
pub struct ContentProbe {
    /// Present when text was requested, or when the file has zero length.
    pub content: Option<FileContent>,
    /// `true` if the file has no bytes beyond its byte order mark.
    pub is_empty: bool,
    pub preamble_len: usize,
}

#[derive(Clone)]
pub struct ContentReader {
    detector: Arc<dyn EncodingDetector>,
    default_encoding: Encoding,
}

impl std::fmt::Debug for ContentReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentReader")
            .field("default_encoding", &self.default_encoding)
            .finish_non_exhaustive()
    }
}

impl Default for ContentReader {
    fn default() -> Self {
        Self::new(Encoding::Utf8)
    }
}

impl ContentReader {
    pub fn new(default_encoding: Encoding) -> Self {
        Self {
            detector: Arc::new(BomDetector),
            default_encoding,
        }
    }

    pub fn with_detector(mut self, detector: Arc<dyn EncodingDetector>) -> Self {
        self.detector = detector;
        self
    }

    pub fn default_encoding(&self) -> Encoding {
        self.default_encoding
    }

    /// Sniffs the byte order mark of `path` and reads its text when `read_text` is set.
    ///
    /// Zero-length files are reported as already-read empty content without
    /// touching their bytes.
    pub fn read(&self, path: &Path, read_text: bool) -> CoreResult<ContentProbe> {
        let mut file = File::open(path).with_path(path)?;
        let len = file.metadata().with_path(path)?.len();

        if len == 0 {
            return Ok(ContentProbe {
                content: Some(FileContent::empty(self.default_encoding)),
                is_empty: true,
                preamble_len: 0,
            });
        }

        let mut head = [0u8; MAX_PREAMBLE_LEN];
        let head_len = read_head(&mut file, &mut head).with_path(path)?;
        let detected = self.detector.detect(&head[..head_len]);
        let preamble_len = detected.map_or(0, |(_, n)| n);
        let is_empty = len == preamble_len as u64;

        if !read_text {
            return Ok(ContentProbe {
                content: None,
                is_empty,
                preamble_len,
            });
        }

        let bom_encoding = detected.map(|(encoding, _)| encoding);
        let encoding = bom_encoding.unwrap_or(self.default_encoding);

        let mut bytes = Vec::with_capacity(len as usize);
        bytes.extend_from_slice(&head[preamble_len..head_len]);
        file.read_to_end(&mut bytes).with_path(path)?;

        let (text, lossy) = encoding.decode(&bytes);
        Ok(ContentProbe {
            content: Some(FileContent {
                text,
                bom_encoding,
                encoding: self.default_encoding,
                lossy,
            }),
            is_empty,
            preamble_len,
        })
    }

    /// Length of the byte order mark of `path`, 0 if there is none.
    pub fn preamble_len(&self, path: &Path) -> CoreResult<usize> {
        Ok(self.read(path, false)?.preamble_len)
    }
}

fn read_head(file: &mut File, head: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < head.len() {
        match file.read(&mut head[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn zero_length_file_is_empty_content() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("empty.txt");
        fs::write(&path, b"").unwrap();

        let probe = ContentReader::default().read(&path, false).unwrap();
        assert!(probe.is_empty);
        assert_eq!(probe.content.unwrap().text, "");
    }

    #[test]
    fn bom_only_file_is_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bom.txt");
        fs::write(&path, [0xEF, 0xBB, 0xBF]).unwrap();

        let probe = ContentReader::default().read(&path, true).unwrap();
        assert!(probe.is_empty);
        assert_eq!(probe.preamble_len, 3);
        let content = probe.content.unwrap();
        assert_eq!(content.text, "");
        assert_eq!(content.bom_encoding, Some(Encoding::Utf8));
    }

    #[test]
    fn bom_encoding_overrides_default() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("utf16.txt");
        fs::write(&path, Encoding::Utf16Le.encode("foo bar", true).unwrap()).unwrap();

        let probe = ContentReader::new(Encoding::Latin1).read(&path, true).unwrap();
        let content = probe.content.unwrap();
        assert_eq!(content.text, "foo bar");
        assert_eq!(content.effective_encoding(), Encoding::Utf16Le);
        assert_eq!(content.encoding, Encoding::Latin1);
        assert!(!probe.is_empty);
    }

    #[test]
    fn text_is_skipped_when_not_requested() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a.txt");
        fs::write(&path, "foo").unwrap();

        let probe = ContentReader::default().read(&path, false).unwrap();
        assert!(probe.content.is_none());
        assert!(!probe.is_empty);
    }

    #[test]
    fn missing_file_is_a_recoverable_error() {
        let dir = tempdir().unwrap();
        let err = ContentReader::default()
            .read(&dir.path().join("missing.txt"), true)
            .unwrap_err();
        assert!(err.is_recoverable());
    }
}
