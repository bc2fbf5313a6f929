//! Text encodings, byte-order-mark sniffing and conversion.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Encoding {
    #[default]
    Utf8,
    Utf16Le,
    Utf16Be,
    Utf32Le,
    Utf32Be,
    Latin1,
}

impl Encoding {
    /// The byte order mark written for this encoding, empty for Latin-1.
    pub fn preamble(self) -> &'static [u8] {
        match self {
            Encoding::Utf8 => &[0xEF, 0xBB, 0xBF],
            Encoding::Utf16Le => &[0xFF, 0xFE],
            Encoding::Utf16Be => &[0xFE, 0xFF],
            Encoding::Utf32Le => &[0xFF, 0xFE, 0x00, 0x00],
            Encoding::Utf32Be => &[0x00, 0x00, 0xFE, 0xFF],
            Encoding::Latin1 => &[],
        }
    }

    /// Decodes `bytes` (without preamble). Returns the text and whether any
    /// invalid sequence had to be replaced.
    pub fn decode(self, bytes: &[u8]) -> (String, bool) {
        match self {
            Encoding::Utf8 => match std::str::from_utf8(bytes) {
                Ok(text) => (text.to_string(), false),
                Err(_) => (String::from_utf8_lossy(bytes).into_owned(), true),
            },
            Encoding::Utf16Le | Encoding::Utf16Be => {
                let units = bytes.chunks(2).map(|pair| match (pair, self) {
                    ([lo, hi], Encoding::Utf16Le) => u16::from_le_bytes([*lo, *hi]),
                    ([hi, lo], _) => u16::from_be_bytes([*hi, *lo]),
                    _ => 0xFFFD,
                });
                let mut lossy = bytes.len() % 2 != 0;
                let text = char::decode_utf16(units)
                    .map(|r| {
                        r.unwrap_or_else(|_| {
                            lossy = true;
                            char::REPLACEMENT_CHARACTER
                        })
                    })
                    .collect();
                (text, lossy)
            }
            Encoding::Utf32Le | Encoding::Utf32Be => {
                let mut lossy = bytes.len() % 4 != 0;
                let text = bytes
                    .chunks_exact(4)
                    .map(|quad| {
                        let quad = [quad[0], quad[1], quad[2], quad[3]];
                        let value = if self == Encoding::Utf32Le {
                            u32::from_le_bytes(quad)
                        } else {
                            u32::from_be_bytes(quad)
                        };
                        char::from_u32(value).unwrap_or_else(|| {
                            lossy = true;
                            char::REPLACEMENT_CHARACTER
                        })
                    })
                    .collect();
                (text, lossy)
            }
            Encoding::Latin1 => (bytes.iter().map(|&b| char::from(b)).collect(), false),
        }
    }

    /// Encodes `text`, optionally prefixed with the byte order mark.
    ///
    /// Returns `None` when `text` holds a character Latin-1 cannot represent.
    pub fn encode(self, text: &str, with_preamble: bool) -> Option<Vec<u8>> {
        let mut out = Vec::with_capacity(text.len() + 4);
        if with_preamble {
            out.extend_from_slice(self.preamble());
        }
        match self {
            Encoding::Utf8 => out.extend_from_slice(text.as_bytes()),
            Encoding::Utf16Le => text
                .encode_utf16()
                .for_each(|u| out.extend_from_slice(&u.to_le_bytes())),
            Encoding::Utf16Be => text
                .encode_utf16()
                .for_each(|u| out.extend_from_slice(&u.to_be_bytes())),
            Encoding::Utf32Le => text
                .chars()
                .for_each(|c| out.extend_from_slice(&(c as u32).to_le_bytes())),
            Encoding::Utf32Be => text
                .chars()
                .for_each(|c| out.extend_from_slice(&(c as u32).to_be_bytes())),
            Encoding::Latin1 => {
                for c in text.chars() {
                    out.push(u8::try_from(u32::from(c)).ok()?);
                }
            }
        }
        Some(out)
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Encoding::Utf8 => "utf-8",
            Encoding::Utf16Le => "utf-16le",
            Encoding::Utf16Be => "utf-16be",
            Encoding::Utf32Le => "utf-32le",
            Encoding::Utf32Be => "utf-32be",
            Encoding::Latin1 => "latin1",
        };
        f.write_str(name)
    }
}

impl FromStr for Encoding {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('_', "-").as_str() {
            "utf-8" | "utf8" => Ok(Encoding::Utf8),
            "utf-16" | "utf-16le" | "utf16le" | "unicode" => Ok(Encoding::Utf16Le),
            "utf-16be" | "utf16be" => Ok(Encoding::Utf16Be),
            "utf-32" | "utf-32le" | "utf32le" => Ok(Encoding::Utf32Le),
            "utf-32be" | "utf32be" => Ok(Encoding::Utf32Be),
            "latin1" | "latin-1" | "iso-8859-1" => Ok(Encoding::Latin1),
            other => Err(format!("unknown encoding '{}'", other)),
        }
    }
}

/// Sniffs the encoding of a file from its leading bytes.
pub trait EncodingDetector: Send + Sync {
    /// Returns the detected encoding and the length of its preamble in bytes.
    fn detect(&self, head: &[u8]) -> Option<(Encoding, usize)>;
}

/// Recognises UTF-8, UTF-16 and UTF-32 byte order marks.
#[derive(Debug, Clone, Copy, Default)]
pub struct BomDetector;

/// Longest preamble any detector needs to see.
pub const MAX_PREAMBLE_LEN: usize = 4;

impl EncodingDetector for BomDetector {
    fn detect(&self, head: &[u8]) -> Option<(Encoding, usize)> {
        // UTF-32 LE shares its first two bytes with UTF-16 LE.
        [
            Encoding::Utf32Le,
            Encoding::Utf32Be,
            Encoding::Utf8,
            Encoding::Utf16Le,
            Encoding::Utf16Be,
        ]
        .into_iter()
        .find(|e| head.starts_with(e.preamble()))
        .map(|e| (e, e.preamble().len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_utf8_bom() {
        assert_eq!(
            BomDetector.detect(&[0xEF, 0xBB, 0xBF, b'a']),
            Some((Encoding::Utf8, 3))
        );
    }

    #[test]
    fn prefers_utf32_le_over_utf16_le() {
        assert_eq!(
            BomDetector.detect(&[0xFF, 0xFE, 0x00, 0x00]),
            Some((Encoding::Utf32Le, 4))
        );
        assert_eq!(
            BomDetector.detect(&[0xFF, 0xFE, b'a', 0x00]),
            Some((Encoding::Utf16Le, 2))
        );
    }

    #[test]
    fn no_bom_detected_in_plain_text() {
        assert_eq!(BomDetector.detect(b"plain"), None);
        assert_eq!(BomDetector.detect(&[]), None);
    }

    #[test]
    fn utf16_text_survives_encoding() {
        let bytes = Encoding::Utf16Be.encode("héllo", true).unwrap();
        assert_eq!(&bytes[..2], &[0xFE, 0xFF]);
        let (text, lossy) = Encoding::Utf16Be.decode(&bytes[2..]);
        assert_eq!(text, "héllo");
        assert!(!lossy);
    }

    #[test]
    fn invalid_utf8_is_flagged_as_lossy() {
        let (text, lossy) = Encoding::Utf8.decode(&[b'a', 0xFF, b'b']);
        assert!(lossy);
        assert_eq!(text, "a\u{FFFD}b");
    }

    #[test]
    fn latin1_rejects_unrepresentable_characters() {
        assert_eq!(Encoding::Latin1.encode("é", false), Some(vec![0xE9]));
        assert_eq!(Encoding::Latin1.encode("é€", false), None);
    }

    #[test]
    fn parses_encoding_names() {
        assert_eq!("UTF-8".parse::<Encoding>(), Ok(Encoding::Utf8));
        assert_eq!("utf_16be".parse::<Encoding>(), Ok(Encoding::Utf16Be));
        assert!("ebcdic".parse::<Encoding>().is_err());
    }
}
