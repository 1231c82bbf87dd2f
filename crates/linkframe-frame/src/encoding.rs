//! Text encodings a link can negotiate.
//!
//! Both ends must agree; nothing on the wire says which one is in use.

use std::fmt;

use crate::error::{FrameError, Result};

/// Encoding applied to message payloads.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum TextEncoding {
    #[default]
    Utf8,
    Utf16Le,
    Utf16Be,
}

impl TextEncoding {
    /// Number of bytes `ch` occupies in this encoding.
    pub fn char_width(self, ch: char) -> usize {
        match self {
            Self::Utf8 => ch.len_utf8(),
            Self::Utf16Le | Self::Utf16Be => ch.len_utf16() * 2,
        }
    }

    /// Encoded byte length of `text`, measured without allocating.
    pub fn measure(self, text: &str) -> usize {
        match self {
            Self::Utf8 => text.len(),
            Self::Utf16Le | Self::Utf16Be => text.encode_utf16().count() * 2,
        }
    }

    /// Encode `text` into bytes.
    pub fn encode(self, text: &str) -> Vec<u8> {
        match self {
            Self::Utf8 => text.as_bytes().to_vec(),
            Self::Utf16Le => text.encode_utf16().flat_map(u16::to_le_bytes).collect(),
            Self::Utf16Be => text.encode_utf16().flat_map(u16::to_be_bytes).collect(),
        }
    }

    /// Longest prefix of `text` whose encoding fits in `max` bytes.
    ///
    /// Cuts only between characters, so the result always decodes.
    pub fn truncated_prefix(self, text: &str, max: usize) -> &str {
        let mut size = 0usize;
        let mut end = 0usize;
        for (idx, ch) in text.char_indices() {
            let width = self.char_width(ch);
            if size + width > max {
                break;
            }
            size += width;
            end = idx + ch.len_utf8();
        }
        &text[..end]
    }

    /// Decode payload bytes into a message.
    pub fn decode(self, bytes: &[u8]) -> Result<String> {
        match self {
            Self::Utf8 => std::str::from_utf8(bytes)
                .map(str::to_owned)
                .map_err(|err| self.invalid(err.to_string())),
            Self::Utf16Le | Self::Utf16Be => {
                if bytes.len() % 2 != 0 {
                    return Err(self.invalid(format!("odd byte length {}", bytes.len())));
                }
                let units: Vec<u16> = bytes
                    .chunks_exact(2)
                    .map(|pair| {
                        let pair = [pair[0], pair[1]];
                        if self == Self::Utf16Le {
                            u16::from_le_bytes(pair)
                        } else {
                            u16::from_be_bytes(pair)
                        }
                    })
                    .collect();
                String::from_utf16(&units).map_err(|err| self.invalid(err.to_string()))
            }
        }
    }

    fn invalid(self, reason: String) -> FrameError {
        FrameError::InvalidText {
            encoding: self,
            reason,
        }
    }
}

impl fmt::Display for TextEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Utf8 => "utf-8",
            Self::Utf16Le => "utf-16le",
            Self::Utf16Be => "utf-16be",
        };
        f.write_str(name)
    }
}
