//! Conversion between offset units.
//!
//! [`Patch`] spans are UTF-8 byte offsets. Editors built on JavaScript
//! strings report UTF-16 code unit offsets, and some tools count Unicode
//! scalar values, so patch documents name the unit they were written in.

use crate::patch::{Patch, PatchError, ReplaceOp, Span};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Unit in which span offsets are counted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Encoding {
    /// UTF-8 bytes
    #[default]
    Utf8,
    /// UTF-16 code units
    Utf16,
    /// Unicode scalar values
    Char,
}

impl Encoding {
    pub fn as_str(&self) -> &'static str {
        match self {
            Encoding::Utf8 => "utf8",
            Encoding::Utf16 => "utf16",
            Encoding::Char => "char",
        }
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Encoding {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "utf8" | "utf-8" | "byte" | "bytes" => Ok(Encoding::Utf8),
            "utf16" | "utf-16" => Ok(Encoding::Utf16),
            "char" | "chars" | "scalar" => Ok(Encoding::Char),
            other => Err(format!(
                "unknown offset encoding '{other}' (expected utf8, utf16 or char)"
            )),
        }
    }
}

/// Length of `text` measured in `encoding` units.
pub fn text_len(text: &str, encoding: Encoding) -> usize {
    match encoding {
        Encoding::Utf8 => text.len(),
        Encoding::Utf16 => text.encode_utf16().count(),
        Encoding::Char => text.chars().count(),
    }
}

/// Convert an offset counted in `encoding` units to a byte offset.
///
/// Fails when the offset is past the end of `text`, or when it lands inside
/// a character (for UTF-16, between the halves of a surrogate pair).
pub fn to_byte_offset(text: &str, offset: usize, encoding: Encoding) -> Result<usize, PatchError> {
    let past_end = || PatchError::Offset {
        offset,
        len: text_len(text, encoding),
    };

    match encoding {
        Encoding::Utf8 => {
            if offset > text.len() {
                Err(past_end())
            } else if !text.is_char_boundary(offset) {
                Err(PatchError::NotCharBoundary { offset })
            } else {
                Ok(offset)
            }
        }
        Encoding::Utf16 => {
            let mut units = 0;
            for (byte, c) in text.char_indices() {
                if units == offset {
                    return Ok(byte);
                }
                units += c.len_utf16();
                if units > offset {
                    return Err(PatchError::NotCharBoundary { offset });
                }
            }
            if units == offset {
                Ok(text.len())
            } else {
                Err(past_end())
            }
        }
        Encoding::Char => match text.char_indices().nth(offset) {
            Some((byte, _)) => Ok(byte),
            None if offset == text.chars().count() => Ok(text.len()),
            None => Err(past_end()),
        },
    }
}

/// Convert a byte offset into `encoding` units.
pub fn from_byte_offset(text: &str, byte: usize, encoding: Encoding) -> Result<usize, PatchError> {
    if byte > text.len() {
        return Err(PatchError::Offset {
            offset: byte,
            len: text.len(),
        });
    }
    if !text.is_char_boundary(byte) {
        return Err(PatchError::NotCharBoundary { offset: byte });
    }

    let head = &text[..byte];
    Ok(match encoding {
        Encoding::Utf8 => byte,
        Encoding::Utf16 => head.encode_utf16().count(),
        Encoding::Char => head.chars().count(),
    })
}

fn map_spans(
    patch: &Patch,
    mut convert: impl FnMut(usize) -> Result<usize, PatchError>,
) -> Result<Patch, PatchError> {
    patch
        .iter()
        .map(|op| {
            Ok(ReplaceOp {
                op: op.op,
                from: Span::new(convert(op.from.start)?, convert(op.from.end)?),
                to: op.to.clone(),
            })
        })
        .collect()
}

impl Patch {
    /// Re-express byte spans in `encoding` units, relative to `source`.
    pub fn encode(&self, source: &str, encoding: Encoding) -> Result<Patch, PatchError> {
        if encoding == Encoding::Utf8 {
            return Ok(self.clone());
        }
        map_spans(self, |byte| from_byte_offset(source, byte, encoding))
    }

    /// Convert spans counted in `encoding` units back to byte spans.
    pub fn decode(&self, source: &str, encoding: Encoding) -> Result<Patch, PatchError> {
        map_spans(self, |offset| to_byte_offset(source, offset, encoding))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{apply_patch, compute_patch};

    const TEXT: &str = "a🌍é\r\nb";

    #[test]
    fn test_parse_encoding() {
        assert_eq!("UTF-16".parse::<Encoding>().unwrap(), Encoding::Utf16);
        assert_eq!("bytes".parse::<Encoding>().unwrap(), Encoding::Utf8);
        assert_eq!("char".parse::<Encoding>().unwrap(), Encoding::Char);
        assert!("latin1".parse::<Encoding>().is_err());
    }

    #[test]
    fn test_text_len() {
        assert_eq!(text_len(TEXT, Encoding::Utf8), 10);
        assert_eq!(text_len(TEXT, Encoding::Utf16), 7);
        assert_eq!(text_len(TEXT, Encoding::Char), 6);
    }

    #[test]
    fn test_utf16_offsets() {
        assert_eq!(to_byte_offset(TEXT, 1, Encoding::Utf16).unwrap(), 1);
        assert_eq!(to_byte_offset(TEXT, 3, Encoding::Utf16).unwrap(), 5);
        assert_eq!(to_byte_offset(TEXT, 7, Encoding::Utf16).unwrap(), 10);
        assert_eq!(from_byte_offset(TEXT, 5, Encoding::Utf16).unwrap(), 3);
    }

    #[test]
    fn test_utf16_offset_inside_surrogate_pair() {
        assert_eq!(
            to_byte_offset(TEXT, 2, Encoding::Utf16),
            Err(PatchError::NotCharBoundary { offset: 2 })
        );
    }

    #[test]
    fn test_offset_past_end() {
        assert_eq!(
            to_byte_offset(TEXT, 8, Encoding::Utf16),
            Err(PatchError::Offset { offset: 8, len: 7 })
        );
        assert!(matches!(
            to_byte_offset(TEXT, 7, Encoding::Char),
            Err(PatchError::Offset { .. })
        ));
        assert!(from_byte_offset(TEXT, 11, Encoding::Char).is_err());
    }

    #[test]
    fn test_char_offsets() {
        assert_eq!(to_byte_offset(TEXT, 2, Encoding::Char).unwrap(), 5);
        assert_eq!(to_byte_offset(TEXT, 6, Encoding::Char).unwrap(), 10);
        assert_eq!(from_byte_offset(TEXT, 7, Encoding::Char).unwrap(), 3);
    }

    #[test]
    fn test_byte_offset_inside_character() {
        assert_eq!(
            from_byte_offset(TEXT, 2, Encoding::Utf16),
            Err(PatchError::NotCharBoundary { offset: 2 })
        );
        assert!(to_byte_offset(TEXT, 6, Encoding::Utf8).is_err());
    }

    #[test]
    fn test_patch_encode_decode() {
        let before = "Hello\r\n🌍 world";
        let after = "Hello\r\n🌍 brave world";
        let patch = compute_patch(before, after);

        let utf16 = patch.encode(before, Encoding::Utf16).unwrap();
        assert_eq!(utf16.ops()[0].from, Span::new(10, 10));

        let decoded = utf16.decode(before, Encoding::Utf16).unwrap();
        assert_eq!(decoded, patch);
        assert_eq!(apply_patch(before, &decoded).unwrap(), after);
    }

    #[test]
    fn test_decode_patch_from_editor() {
        // Offsets as a JavaScript editor reports them: "🌍" counts as 2.
        let source = "🌍 old";
        let patch = Patch::single(Span::new(3, 6), "new");
        let decoded = patch.decode(source, Encoding::Utf16).unwrap();
        assert_eq!(decoded.ops()[0].from, Span::new(5, 8));
        assert_eq!(apply_patch(source, &decoded).unwrap(), "🌍 new");
    }
}
