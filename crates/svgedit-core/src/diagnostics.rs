//! Non-fatal parse warnings tied to source positions.

use serde::{Deserialize, Serialize};

/// Zero-based position of a start tag in the source markup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SourceRange {
    pub line: u32,
    pub column: u32,
    /// Byte offset.
    pub offset: usize,
}

impl SourceRange {
    pub fn at(source: &str, offset: usize) -> Self {
        let (line, column) = offset_to_position(source, offset);
        Self {
            line,
            column,
            offset,
        }
    }
}

/// A construct the parser skipped or degraded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Warning {
    pub range: SourceRange,
    pub message: String,
}

impl Warning {
    pub fn new(range: SourceRange, message: impl Into<String>) -> Self {
        Self {
            range,
            message: message.into(),
        }
    }
}

/// Convert a byte offset in source text to (line, column), zero-indexed.
/// Columns count characters. Offsets past the end clamp to the end.
pub fn offset_to_position(source: &str, offset: usize) -> (u32, u32) {
    let mut line = 0u32;
    let mut col = 0u32;
    for (i, ch) in source.char_indices() {
        if i >= offset {
            break;
        }
        if ch == '\n' {
            line += 1;
            col = 0;
        } else {
            col += 1;
        }
    }
    (line, col)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn positions() {
        let src = "<svg>\n  <circle/>\n</svg>";
        assert_eq!(offset_to_position(src, 0), (0, 0));
        assert_eq!(offset_to_position(src, 8), (1, 2));
        assert_eq!(offset_to_position(src, 10_000), (2, 6));
    }

    #[test]
    fn warning_serializes_for_host() {
        let w = Warning::new(SourceRange::at("ab\ncd", 4), "`x` is unsupported property.");
        let json = serde_json::to_value(&w).unwrap();
        assert_eq!(json["range"]["line"], 1);
        assert_eq!(json["range"]["column"], 1);
        assert_eq!(json["range"]["offset"], 4);
    }
}
