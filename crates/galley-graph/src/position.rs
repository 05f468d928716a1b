//! Source positions and byte-offset to line/column conversion.

use memchr::memchr_iter;
use serde::{Deserialize, Serialize};

/// A 0-based line/column position in a text source.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Position {
    pub line: u32,
    pub column: u32,
}

impl Position {
    pub fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }

    pub fn zeroed() -> Self {
        Self::default()
    }
}

impl std::fmt::Display for Position {
    /// 1-based rendering, the convention of compiler diagnostics.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.line + 1, self.column + 1)
    }
}

/// Precomputed line starts of one text, for byte-offset lookups.
///
/// Columns are byte columns within the line, which is what the scanners
/// produce and the error renderer consumes.
#[derive(Debug, Clone)]
pub struct LineIndex {
    line_starts: Vec<u32>,
}

impl LineIndex {
    pub fn new(text: &str) -> Self {
        let mut line_starts = Vec::with_capacity(128);
        line_starts.push(0);
        for nl in memchr_iter(b'\n', text.as_bytes()) {
            line_starts.push(nl as u32 + 1);
        }
        Self { line_starts }
    }

    /// Converts a byte offset into a position. Offsets past the end clamp
    /// to the last line.
    pub fn position_of(&self, offset: usize) -> Position {
        let offset = offset as u32;
        let line = match self.line_starts.binary_search(&offset) {
            Ok(idx) => idx,
            Err(idx) => idx - 1,
        };
        Position {
            line: line as u32,
            column: offset - self.line_starts[line],
        }
    }

    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }

    /// Byte range of one line within the original text, newline excluded.
    pub fn line_span(&self, line: usize, text_len: usize) -> Option<(usize, usize)> {
        let start = *self.line_starts.get(line)? as usize;
        let end = self
            .line_starts
            .get(line + 1)
            .map(|next| (*next as usize).saturating_sub(1))
            .unwrap_or(text_len);
        Some((start, end))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position_display_is_one_based() {
        assert_eq!(Position::new(9, 4).to_string(), "10:5");
    }

    #[test]
    fn test_line_index_lookups() {
        let text = "abc\ndef\n\nxyz";
        let index = LineIndex::new(text);
        assert_eq!(index.line_count(), 4);
        assert_eq!(index.position_of(0), Position::new(0, 0));
        assert_eq!(index.position_of(2), Position::new(0, 2));
        assert_eq!(index.position_of(4), Position::new(1, 0));
        assert_eq!(index.position_of(8), Position::new(2, 0));
        assert_eq!(index.position_of(9), Position::new(3, 0));
        assert_eq!(index.position_of(11), Position::new(3, 2));
    }

    #[test]
    fn test_line_index_clamps_past_end() {
        let index = LineIndex::new("ab");
        assert_eq!(index.position_of(100), Position::new(0, 98));
    }

    #[test]
    fn test_line_span() {
        let text = "abc\ndef\n";
        let index = LineIndex::new(text);
        assert_eq!(index.line_span(0, text.len()), Some((0, 3)));
        assert_eq!(index.line_span(1, text.len()), Some((4, 7)));
        // trailing newline opens an empty final line
        assert_eq!(index.line_span(2, text.len()), Some((8, 8)));
        assert_eq!(index.line_span(3, text.len()), None);
    }
}
