//! Source location tracking

/// A span represents a range in the source code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Span {
    /// Start byte offset
    pub start: usize,
    /// End byte offset (exclusive)
    pub end: usize,
    /// File ID
    pub file_id: usize,
}

impl Span {
    /// Create a new span
    pub fn new(start: usize, end: usize, file_id: usize) -> Self {
        Self { start, end, file_id }
    }

    /// Create a dummy span (runtime-library declarations, tests)
    pub fn dummy() -> Self {
        Self { start: 0, end: 0, file_id: 0 }
    }

    /// Merge two spans
    pub fn merge(&self, other: &Span) -> Span {
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
            file_id: self.file_id,
        }
    }

    /// 1-based line and column of the span start within `source`.
    ///
    /// Offsets are counted in chars, matching the lexer.
    pub fn line_col(&self, source: &str) -> (u32, u32) {
        let mut line = 1;
        let mut col = 1;
        for c in source.chars().take(self.start) {
            if c == '\n' {
                line += 1;
                col = 1;
            } else {
                col += 1;
            }
        }
        (line, col)
    }
}

impl Default for Span {
    fn default() -> Self {
        Self::dummy()
    }
}
