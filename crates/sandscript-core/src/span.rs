//! Source location tracking for error reporting and fault attribution.
//!
//! Provides [`Span`], attached by the IR builder to every node. The byte `offset`
//! feeds the statement-boundary map used to attribute runtime faults; `line` and
//! `col` are used in compile diagnostics.

use std::fmt;

/// A span of script source, represented by its starting position.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Span {
    /// Byte offset from the start of the source.
    pub offset: u32,
    /// 1-based source line.
    pub line: u32,
    /// 1-based byte column within the line.
    pub col: u32,
    /// Length in bytes.
    pub len: u32,
}

impl Span {
    /// Create a new span.
    #[inline]
    pub fn new(offset: u32, line: u32, col: u32, len: u32) -> Self {
        Self {
            offset,
            line,
            col,
            len,
        }
    }

    /// Create a zero-length span at a byte offset with unknown line information.
    #[inline]
    pub fn at(offset: u32) -> Self {
        Self {
            offset,
            line: 0,
            col: 0,
            len: 0,
        }
    }

    /// `true` when the span covers no source text.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// End offset (exclusive).
    #[inline]
    pub fn end(&self) -> u32 {
        self.offset + self.len
    }
}

impl fmt::Debug for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}@{}", self.line, self.col, self.offset)
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.col)
    }
}
