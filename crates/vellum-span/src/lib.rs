//! Byte positions in template source.
//!
//! The compiler points at template text with byte spans: an attribute
//! value, the opening tag of an element, the expression a parse error
//! sits in. [`LineIndex`] turns a span's offset into the line/column
//! pair shown in error messages.

use std::fmt;
use std::ops::Range;

/// A half-open byte range `[start, end)` into the template source.
///
/// Spans travel with markup nodes and compile errors; slicing the source
/// with [`Span::to_range`] recovers the original text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Span {
    /// First byte of the spanned text.
    pub start: u32,
    /// One past the last byte.
    pub end: u32,
}

impl Span {
    /// Span the bytes from `start` up to (not including) `end`.
    #[inline]
    pub const fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    /// A zero-width span sitting at `offset` — used for things that have
    /// a position but no text, like an attribute written without a value.
    #[inline]
    pub const fn empty(offset: u32) -> Self {
        Self {
            start: offset,
            end: offset,
        }
    }

    /// The span as an index range, for slicing the source string.
    #[inline]
    pub fn to_range(self) -> Range<usize> {
        self.start as usize..self.end as usize
    }
}

/// Maps byte offsets in a template to line/column positions.
///
/// Stores the offset of every newline; a lookup is a binary search plus
/// a subtraction.
#[derive(Debug, Clone)]
pub struct LineIndex {
    newlines: Vec<u32>,
}

impl LineIndex {
    /// Index the given template text.
    pub fn new(text: &str) -> Self {
        Self {
            newlines: text
                .bytes()
                .enumerate()
                .filter_map(|(i, b)| (b == b'\n').then_some(i as u32))
                .collect(),
        }
    }

    /// The line/column of a byte offset. Both are 0-indexed; the column
    /// counts bytes from the start of its line.
    pub fn line_col(&self, offset: u32) -> LineCol {
        let line = self.newlines.partition_point(|&newline| newline < offset);
        let line_start = if line == 0 {
            0
        } else {
            self.newlines[line - 1] + 1
        };
        LineCol {
            line: line as u32,
            col: offset - line_start,
        }
    }
}

/// A 0-indexed line/column position.
///
/// Displays 1-indexed as `line:col`, the way editors count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct LineCol {
    /// Line number.
    pub line: u32,
    /// Byte column within the line.
    pub col: u32,
}

impl fmt::Display for LineCol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line + 1, self.col + 1)
    }
}
