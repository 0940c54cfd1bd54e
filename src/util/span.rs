//! Source location tracking

use std::fmt;

/// Source position (line, column, and byte offset)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Position {
    /// Line number (1-indexed)
    pub line: usize,
    /// Column number (1-indexed, in characters)
    pub column: usize,
    /// Byte offset from start of source
    pub offset: usize,
}

impl Position {
    /// Create a new position
    #[inline]
    pub fn new(
        line: usize,
        column: usize,
    ) -> Self {
        Self {
            line,
            column,
            offset: 0,
        }
    }

    /// Create a new position with offset
    #[inline]
    pub fn with_offset(
        line: usize,
        column: usize,
        offset: usize,
    ) -> Self {
        Self {
            line,
            column,
            offset,
        }
    }
}

impl fmt::Display for Position {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// Source span (start position to end position)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Span {
    /// Start position (inclusive)
    pub start: Position,
    /// End position (exclusive)
    pub end: Position,
}

impl Span {
    #[inline]
    pub fn new(
        start: Position,
        end: Position,
    ) -> Self {
        Self { start, end }
    }

    /// Smallest span covering both.
    pub fn merge(
        self,
        other: Span,
    ) -> Span {
        let start = if other.start.offset < self.start.offset {
            other.start
        } else {
            self.start
        };
        let end = if other.end.offset > self.end.offset {
            other.end
        } else {
            self.end
        };
        Span { start, end }
    }

    /// Length in bytes
    #[inline]
    pub fn len(&self) -> usize {
        self.end.offset.saturating_sub(self.start.offset)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.start.offset == self.end.offset
    }
}

impl fmt::Display for Span {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "[{} - {}]", self.start, self.end)
    }
}

/// A named piece of source text, used to quote the line an error points at.
#[derive(Debug, Clone)]
pub struct SourceFile {
    /// Chunk name
    pub name: String,
    /// Source text
    pub content: String,
    /// Byte offset of the start of every line
    line_offsets: Vec<usize>,
}

impl SourceFile {
    pub fn new(
        name: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        let content = content.into();
        let line_offsets = std::iter::once(0)
            .chain(content.match_indices('\n').map(|(i, _)| i + 1))
            .collect();
        Self {
            name: name.into(),
            content,
            line_offsets,
        }
    }

    /// Number of lines
    pub fn line_count(&self) -> usize {
        self.line_offsets.len()
    }

    /// Text of a 1-indexed line, without its line terminator.
    pub fn line(
        &self,
        line: usize,
    ) -> Option<&str> {
        let start = *self.line_offsets.get(line.checked_sub(1)?)?;
        let end = self
            .line_offsets
            .get(line)
            .map(|&next| next - 1)
            .unwrap_or(self.content.len());
        self.content
            .get(start..end)
            .map(|text| text.strip_suffix('\r').unwrap_or(text))
    }

    /// Position of a byte offset.
    pub fn position_from_offset(
        &self,
        offset: usize,
    ) -> Position {
        let line = self.line_offsets.partition_point(|&o| o <= offset).max(1);
        let start = self.line_offsets[line - 1];
        let column = self
            .content
            .get(start..offset.min(self.content.len()))
            .map(|text| text.chars().count())
            .unwrap_or(0);
        Position::with_offset(line, column + 1, offset)
    }

    /// The line at `position` with a caret under its column.
    pub fn snippet(
        &self,
        position: Position,
    ) -> Option<String> {
        let text = self.line(position.line)?;
        let gutter = position.line.to_string();
        let pad = " ".repeat(gutter.len());
        let caret = " ".repeat(position.column.saturating_sub(1));
        Some(format!("{pad} |\n{gutter} | {text}\n{pad} | {caret}^"))
    }
}

impl fmt::Display for SourceFile {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

#[cfg(test)]
mod tests;
