//! Span unit tests

use crate::util::span::{Position, SourceFile, Span};

#[cfg(test)]
mod position_tests {
    use super::*;

    #[test]
    fn test_position_creation() {
        let pos = Position::new(1, 5);
        assert_eq!(pos.line, 1);
        assert_eq!(pos.column, 5);
        assert_eq!(pos.offset, 0);
    }

    #[test]
    fn test_position_display() {
        assert_eq!(Position::new(10, 20).to_string(), "10:20");
    }
}

#[cfg(test)]
mod span_tests {
    use super::*;

    #[test]
    fn test_span_len_and_empty() {
        let span = Span::new(Position::with_offset(1, 1, 0), Position::with_offset(1, 5, 4));
        assert_eq!(span.len(), 4);
        assert!(!span.is_empty());

        let empty = Span::new(Position::with_offset(2, 3, 9), Position::with_offset(2, 3, 9));
        assert_eq!(empty.len(), 0);
        assert!(empty.is_empty());
    }

    #[test]
    fn test_span_merge() {
        let left = Span::new(Position::with_offset(1, 1, 0), Position::with_offset(1, 4, 3));
        let right = Span::new(Position::with_offset(1, 8, 7), Position::with_offset(2, 2, 12));
        let merged = left.merge(right);
        assert_eq!(merged.start, left.start);
        assert_eq!(merged.end, right.end);
        assert_eq!(right.merge(left), merged);
    }

    #[test]
    fn test_span_display() {
        let span = Span::new(Position::new(1, 1), Position::new(1, 10));
        assert_eq!(span.to_string(), "[1:1 - 1:10]");
    }
}

#[cfg(test)]
mod source_file_tests {
    use super::*;

    #[test]
    fn test_lines() {
        let file = SourceFile::new("tasks.lg", "let a = 1\r\nprint(a)\n");
        assert_eq!(file.line_count(), 3);
        assert_eq!(file.line(1), Some("let a = 1"));
        assert_eq!(file.line(2), Some("print(a)"));
        assert_eq!(file.line(3), Some(""));
        assert_eq!(file.line(0), None);
        assert_eq!(file.line(4), None);
        assert_eq!(file.to_string(), "tasks.lg");
    }

    #[test]
    fn test_position_from_offset() {
        let file = SourceFile::new("main", "line1\nlíne2");
        let pos = file.position_from_offset(0);
        assert_eq!((pos.line, pos.column), (1, 1));

        let pos = file.position_from_offset(5);
        assert_eq!((pos.line, pos.column), (1, 6));

        let pos = file.position_from_offset(6);
        assert_eq!((pos.line, pos.column), (2, 1));

        // Columns count characters, not bytes.
        let pos = file.position_from_offset(9);
        assert_eq!((pos.line, pos.column, pos.offset), (2, 3, 9));
    }

    #[test]
    fn test_snippet() {
        let file = SourceFile::new("main", "let a = 1\nlet = 2");
        let snippet = file.snippet(Position::new(2, 5)).unwrap();
        assert_eq!(snippet, " |\n2 | let = 2\n |     ^");
        assert!(file.snippet(Position::new(7, 1)).is_none());
    }
}
