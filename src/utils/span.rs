//! Source location tracking for the sudoers lexer
//!
//! Positions are tracked against the *current raw line* of whatever source
//! file is on top of the include stack: `offset` and `column` are byte
//! positions within that line, `line` is the physical line number of the
//! current source. Error messages therefore render as
//! "line N, columns X-Y" with the offending substring, which is what the
//! surrounding parser reports to the administrator.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A position within the current raw line of the active source.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub struct Position {
    /// Byte offset within the current raw line (0-based)
    pub offset: usize,
    /// Physical line number in the active source (1-based)
    pub line: u32,
    /// Column number (1-based, bytes)
    pub column: u32,
}

impl Position {
    pub fn new(offset: usize, line: u32) -> Self {
        Self {
            offset,
            line,
            column: offset as u32 + 1,
        }
    }

    /// Position of the first byte of the first line
    pub fn start() -> Self {
        Self {
            offset: 0,
            line: 1,
            column: 1,
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// A token's extent, start inclusive, end exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Span {
    pub start: Position,
    pub end: Position,
}

impl Span {
    pub fn new(start: Position, end: Position) -> Self {
        debug_assert!(
            start.line < end.line || start.offset <= end.offset,
            "Span start must not be after end"
        );
        Self { start, end }
    }

    /// A single-byte span at `pos`
    pub fn single(pos: Position) -> Self {
        Self {
            start: pos,
            end: Position::new(pos.offset + 1, pos.line),
        }
    }

    pub fn start(&self) -> Position {
        self.start
    }

    pub fn end(&self) -> Position {
        self.end
    }

    /// Byte length within one line; zero for spans that cross a line boundary
    pub fn len(&self) -> usize {
        if self.start.line == self.end.line {
            self.end.offset - self.start.offset
        } else {
            0
        }
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.start.line == self.end.line {
            write!(
                f,
                "{}:{}-{}",
                self.start.line, self.start.column, self.end.column
            )
        } else {
            write!(f, "{}-{}", self.start, self.end)
        }
    }
}

/// A value with its source location
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Spanned<T> {
    pub value: T,
    pub span: Span,
}

impl<T> Spanned<T> {
    pub fn new(value: T, span: Span) -> Self {
        Self { value, span }
    }

    pub fn map<U, F>(self, f: F) -> Spanned<U>
    where
        F: FnOnce(T) -> U,
    {
        Spanned {
            value: f(self.value),
            span: self.span,
        }
    }

    pub fn into_inner(self) -> T {
        self.value
    }
}

impl<T: fmt::Display> fmt::Display for Spanned<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value)
    }
}

/// Renders a diagnostic against the raw line the offending token came from.
///
/// The include stack discards line text as soon as a line is consumed, so the
/// lexer snapshots the current line into one of these when it produces an
/// error token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineDiagnostic {
    /// Source path the line came from
    pub path: String,
    /// The raw line, without its trailing newline
    pub line_text: String,
    /// Extent of the offending token within the line
    pub span: Span,
}

impl LineDiagnostic {
    pub fn new(path: &str, line_text: &str, span: Span) -> Self {
        Self {
            path: path.to_string(),
            line_text: line_text.trim_end_matches('\n').to_string(),
            span,
        }
    }

    /// Format the diagnostic with a caret underline, cargo-style
    pub fn render(&self, message: &str) -> String {
        let mut out = String::new();
        out.push_str(&format!("Error: {}\n", message));
        out.push_str(&format!(
            "  --> {}:{}:{}\n",
            self.path, self.span.start.line, self.span.start.column
        ));

        let line_num = format!("{}", self.span.start.line);
        let padding = " ".repeat(line_num.len());
        out.push_str(&format!("   {} |\n", padding));
        out.push_str(&format!("{} | {}\n", line_num, self.line_text));

        let mut underline = format!("   {} | ", padding);
        for _ in 1..self.span.start.column {
            underline.push(' ');
        }
        for _ in 0..self.span.len().max(1) {
            underline.push('^');
        }
        out.push_str(&underline);
        out.push('\n');
        out
    }
}
