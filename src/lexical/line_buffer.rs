//! Line-at-a-time input buffer
//!
//! The tokenizer scans one raw line at a time. Every buffered line is
//! newline-terminated, even at end of file, so the scanner can rely on a
//! terminator byte being present. An embedded NUL truncates the line at the
//! NUL, which keeps downstream string handling well-defined.

use crate::config::compile_time::lexical::MAX_LINE_LENGTH;
use std::io::{self, BufRead};

#[derive(Debug, Default)]
pub struct LineBuffer {
    buf: Vec<u8>,
    off: usize,
    token_start: usize,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read the next raw line from `reader`, replacing the current one.
    /// Returns false at end of input.
    pub fn refill(&mut self, reader: &mut dyn BufRead) -> io::Result<bool> {
        self.buf.clear();
        self.off = 0;
        self.token_start = 0;

        let n = reader.read_until(b'\n', &mut self.buf)?;
        if n == 0 {
            return Ok(false);
        }
        if n > MAX_LINE_LENGTH {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "line too long",
            ));
        }

        if let Some(nul) = self.buf.iter().position(|&b| b == 0) {
            self.buf.truncate(nul);
        }
        if self.buf.last() != Some(&b'\n') {
            self.buf.push(b'\n');
        }

        Ok(true)
    }

    /// Whether every byte of the current line has been consumed
    pub fn is_exhausted(&self) -> bool {
        self.off >= self.buf.len()
    }

    /// Whether the scan position is at the first byte of the line
    pub fn at_line_start(&self) -> bool {
        self.off == 0
    }

    pub fn peek(&self) -> Option<u8> {
        self.buf.get(self.off).copied()
    }

    pub fn peek_at(&self, n: usize) -> Option<u8> {
        self.buf.get(self.off + n).copied()
    }

    /// Consume and return the next byte
    pub fn bump(&mut self) -> Option<u8> {
        let b = self.peek()?;
        self.off += 1;
        Some(b)
    }

    /// Mark the current position as the start of the next token
    pub fn begin_token(&mut self) {
        self.token_start = self.off;
    }

    pub fn token_start(&self) -> usize {
        self.token_start
    }

    pub fn offset(&self) -> usize {
        self.off
    }

    /// The whole current line, lossily decoded, for diagnostics
    pub fn line_text(&self) -> String {
        String::from_utf8_lossy(&self.buf).into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_refill_and_scan() {
        let mut reader = Cursor::new("abc def\nsecond\n");
        let mut line = LineBuffer::new();

        assert!(line.refill(&mut reader).unwrap());
        assert_eq!(line.bump(), Some(b'a'));
        assert_eq!(line.peek(), Some(b'b'));
        line.begin_token();
        line.bump();
        line.bump();
        assert_eq!((line.token_start(), line.offset()), (1, 3));

        while line.bump() != Some(b'\n') {}
        assert!(line.is_exhausted());

        assert!(line.refill(&mut reader).unwrap());
        assert_eq!(line.line_text(), "second\n");
        assert!(!line.refill(&mut reader).unwrap());
    }

    #[test]
    fn test_missing_final_newline_is_added() {
        let mut reader = Cursor::new("no newline");
        let mut line = LineBuffer::new();

        assert!(line.refill(&mut reader).unwrap());
        assert_eq!(line.line_text(), "no newline\n");
    }

    #[test]
    fn test_nul_truncates_line() {
        let mut reader = Cursor::new(&b"ab\0cd\n"[..]);
        let mut line = LineBuffer::new();

        assert!(line.refill(&mut reader).unwrap());
        assert_eq!(line.line_text(), "ab\n");
    }

    #[test]
    fn test_line_length_limit() {
        let long = vec![b'a'; MAX_LINE_LENGTH + 1];
        let mut reader = Cursor::new(long);
        let mut line = LineBuffer::new();

        let err = line.refill(&mut reader).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }
}
