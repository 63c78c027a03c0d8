//! Quoted-string accumulation and classification
//!
//! Inside double quotes only `\"` collapses to a bare quote; any other
//! backslash escape keeps both characters so the parser sees the original
//! spelling. A string may span physical lines via `\<newline>` continuations,
//! so the accumulator lives across refills. Accumulation is capped at
//! MAX_STRING_LENGTH bytes.

use crate::config::compile_time::lexical::MAX_STRING_LENGTH;
use crate::tokens::{ErrorKind, Token};

#[derive(Debug, Default)]
pub struct StringEscaper {
    buf: String,
}

impl StringEscaper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, c: char) {
        if self.buf.len() < MAX_STRING_LENGTH {
            self.buf.push(c);
        }
    }

    /// Append a backslash escape: `\"` collapses, everything else is kept
    /// with its backslash
    pub fn push_escaped(&mut self, c: char) {
        if c == '"' {
            self.push('"');
        } else {
            self.push('\\');
            self.push(c);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Classify the accumulated text and reset the accumulator.
    ///
    /// In user and host list positions (`group_context`), a leading `%` or
    /// `+` sigil makes the string a group or netgroup reference with the
    /// sigil stripped. Elsewhere every quoted string is a plain word.
    pub fn finish(&mut self, group_context: bool) -> Result<Token, ErrorKind> {
        let text = std::mem::take(&mut self.buf);

        if text.is_empty() {
            return Err(ErrorKind::EmptyString);
        }

        if group_context {
            if let Some(rest) = text.strip_prefix('%') {
                let name_ok = match rest.strip_prefix(':') {
                    Some(name) => !name.is_empty(),
                    None => !rest.is_empty(),
                };
                if !name_ok {
                    return Err(ErrorKind::EmptyGroup);
                }
                return Ok(Token::Usergroup(rest.to_string()));
            }
            if let Some(rest) = text.strip_prefix('+') {
                if rest.is_empty() {
                    return Err(ErrorKind::EmptyNetgroup);
                }
                return Ok(Token::Netgroup(rest.to_string()));
            }
        }

        Ok(Token::Word(text))
    }
}
