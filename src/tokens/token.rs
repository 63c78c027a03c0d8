//! Token system for the sudoers policy language
//!
//! Tokens carry their own data: commands keep their argument text, digests
//! keep their algorithm, group and netgroup references are stored with their
//! sigil stripped. Recoverable lexical errors are tokens too, so the parser
//! can report them and keep going.

use crate::grammar::keywords::Keyword;
use crate::lexical::digest::DigestAlg;
use crate::logging::codes::{self, Code};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which clause a `Defaults` entry binds to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DefaultsBinding {
    /// `Defaults` with no suffix
    Plain,
    /// `Defaults:user_list`
    User,
    /// `Defaults>runas_list`
    Runas,
    /// `Defaults@host_list`
    Host,
    /// `Defaults!cmnd_list`
    Cmnd,
}

impl DefaultsBinding {
    pub fn as_suffix(&self) -> &'static str {
        match self {
            Self::Plain => "",
            Self::User => ":",
            Self::Runas => ">",
            Self::Host => "@",
            Self::Cmnd => "!",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Token {
    // Punctuation
    Comma,
    Equals,
    Minus,
    Colon,
    LParen,
    RParen,
    /// An odd-length run of `!`; even-length runs cancel out and emit nothing
    Bang,
    Newline,
    /// `+=` in a Defaults value position
    PlusEquals,
    /// `-=` in a Defaults value position
    MinusEquals,

    /// Reserved words: tags, options, alias class introducers, ALL
    Keyword(Keyword),
    /// `Defaults` with its binding suffix
    Defaults(DefaultsBinding),
    /// A Defaults variable name
    Defvar(String),

    /// Unreserved word, quoted or bare
    Word(String),
    /// Upper-case alias reference, `[A-Z][A-Z0-9_]*`
    Alias(String),
    /// `%group`, `%:nonunix_group`, or `%#gid`, sigil stripped
    Usergroup(String),
    /// `+netgroup`, sigil stripped
    Netgroup(String),
    /// IPv4 or IPv6 address, optionally with a netmask suffix
    NtwkAddr(String),
    /// Fully-qualified command path with optional argument text
    Command {
        path: String,
        args: Option<String>,
    },
    /// A digest specification fused with its algorithm
    Digest {
        alg: DigestAlg,
        text: String,
    },

    /// `@include` or legacy `#include`; consumed internally during splicing
    Include {
        path: String,
    },
    /// `@includedir` or legacy `#includedir`; consumed internally during splicing
    IncludeDir {
        path: String,
    },

    /// Recoverable lexical error
    Error(ErrorKind),
    /// End of all input, after the include stack is exhausted
    Eof,
}

impl Token {
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }

    pub fn is_newline(&self) -> bool {
        matches!(self, Self::Newline)
    }

    /// Get keyword if this token is a keyword
    pub fn as_keyword(&self) -> Option<Keyword> {
        match self {
            Self::Keyword(kw) => Some(*kw),
            _ => None,
        }
    }

    /// Get word text if this token is a word
    pub fn as_word(&self) -> Option<&str> {
        match self {
            Self::Word(text) => Some(text),
            _ => None,
        }
    }

    /// Check if this token matches a specific keyword
    pub fn is_keyword(&self, keyword: Keyword) -> bool {
        matches!(self, Self::Keyword(kw) if *kw == keyword)
    }

    /// Tokens the parser treats as statement separators
    pub fn is_separator(&self) -> bool {
        matches!(self, Self::Newline | Self::Eof)
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Comma => write!(f, ","),
            Self::Equals => write!(f, "="),
            Self::Minus => write!(f, "-"),
            Self::Colon => write!(f, ":"),
            Self::LParen => write!(f, "("),
            Self::RParen => write!(f, ")"),
            Self::Bang => write!(f, "!"),
            Self::Newline => write!(f, "\\n"),
            Self::PlusEquals => write!(f, "+="),
            Self::MinusEquals => write!(f, "-="),
            Self::Keyword(kw) => write!(f, "{}", kw.as_str()),
            Self::Defaults(binding) => write!(f, "Defaults{}", binding.as_suffix()),
            Self::Defvar(name) => write!(f, "{}", name),
            Self::Word(text) => write!(f, "{}", text),
            Self::Alias(name) => write!(f, "{}", name),
            Self::Usergroup(name) => write!(f, "%{}", name),
            Self::Netgroup(name) => write!(f, "+{}", name),
            Self::NtwkAddr(addr) => write!(f, "{}", addr),
            Self::Command { path, args } => match args {
                Some(args) => write!(f, "{} {}", path, args),
                None => write!(f, "{}", path),
            },
            Self::Digest { alg, text } => write!(f, "{}:{}", alg.as_str(), text),
            Self::Include { path } => write!(f, "@include {}", path),
            Self::IncludeDir { path } => write!(f, "@includedir {}", path),
            Self::Error(kind) => write!(f, "<error: {}>", kind),
            Self::Eof => write!(f, "<eof>"),
        }
    }
}

/// Recoverable lexical errors, surfaced as `Token::Error`
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
pub enum ErrorKind {
    #[error("no matching token: '{0}'")]
    NoMatchingToken(String),

    #[error("unexpected line break in string")]
    UnexpectedLineBreak,

    #[error("empty string")]
    EmptyString,

    #[error("empty group")]
    EmptyGroup,

    #[error("empty netgroup")]
    EmptyNetgroup,

    #[error("invalid IPv6 address")]
    InvalidIpv6,

    #[error("unterminated regular expression")]
    UnterminatedRegex,

    #[error("invalid regular expression: {0}")]
    InvalidRegex(String),

    #[error("invalid line continuation")]
    InvalidLineContinuation,

    #[error("missing include path")]
    MissingIncludePath,
}

impl ErrorKind {
    pub fn error_code(&self) -> Code {
        match self {
            Self::NoMatchingToken(_) => codes::lexical::NO_MATCHING_TOKEN,
            Self::UnexpectedLineBreak => codes::lexical::UNEXPECTED_LINE_BREAK,
            Self::EmptyString => codes::lexical::EMPTY_STRING,
            Self::EmptyGroup => codes::lexical::EMPTY_GROUP,
            Self::EmptyNetgroup => codes::lexical::EMPTY_NETGROUP,
            Self::InvalidIpv6 => codes::lexical::INVALID_IPV6,
            Self::UnterminatedRegex => codes::lexical::INVALID_REGEX,
            Self::InvalidRegex(_) => codes::lexical::INVALID_REGEX,
            Self::InvalidLineContinuation => codes::lexical::INVALID_LINE_CONTINUATION,
            Self::MissingIncludePath => codes::lexical::NO_MATCHING_TOKEN,
        }
    }
}

/// Errors that abort tokenization entirely
#[derive(Debug, thiserror::Error)]
pub enum FatalError {
    #[error("too many levels of includes")]
    TooManyIncludes,

    #[error("unable to open {path}: {message}")]
    IncludeOpen { path: String, message: String },

    #[error("unable to read {path}: {message}")]
    Read { path: String, message: String },

    #[error("include path too long: {path}")]
    PathTooLong { path: String },

    #[error("too many files in {dir}")]
    TooManyDirEntries { dir: String },
}

impl FatalError {
    pub fn error_code(&self) -> Code {
        match self {
            Self::TooManyIncludes => codes::inclusion::DEPTH_EXCEEDED,
            Self::IncludeOpen { .. } => codes::inclusion::OPEN_FAILED,
            Self::Read { .. } => codes::inclusion::READ_FAILED,
            Self::PathTooLong { .. } => codes::inclusion::PATH_TOO_LONG,
            Self::TooManyDirEntries { .. } => codes::inclusion::TOO_MANY_DIR_ENTRIES,
        }
    }
}
