//! Secure file inclusion: source opening, path expansion, and the
//! depth-bounded include stack

pub mod source;
pub mod stack;

pub use source::{expand_include_path, DirCheckError, FsSourceOpener, ListDirError, SourceOpener};
pub use stack::{IncludeFrame, IncludeStack, PopOutcome};
