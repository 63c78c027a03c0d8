//! Token definitions and collected stream support

pub mod token;
pub mod token_stream;

pub use token::{DefaultsBinding, ErrorKind, FatalError, Token};
pub use token_stream::TokenStream;
