//! Lexical analysis: the tokenizer and its supporting machinery

pub mod address;
pub mod digest;
pub mod line_buffer;
pub mod string_escape;
pub mod tokenizer;

pub use address::{classify_address, AddressClass};
pub use digest::{is_valid_digest, DigestAlg};
pub use line_buffer::LineBuffer;
pub use string_escape::StringEscaper;
pub use tokenizer::Lexer;
