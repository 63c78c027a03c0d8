//! Language-level definitions shared by the lexer and its consumers

pub mod keywords;

pub use keywords::Keyword;
