//! Shared utility types

pub mod span;

pub use span::{LineDiagnostic, Position, Span, Spanned};
