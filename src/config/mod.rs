//! Configuration: compile-time security limits and runtime preferences
//!
//! Security boundaries (include depth, line length, directory entry caps) are
//! compile-time constants and cannot be loosened at runtime. User-facing
//! behavior (verbosity, strict mode, expected ownership) lives in runtime
//! preference structs populated from the environment with an optional TOML
//! overlay.

pub mod constants;
pub mod runtime;

pub use constants::compile_time;
pub use runtime::{InclusionPreferences, LexerPreferences, LoggingPreferences, Preferences};
