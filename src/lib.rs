// Internal modules
pub mod config;
pub mod grammar;
pub mod include;
pub mod lexical;
#[macro_use]
pub mod logging;
pub mod tokens;
pub mod utils;

// Re-export key types for library consumers
pub use config::Preferences;
pub use include::{FsSourceOpener, SourceOpener};
pub use lexical::{DigestAlg, Lexer};
pub use tokens::{ErrorKind, FatalError, Token, TokenStream};
pub use utils::{Position, Span, Spanned};
