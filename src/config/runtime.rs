// RUNTIME PREFERENCES (behavior, not security boundaries)

use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;

/// Lexer behavior preferences
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LexerPreferences {
    /// Strict mode: validate `^...$` command regexes with the regex compiler
    /// at the moment the terminator is found
    pub strict: bool,

    /// Whether to include line/column information in error log events
    pub include_position_in_errors: bool,

    /// Whether to log a per-source token count summary on completion
    pub log_token_metrics: bool,
}

impl Default for LexerPreferences {
    fn default() -> Self {
        Self {
            strict: env::var("SUDOERS_LEX_STRICT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(false),
            include_position_in_errors: env::var("SUDOERS_LEX_INCLUDE_POSITIONS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(true),
            log_token_metrics: env::var("SUDOERS_LEX_LOG_TOKEN_METRICS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(false),
        }
    }
}

/// Include resolution preferences and security parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InclusionPreferences {
    /// Expected owner uid for include directories; `None` skips the check
    /// (tests and non-root front-ends set this to their own uid)
    pub owner_uid: Option<u32>,

    /// Expected owner gid for include directories; `None` skips the check
    pub owner_gid: Option<u32>,

    /// Whether an insecure or missing include directory logs a warning
    /// before being skipped
    pub verbose_warnings: bool,

    /// Short hostname substituted for `%h` in include paths; `None` leaves
    /// the escape untouched
    pub hostname: Option<String>,

    /// Keep the root source's handle open when its frame is popped, for
    /// front-ends that re-parse the same open descriptor
    pub keep_open: bool,
}

impl Default for InclusionPreferences {
    fn default() -> Self {
        Self {
            owner_uid: env::var("SUDOERS_LEX_OWNER_UID")
                .ok()
                .and_then(|v| v.parse().ok()),
            owner_gid: env::var("SUDOERS_LEX_OWNER_GID")
                .ok()
                .and_then(|v| v.parse().ok()),
            verbose_warnings: env::var("SUDOERS_LEX_VERBOSE_WARNINGS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(false),
            hostname: env::var("SUDOERS_LEX_HOSTNAME").ok(),
            keep_open: false,
        }
    }
}

impl InclusionPreferences {
    /// Short form of the configured hostname (up to the first dot)
    pub fn short_hostname(&self) -> Option<&str> {
        self.hostname
            .as_deref()
            .map(|h| h.split('.').next().unwrap_or(h))
    }
}

/// Minimum level for emitted log events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warning,
    Info,
    Debug,
}

impl LogLevel {
    pub fn to_events_log_level(self) -> crate::logging::LogLevel {
        match self {
            LogLevel::Error => crate::logging::LogLevel::Error,
            LogLevel::Warning => crate::logging::LogLevel::Warning,
            LogLevel::Info => crate::logging::LogLevel::Info,
            LogLevel::Debug => crate::logging::LogLevel::Debug,
        }
    }
}

/// Logging preferences
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingPreferences {
    pub min_log_level: LogLevel,

    /// Emit JSON events instead of human-readable lines
    pub use_structured_logging: bool,
}

impl Default for LoggingPreferences {
    fn default() -> Self {
        let min_log_level = match env::var("SUDOERS_LEX_LOG_LEVEL").ok().as_deref() {
            Some("error") => LogLevel::Error,
            Some("warning") => LogLevel::Warning,
            Some("debug") => LogLevel::Debug,
            _ => LogLevel::Info,
        };
        Self {
            min_log_level,
            use_structured_logging: env::var("SUDOERS_LEX_STRUCTURED_LOGGING")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(false),
        }
    }
}

/// Configuration load errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("unable to read configuration file {path}: {message}")]
    Read { path: String, message: String },

    #[error("invalid configuration file {path}: {message}")]
    Parse { path: String, message: String },
}

/// All runtime preferences, as stored in a configuration file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Preferences {
    pub lexer: LexerPreferences,
    pub inclusion: InclusionPreferences,
    pub logging: LoggingPreferences,
}

impl Preferences {
    /// Load preferences from a TOML file, falling back to env-derived
    /// defaults for any omitted field
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        toml::from_str(&text).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }
}
