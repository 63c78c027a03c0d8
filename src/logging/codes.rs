//! Consolidated error codes and classification system
//!
//! Single source of truth for all error, warning, and success codes together
//! with their behavioral metadata.

use std::collections::HashMap;
use std::sync::OnceLock;

// ============================================================================
// CODE WRAPPER TYPE
// ============================================================================

/// Universal code wrapper for error, warning, and success codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Code(&'static str);

impl Code {
    pub const fn new(code: &'static str) -> Self {
        Self(code)
    }

    pub fn as_str(&self) -> &'static str {
        self.0
    }
}

impl std::fmt::Display for Code {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// ERROR CLASSIFICATION TYPES
// ============================================================================

/// Error severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Critical = 0,
    High = 1,
    Medium = 2,
    Low = 3,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "Critical",
            Severity::High => "High",
            Severity::Medium => "Medium",
            Severity::Low => "Low",
        }
    }
}

/// Complete metadata for a code
#[derive(Debug, Clone)]
pub struct ErrorMetadata {
    pub code: &'static str,
    pub category: &'static str,
    pub severity: Severity,
    pub recoverable: bool,
    pub description: &'static str,
}

impl ErrorMetadata {
    pub fn new(
        code: &'static str,
        category: &'static str,
        severity: Severity,
        recoverable: bool,
        description: &'static str,
    ) -> Self {
        Self {
            code,
            category,
            severity,
            recoverable,
            description,
        }
    }
}

// ============================================================================
// ERROR CODE CONSTANTS
// ============================================================================

/// System error codes
pub mod system {
    use super::Code;

    pub const INTERNAL_ERROR: Code = Code::new("ERR001");
    pub const INITIALIZATION_FAILURE: Code = Code::new("ERR002");
}

/// File inclusion error codes
pub mod inclusion {
    use super::Code;

    pub const OPEN_FAILED: Code = Code::new("E005");
    pub const DEPTH_EXCEEDED: Code = Code::new("E006");
    pub const INSECURE_DIRECTORY: Code = Code::new("E007");
    pub const READ_FAILED: Code = Code::new("E009");
    pub const PATH_TOO_LONG: Code = Code::new("E010");
    pub const TOO_MANY_DIR_ENTRIES: Code = Code::new("E011");
}

/// Lexical analysis error codes
pub mod lexical {
    use super::Code;

    pub const NO_MATCHING_TOKEN: Code = Code::new("E020");
    pub const UNEXPECTED_LINE_BREAK: Code = Code::new("E021");
    pub const EMPTY_STRING: Code = Code::new("E022");
    pub const EMPTY_GROUP: Code = Code::new("E023");
    pub const EMPTY_NETGROUP: Code = Code::new("E024");
    pub const INVALID_IPV6: Code = Code::new("E025");
    pub const INVALID_REGEX: Code = Code::new("E026");
    pub const INVALID_LINE_CONTINUATION: Code = Code::new("E027");
}

/// Warning codes
pub mod warning {
    use super::Code;

    pub const INSECURE_INCLUDE_DIRECTORY: Code = Code::new("W010");
    pub const INCLUDE_DIRECTORY_SKIPPED: Code = Code::new("W011");
}

/// Success codes
pub mod success {
    use super::Code;

    pub const OPERATION_COMPLETED_SUCCESSFULLY: Code = Code::new("I001");
    pub const SYSTEM_INITIALIZATION_COMPLETED: Code = Code::new("I004");
    pub const TOKENIZATION_COMPLETE: Code = Code::new("I020");
}

// ============================================================================
// ERROR METADATA REGISTRY
// ============================================================================

static ERROR_REGISTRY: OnceLock<HashMap<&'static str, ErrorMetadata>> = OnceLock::new();

fn get_error_registry() -> &'static HashMap<&'static str, ErrorMetadata> {
    ERROR_REGISTRY.get_or_init(|| {
        let mut registry = HashMap::new();

        // System errors
        registry.insert(
            "ERR001",
            ErrorMetadata::new(
                "ERR001",
                "System",
                Severity::Critical,
                false,
                "Critical internal system error",
            ),
        );
        registry.insert(
            "ERR002",
            ErrorMetadata::new(
                "ERR002",
                "System",
                Severity::Critical,
                false,
                "System initialization failure",
            ),
        );

        // Inclusion errors
        registry.insert(
            "E005",
            ErrorMetadata::new(
                "E005",
                "Inclusion",
                Severity::High,
                false,
                "Unable to open explicitly included file",
            ),
        );
        registry.insert(
            "E006",
            ErrorMetadata::new(
                "E006",
                "Inclusion",
                Severity::High,
                false,
                "Too many levels of includes",
            ),
        );
        registry.insert(
            "E007",
            ErrorMetadata::new(
                "E007",
                "Inclusion",
                Severity::Medium,
                true,
                "Include directory ownership or mode check failed",
            ),
        );
        registry.insert(
            "E009",
            ErrorMetadata::new(
                "E009",
                "Inclusion",
                Severity::High,
                false,
                "I/O error reading from an included source",
            ),
        );
        registry.insert(
            "E010",
            ErrorMetadata::new(
                "E010",
                "Inclusion",
                Severity::Medium,
                false,
                "Resolved include path exceeds maximum length",
            ),
        );
        registry.insert(
            "E011",
            ErrorMetadata::new(
                "E011",
                "Inclusion",
                Severity::Medium,
                false,
                "Include directory contains too many entries",
            ),
        );

        // Lexical errors
        registry.insert(
            "E020",
            ErrorMetadata::new(
                "E020",
                "Lexical",
                Severity::Medium,
                true,
                "No token rule matches the input character",
            ),
        );
        registry.insert(
            "E021",
            ErrorMetadata::new(
                "E021",
                "Lexical",
                Severity::Medium,
                true,
                "Unescaped line break inside a quoted string",
            ),
        );
        registry.insert(
            "E022",
            ErrorMetadata::new(
                "E022",
                "Lexical",
                Severity::Low,
                true,
                "Quoted string with no content",
            ),
        );
        registry.insert(
            "E023",
            ErrorMetadata::new(
                "E023",
                "Lexical",
                Severity::Low,
                true,
                "Group reference with no group name",
            ),
        );
        registry.insert(
            "E024",
            ErrorMetadata::new(
                "E024",
                "Lexical",
                Severity::Low,
                true,
                "Netgroup reference with no netgroup name",
            ),
        );
        registry.insert(
            "E025",
            ErrorMetadata::new(
                "E025",
                "Lexical",
                Severity::Medium,
                true,
                "Text resembling an IPv6 address fails to parse",
            ),
        );
        registry.insert(
            "E026",
            ErrorMetadata::new(
                "E026",
                "Lexical",
                Severity::Medium,
                true,
                "Command regular expression is unterminated or fails to compile",
            ),
        );
        registry.insert(
            "E027",
            ErrorMetadata::new(
                "E027",
                "Lexical",
                Severity::Medium,
                true,
                "Line continuation immediately before an include directive",
            ),
        );

        // Warnings
        registry.insert(
            "W010",
            ErrorMetadata::new(
                "W010",
                "Inclusion",
                Severity::Low,
                true,
                "Include directory skipped for failing security checks",
            ),
        );
        registry.insert(
            "W011",
            ErrorMetadata::new(
                "W011",
                "Inclusion",
                Severity::Low,
                true,
                "Include directory skipped because it is missing or unreadable",
            ),
        );

        // Success codes
        registry.insert(
            "I004",
            ErrorMetadata::new(
                "I004",
                "System",
                Severity::Low,
                true,
                "System initialization completed successfully",
            ),
        );
        registry.insert(
            "I020",
            ErrorMetadata::new(
                "I020",
                "Lexical",
                Severity::Low,
                true,
                "Tokenization completed successfully",
            ),
        );

        registry
    })
}

// ============================================================================
// CLASSIFICATION FUNCTIONS
// ============================================================================

/// Get metadata for a specific code
pub fn get_error_metadata(code: &str) -> Option<&'static ErrorMetadata> {
    get_error_registry().get(code)
}

/// Get severity from code
pub fn get_severity(code: &str) -> Severity {
    get_error_registry()
        .get(code)
        .map(|metadata| metadata.severity)
        .unwrap_or(Severity::Medium)
}

/// Check if error is recoverable
pub fn is_recoverable(code: &str) -> bool {
    get_error_registry()
        .get(code)
        .map(|metadata| metadata.recoverable)
        .unwrap_or(true)
}

/// Get human-readable description for code
pub fn get_description(code: &str) -> &'static str {
    get_error_registry()
        .get(code)
        .map(|metadata| metadata.description)
        .unwrap_or("Unknown error")
}

/// Get category from code
pub fn get_category(code: &str) -> &'static str {
    get_error_registry()
        .get(code)
        .map(|metadata| metadata.category)
        .unwrap_or("Unknown")
}
