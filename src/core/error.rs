//! Error types and result handling for rulescan.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using our custom Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Syntactic problems found in a rule-set blob before parsing.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Rule set is empty")]
    EmptyInput,

    #[error("No rule block of the form `rule <name> {{ ... }}` found")]
    NoRuleFound,

    #[error("Missing required section: {0}")]
    MissingSection(&'static str),

    #[error("Unbalanced braces: {open} opening vs {close} closing")]
    UnbalancedBraces { open: usize, close: usize },
}

/// Structural problems found while parsing individual rules.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("Invalid rule name: '{0}'")]
    InvalidRuleName(String),

    #[error("Duplicate rule name: '{0}'")]
    DuplicateRuleName(String),

    #[error("Rule '{rule}': duplicate pattern identifier {id}")]
    DuplicatePatternId { rule: String, id: String },

    #[error("Rule '{0}': missing closing brace")]
    UnterminatedRule(String),

    #[error("Rule '{0}': missing condition section")]
    MissingCondition(String),

    #[error("Rule '{rule}': invalid meta entry '{entry}'")]
    InvalidMeta { rule: String, entry: String },

    #[error("Rule '{rule}': invalid pattern {id}: {reason}")]
    InvalidPattern {
        rule: String,
        id: String,
        reason: String,
    },

    #[error("Rule '{rule}': invalid condition: {reason}")]
    InvalidCondition { rule: String, reason: String },

    #[error("Rule '{rule}': condition references unknown pattern {reference}")]
    UnknownPatternReference { rule: String, reference: String },

    #[error("Rule '{rule}': pattern {id} anchored at conflicting offsets")]
    ConflictingAnchor { rule: String, id: String },

    #[error("No rules found in rule set")]
    NoRules,
}

/// Main error type for rulescan operations.
#[derive(Error, Debug)]
pub enum Error {
    // ===== Rule Errors =====
    #[error("Rule validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("Rule parsing failed: {0}")]
    Parse(#[from] ParseError),

    // ===== Engine Errors =====
    #[error("Scan engine is not initialized")]
    NotInitialized,

    #[error("Nothing to scan: input is empty")]
    EmptyInput,

    #[error("Operation not supported: {0}")]
    NotSupported(String),

    // ===== I/O Errors =====
    #[error("Failed to read file: {path}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Permission denied: {path}")]
    PermissionDenied {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Path not found: {0}")]
    PathNotFound(PathBuf),

    #[error("File too large: {path} ({size} bytes, limit {limit} bytes)")]
    FileTooLarge { path: PathBuf, size: u64, limit: u64 },

    // ===== Configuration Errors =====
    #[error("Failed to load configuration: {0}")]
    ConfigLoad(String),

    #[error("Failed to save configuration: {0}")]
    ConfigSave(String),

    #[error("Invalid configuration value: {field} - {message}")]
    ConfigInvalid { field: String, message: String },

    // ===== Concurrency Errors =====
    #[error("Lock poisoned: {context}")]
    LockPoisoned { context: String },

    // ===== Serialization Errors =====
    #[error("JSON serialization error")]
    JsonSerialize(#[from] serde_json::Error),

    // ===== Generic Errors =====
    #[error("I/O error: {0}")]
    Io(String),
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err.to_string())
    }
}

impl Error {
    /// Create a file read error, mapping permission failures to their own variant.
    pub fn file_read(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        match source.kind() {
            std::io::ErrorKind::NotFound => Self::PathNotFound(path),
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied { path, source },
            _ => Self::FileRead { path, source },
        }
    }

    /// Create a lock poisoned error.
    pub fn lock_poisoned(context: impl Into<String>) -> Self {
        Self::LockPoisoned {
            context: context.into(),
        }
    }

    /// Check if the caller can fix the input and retry.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::Validation(_)
                | Error::Parse(_)
                | Error::EmptyInput
                | Error::FileRead { .. }
                | Error::PermissionDenied { .. }
                | Error::PathNotFound(_)
                | Error::FileTooLarge { .. }
        )
    }

    /// Get a user-friendly suggestion for how to resolve this error.
    pub fn suggestion(&self) -> Option<&'static str> {
        match self {
            Error::Validation(ValidationError::UnbalancedBraces { .. }) => {
                Some("Check that every `{` in the rule set has a matching `}`")
            }
            Error::Validation(_) => {
                Some("Rule sets need at least one `rule Name { ... condition: ... }` block")
            }
            Error::Parse(ParseError::UnknownPatternReference { .. }) => {
                Some("Declare every pattern used in the condition under `strings:`")
            }
            Error::Parse(_) => Some("Fix the reported rule; the previous rules remain active"),
            Error::NotInitialized => Some("Call initialize() before loading rules or scanning"),
            Error::EmptyInput => Some("Provide a non-empty buffer or file"),
            Error::PermissionDenied { .. } => {
                Some("Try running with elevated privileges (sudo/administrator)")
            }
            Error::PathNotFound(_) => Some("Check that the path exists and is accessible"),
            Error::FileTooLarge { .. } => Some("Raise scan.max_file_size_mb in the configuration"),
            Error::ConfigLoad(_) | Error::ConfigInvalid { .. } => {
                Some("Check your configuration file for syntax errors or missing fields")
            }
            Error::LockPoisoned { .. } => Some("Internal error: restart the application"),
            _ => None,
        }
    }

    /// Get the error category for logging.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Validation(_) => ErrorCategory::Validation,
            Error::Parse(_) => ErrorCategory::Parse,

            Error::NotInitialized | Error::EmptyInput | Error::NotSupported(_) => {
                ErrorCategory::Engine
            }

            Error::FileRead { .. }
            | Error::PermissionDenied { .. }
            | Error::PathNotFound(_)
            | Error::FileTooLarge { .. }
            | Error::Io(_) => ErrorCategory::Io,

            Error::ConfigLoad(_) | Error::ConfigSave(_) | Error::ConfigInvalid { .. } => {
                ErrorCategory::Configuration
            }

            Error::LockPoisoned { .. } => ErrorCategory::Concurrency,

            Error::JsonSerialize(_) => ErrorCategory::Serialization,
        }
    }
}

/// Error category for classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    Validation,
    Parse,
    Engine,
    Io,
    Configuration,
    Concurrency,
    Serialization,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation => write!(f, "Validation"),
            Self::Parse => write!(f, "Parse"),
            Self::Engine => write!(f, "Engine"),
            Self::Io => write!(f, "I/O"),
            Self::Configuration => write!(f, "Configuration"),
            Self::Concurrency => write!(f, "Concurrency"),
            Self::Serialization => write!(f, "Serialization"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::PathNotFound(PathBuf::from("/test/path"));
        assert_eq!(err.to_string(), "Path not found: /test/path");

        let err = Error::from(ValidationError::UnbalancedBraces { open: 3, close: 2 });
        assert_eq!(
            err.to_string(),
            "Rule validation failed: Unbalanced braces: 3 opening vs 2 closing"
        );
    }

    #[test]
    fn test_recoverable_errors() {
        assert!(Error::from(ParseError::NoRules).is_recoverable());
        assert!(Error::EmptyInput.is_recoverable());
        assert!(!Error::NotInitialized.is_recoverable());
        assert!(!Error::lock_poisoned("catalog").is_recoverable());
    }

    #[test]
    fn test_file_read_maps_kind() {
        let err = Error::file_read(
            "/missing",
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        );
        assert!(matches!(err, Error::PathNotFound(_)));

        let err = Error::file_read(
            "/secret",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "no"),
        );
        assert!(matches!(err, Error::PermissionDenied { .. }));
        assert!(err.suggestion().is_some());
    }

    #[test]
    fn test_categories() {
        assert_eq!(
            Error::from(ValidationError::NoRuleFound).category(),
            ErrorCategory::Validation
        );
        assert_eq!(Error::NotInitialized.category(), ErrorCategory::Engine);
        assert_eq!(ErrorCategory::Io.to_string(), "I/O");
    }
}
