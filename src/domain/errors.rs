//! Domain error types
//!
//! Strata distinguishes two terminal error classes with distinct exit codes:
//! user errors (invalid configuration, bad query, bad credentials) exit with
//! code 1, internal errors (I/O failures, protocol corruption, unexpected
//! store responses) exit with code 2. Transient store failures are retried
//! before they are converted into one of the two classes.

use thiserror::Error;

/// Exit code reported for user-actionable failures.
pub const USER_ERROR_EXIT_CODE: i32 = 1;

/// Exit code reported for unexpected internal failures.
pub const INTERNAL_ERROR_EXIT_CODE: i32 = 2;

/// Main Strata error type
///
/// This is the primary error type used throughout the application.
/// Every variant is classified as either user-actionable or internal,
/// which determines the process exit code and how much diagnostic
/// context is surfaced.
#[derive(Debug, Error)]
pub enum StrataError {
    /// Configuration-related errors (invalid or missing parameters)
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The store rejected the query (syntax, unknown fields)
    #[error("Query error: {0}")]
    Query(String),

    /// Connectivity or endpoint errors reachable by the operator
    #[error("Cannot connect: {0}")]
    Connection(String),

    /// Authentication failed (invalid key)
    #[error("Authentication error: {0}")]
    Authentication(String),

    /// A referenced database or container does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// A configured field path could not be resolved in a document
    #[error("Invalid field path: {0}")]
    FieldPath(String),

    /// Corrupted frame content on the data channel
    #[error("Decode error: {0}")]
    Decode(String),

    /// Child process lifecycle failures (spawn, pipe setup, abnormal exit)
    #[error("Process error: {0}")]
    Process(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    /// Unexpected failures with no more specific classification
    #[error("{0}")]
    Internal(String),
}

impl StrataError {
    /// Whether the failure is actionable by the operator.
    ///
    /// User errors are reported as a single clean message; internal errors
    /// carry full diagnostic context.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            StrataError::Configuration(_)
                | StrataError::Query(_)
                | StrataError::Connection(_)
                | StrataError::Authentication(_)
                | StrataError::NotFound(_)
                | StrataError::FieldPath(_)
        )
    }

    /// Process exit code for this error class.
    pub fn exit_code(&self) -> i32 {
        if self.is_user_error() {
            USER_ERROR_EXIT_CODE
        } else {
            INTERNAL_ERROR_EXIT_CODE
        }
    }

    /// Reconstruct an error from a child process exit code and its captured
    /// stderr output.
    ///
    /// The producer contract is: exit 1 for user errors, any other non-zero
    /// code for internal errors. The captured diagnostic text becomes the
    /// message so the failure is reported exactly once, on the consumer side.
    pub fn from_child_exit(code: i32, diagnostics: &str) -> Self {
        let message = if diagnostics.trim().is_empty() {
            format!("Producer process exited with code {code}")
        } else {
            diagnostics.trim().to_string()
        };

        if code == USER_ERROR_EXIT_CODE {
            StrataError::Connection(message)
        } else {
            StrataError::Internal(message)
        }
    }
}

// Conversion from std::io::Error
impl From<std::io::Error> for StrataError {
    fn from(err: std::io::Error) -> Self {
        StrataError::Io(err.to_string())
    }
}

// Conversion from serde_json::Error
impl From<serde_json::Error> for StrataError {
    fn from(err: serde_json::Error) -> Self {
        StrataError::Serialization(err.to_string())
    }
}

// Conversion from toml parse errors
impl From<toml::de::Error> for StrataError {
    fn from(err: toml::de::Error) -> Self {
        StrataError::Configuration(format!("TOML parse error: {err}"))
    }
}
