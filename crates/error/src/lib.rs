//! # sqlyard-error
//!
//! Unified error types for the sqlyard query service.
//!
//! Errors carry:
//! - Numeric error codes (SQLYD-XXXX) with stable category ranges
//! - A human-readable message
//! - An optional actionable hint

mod code;

pub use code::{ErrorCategory, ErrorCode};

use serde::{Deserialize, Serialize};
use std::fmt;

/// The unified error type for all sqlyard operations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Error {
    /// Numeric error code (e.g., "SQLYD-2003")
    pub code: ErrorCode,

    /// Human-readable error message
    pub message: String,

    /// Actionable suggestion for the caller
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl Error {
    /// Create a new error with code and message
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            hint: None,
        }
    }

    /// Add an actionable hint
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    /// Shorthand constructors per category
    pub fn validation(code: ErrorCode, message: impl Into<String>) -> Self {
        debug_assert_eq!(code.category(), ErrorCategory::Validation);
        Self::new(code, message)
    }

    pub fn not_found(code: ErrorCode, message: impl Into<String>) -> Self {
        debug_assert_eq!(code.category(), ErrorCategory::NotFound);
        Self::new(code, message)
    }

    pub fn execution(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::StatementFailed, message)
    }

    pub fn extension(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ExtensionLoadFailed, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Internal, message)
    }

    /// The error category (drives HTTP status mapping in the server)
    pub fn category(&self) -> ErrorCategory {
        self.code.category()
    }

    /// Serialize to JSON for API responses
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| {
            tracing::warn!("Failed to serialize Error: {}", e);
            format!(
                r#"{{"code":"{}","message":"Serialization failed"}}"#,
                self.code
            )
        })
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)?;
        if let Some(hint) = &self.hint {
            write!(f, " (Hint: {})", hint)?;
        }
        Ok(())
    }
}

impl std::error::Error for Error {}

/// Result type alias for sqlyard operations
pub type Result<T> = std::result::Result<T, Error>;
