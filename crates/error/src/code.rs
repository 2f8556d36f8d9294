use serde::{Deserialize, Serialize};
use std::fmt;

/// Numeric error codes following the SQLYD-XXXX format.
///
/// ## Code Ranges
/// - **1000-1999**: Validation errors (rejected before touching storage)
/// - **2000-2999**: Not-found errors
/// - **3000-3999**: Execution errors (the engine rejected a statement)
/// - **4000-4999**: Extension errors
/// - **5000-5999**: Internal/system errors
///
/// Codes are stable across versions (semver contract).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
#[non_exhaustive]
pub enum ErrorCode {
    // === Validation Errors (1000-1999) ===
    /// SQLYD-1001: Database name is not plain alphanumeric
    InvalidDatabaseName = 1001,
    /// SQLYD-1002: Unknown SQL dialect name
    InvalidDialect = 1002,
    /// SQLYD-1003: Statement failed to parse
    SyntaxError = 1003,
    /// SQLYD-1004: Malformed query parameters
    InvalidParameters = 1004,
    /// SQLYD-1005: Empty or blank query text
    EmptyQuery = 1005,

    // === Not-Found Errors (2000-2999) ===
    /// SQLYD-2001: Database file does not exist
    DatabaseNotFound = 2001,
    /// SQLYD-2002: Extension file does not exist
    ExtensionNotFound = 2002,
    /// SQLYD-2003: Submission id unknown or already reclaimed
    SubmissionNotFound = 2003,

    // === Execution Errors (3000-3999) ===
    /// SQLYD-3001: The storage engine rejected the statement
    StatementFailed = 3001,
    /// SQLYD-3002: Could not open the database file
    ConnectionFailed = 3002,

    // === Extension Errors (4000-4999) ===
    /// SQLYD-4001: Loading a shared extension failed
    ExtensionLoadFailed = 4001,

    // === Internal Errors (5000-5999) ===
    /// SQLYD-5001: Unexpected internal state
    Internal = 5001,
}

impl ErrorCode {
    /// Get the numeric code value
    pub fn as_u16(&self) -> u16 {
        *self as u16
    }

    /// Get the formatted code string (e.g., "SQLYD-2003")
    pub fn as_str(&self) -> String {
        format!("SQLYD-{:04}", self.as_u16())
    }

    /// Get the error category
    pub fn category(&self) -> ErrorCategory {
        match self.as_u16() {
            1000..=1999 => ErrorCategory::Validation,
            2000..=2999 => ErrorCategory::NotFound,
            3000..=3999 => ErrorCategory::Execution,
            4000..=4999 => ErrorCategory::Extension,
            _ => ErrorCategory::Internal,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl From<ErrorCode> for String {
    fn from(code: ErrorCode) -> String {
        code.as_str()
    }
}

impl TryFrom<String> for ErrorCode {
    type Error = String;

    fn try_from(s: String) -> std::result::Result<Self, Self::Error> {
        let num: u16 = s
            .strip_prefix("SQLYD-")
            .and_then(|n| n.parse().ok())
            .ok_or_else(|| "Invalid format".to_string())?;
        Self::try_from(num).map_err(|_| "Unknown code".to_string())
    }
}

impl TryFrom<u16> for ErrorCode {
    type Error = String;

    fn try_from(n: u16) -> std::result::Result<Self, Self::Error> {
        match n {
            1001 => Ok(Self::InvalidDatabaseName),
            1002 => Ok(Self::InvalidDialect),
            1003 => Ok(Self::SyntaxError),
            1004 => Ok(Self::InvalidParameters),
            1005 => Ok(Self::EmptyQuery),
            2001 => Ok(Self::DatabaseNotFound),
            2002 => Ok(Self::ExtensionNotFound),
            2003 => Ok(Self::SubmissionNotFound),
            3001 => Ok(Self::StatementFailed),
            3002 => Ok(Self::ConnectionFailed),
            4001 => Ok(Self::ExtensionLoadFailed),
            5001 => Ok(Self::Internal),
            _ => Err(format!("Unknown error code: {}", n)),
        }
    }
}

/// High-level error category, used for HTTP status mapping in the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCategory {
    Validation,
    NotFound,
    Execution,
    Extension,
    Internal,
}
