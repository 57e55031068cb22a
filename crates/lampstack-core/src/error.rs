//! Shared error type across lampstack crates.

use thiserror::Error;

/// Stable error codes, printed by the binary and asserted by tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// Config file is malformed or fails validation.
    BadConfig,
    /// Config `version` is not supported.
    UnsupportedVersion,
    /// A resource, output, or parameter cannot be placed in a template.
    InvalidTemplate,
    /// Stack dependency graph is inconsistent.
    Dependency,
    /// Filesystem read/write failed.
    Io,
    /// Internal error (serialization etc.).
    Internal,
}

impl ErrorCode {
    /// String representation used in logs and exit messages.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::BadConfig => "BAD_CONFIG",
            ErrorCode::UnsupportedVersion => "UNSUPPORTED_VERSION",
            ErrorCode::InvalidTemplate => "INVALID_TEMPLATE",
            ErrorCode::Dependency => "DEPENDENCY",
            ErrorCode::Io => "IO",
            ErrorCode::Internal => "INTERNAL",
        }
    }
}

/// Shared result type.
pub type Result<T> = std::result::Result<T, LampstackError>;

/// Unified error type used by core and synth.
#[derive(Debug, Error)]
pub enum LampstackError {
    #[error("bad config: {0}")]
    BadConfig(String),
    #[error("unsupported config version: {0}")]
    UnsupportedVersion(u32),
    #[error("invalid template: {0}")]
    InvalidTemplate(String),
    #[error("dependency error: {0}")]
    Dependency(String),
    #[error("io: {0}")]
    Io(String),
    #[error("internal: {0}")]
    Internal(String),
}

impl LampstackError {
    /// Map the error to its stable code.
    pub fn code(&self) -> ErrorCode {
        match self {
            LampstackError::BadConfig(_) => ErrorCode::BadConfig,
            LampstackError::UnsupportedVersion(_) => ErrorCode::UnsupportedVersion,
            LampstackError::InvalidTemplate(_) => ErrorCode::InvalidTemplate,
            LampstackError::Dependency(_) => ErrorCode::Dependency,
            LampstackError::Io(_) => ErrorCode::Io,
            LampstackError::Internal(_) => ErrorCode::Internal,
        }
    }
}

impl From<serde_json::Error> for LampstackError {
    fn from(e: serde_json::Error) -> Self {
        LampstackError::Internal(format!("json: {e}"))
    }
}
