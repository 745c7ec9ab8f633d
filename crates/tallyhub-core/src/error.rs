//! Shared error types across tallyhub crates.

use thiserror::Error;

/// Stable error codes (used by logs, HTTP responses and test vectors).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// Invalid input / malformed line or config.
    BadRequest,
    /// Histogram boundary is not a finite number.
    InvalidBoundary,
    /// Binary snapshot could not be decoded.
    Decode,
    /// Unsupported config or snapshot version.
    UnsupportedVersion,
    /// Internal failure (I/O, startup).
    Internal,
}

impl ErrorCode {
    /// String representation used in logs and responses.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::BadRequest => "BAD_REQUEST",
            ErrorCode::InvalidBoundary => "INVALID_BOUNDARY",
            ErrorCode::Decode => "DECODE",
            ErrorCode::UnsupportedVersion => "UNSUPPORTED_VERSION",
            ErrorCode::Internal => "INTERNAL",
        }
    }
}

/// Failure to decode a binary snapshot.
///
/// Decoding never touches an existing registry until it has fully succeeded,
/// so any of these leaves the target untouched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("snapshot truncated: needed {needed} more bytes, {remaining} remaining")]
    Truncated { needed: usize, remaining: usize },
    #[error("snapshot magic mismatch")]
    BadMagic,
    #[error("unsupported snapshot version {0}")]
    UnsupportedVersion(u8),
    #[error("snapshot string is not valid utf-8")]
    InvalidUtf8,
    #[error("malformed snapshot: {0}")]
    Malformed(String),
    #[error("{0} trailing bytes after snapshot")]
    TrailingBytes(usize),
}

impl DecodeError {
    /// Short reason tag, stable across releases.
    pub fn kind(&self) -> &'static str {
        match self {
            DecodeError::Truncated { .. } => "truncated",
            DecodeError::BadMagic => "bad_magic",
            DecodeError::UnsupportedVersion(_) => "unsupported_version",
            DecodeError::InvalidUtf8 => "invalid_utf8",
            DecodeError::Malformed(_) => "malformed",
            DecodeError::TrailingBytes(_) => "trailing_bytes",
        }
    }
}

/// Shared result type.
pub type Result<T> = std::result::Result<T, TallyError>;

/// Unified error type used by core and gateway.
#[derive(Debug, Error)]
pub enum TallyError {
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("invalid histogram boundary: {0}")]
    InvalidBoundary(f64),
    #[error("decode failed: {0}")]
    Decode(#[from] DecodeError),
    #[error("unsupported version")]
    UnsupportedVersion,
    #[error("internal: {0}")]
    Internal(String),
}

impl TallyError {
    /// Map to a stable code.
    pub fn code(&self) -> ErrorCode {
        match self {
            TallyError::BadRequest(_) => ErrorCode::BadRequest,
            TallyError::InvalidBoundary(_) => ErrorCode::InvalidBoundary,
            TallyError::Decode(_) => ErrorCode::Decode,
            TallyError::UnsupportedVersion => ErrorCode::UnsupportedVersion,
            TallyError::Internal(_) => ErrorCode::Internal,
        }
    }
}
