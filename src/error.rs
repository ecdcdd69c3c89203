//! Error types for the AMI client

use thiserror::Error;

/// Result alias used throughout the crate.
pub type AmiResult<T> = Result<T, AmiError>;

/// Errors produced while talking to the PBX manager interface.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AmiError {
    /// Socket-level failure (connect refused, reset, broken pipe).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A bounded wait expired (connect, probe or block read).
    #[error("operation timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    /// The PBX closed the socket before the expected terminator arrived.
    #[error("connection closed by peer")]
    ConnectionClosed,

    /// An operation needed a live session and none was available.
    #[error("not connected")]
    NotConnected,

    /// The `Login` action was rejected.
    #[error("authentication failed: {reason}")]
    AuthFailed { reason: String },

    /// Malformed, oversized or unexpected protocol traffic.
    #[error("protocol error: {message}")]
    ProtocolError { message: String },

    /// The PBX answered an action with something other than success.
    #[error("action rejected: {response}")]
    ActionRejected { response: String },

    /// The member directory could not be read.
    #[error("member directory error: {0}")]
    Directory(String),
}

impl AmiError {
    pub(crate) fn protocol_error(message: impl Into<String>) -> Self {
        AmiError::ProtocolError {
            message: message.into(),
        }
    }

    pub(crate) fn auth_failed(reason: impl Into<String>) -> Self {
        AmiError::AuthFailed {
            reason: reason.into(),
        }
    }

    /// Whether the session must be torn down after this error.
    ///
    /// Everything except a rejected action or a directory failure leaves the
    /// socket in an unknown framing position.
    pub fn is_connection_error(&self) -> bool {
        !matches!(
            self,
            AmiError::ActionRejected { .. } | AmiError::Directory(_)
        )
    }
}

impl From<sqlx::Error> for AmiError {
    fn from(e: sqlx::Error) -> Self {
        AmiError::Directory(e.to_string())
    }
}
