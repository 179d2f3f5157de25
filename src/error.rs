use std::fmt;

use serde_json::Value;
use thiserror::Error;

use crate::protocol::ErrorReason;

/// Errors surfaced to callers of the client and to setup code.
#[derive(Error, Debug)]
pub enum Error {
    /// No response arrived within the configured call timeout.
    #[error("request timed out")]
    Timeout,

    /// The remote operation failed; the reason was reconstructed locally.
    #[error(transparent)]
    Remote(#[from] RemoteError),

    /// JSON serialization or deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The channel rejected a post or a subscription.
    #[error("transport error: {0}")]
    Transport(String),

    /// The channel was closed before the payload could be posted.
    #[error("channel closed")]
    ChannelClosed,

    /// The method is not part of the client's configured method list.
    #[error("unknown method: {0}")]
    UnknownMethod(String),

    /// The id generator produced an id that is still outstanding.
    #[error("correlation id already pending: {0}")]
    DuplicateCallId(String),

    /// A required setup option was not provided.
    #[error("missing required config: {0}")]
    MissingConfig(String),

    /// A setup option was provided but is invalid.
    #[error("invalid config: {0}")]
    Config(String),

    /// The client shut down while the call was still pending.
    #[error("client shut down")]
    Shutdown,
}

/// Result type alias for worker RPC operations
pub type Result<T> = std::result::Result<T, Error>;

/// A failure raised by a remote operation, rebuilt from its wire reason.
///
/// The error is named after `reason.name`; message, stack and cause are kept
/// as supplementary fields. The stack describes the remote side only and is
/// not a local call stack.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteError {
    reason: ErrorReason,
}

impl RemoteError {
    /// Error name reported by the remote side (e.g. `"Error"`, `"UnknownError"`).
    pub fn name(&self) -> &str {
        &self.reason.name
    }

    pub fn message(&self) -> &str {
        &self.reason.message
    }

    /// Remote stack trace, if one was captured. Informational only.
    pub fn stack(&self) -> Option<&str> {
        self.reason.stack.as_deref()
    }

    pub fn cause(&self) -> Option<&Value> {
        self.reason.cause.as_ref()
    }

    /// True for the fixed `UnknownError` reason, sent when the remote
    /// failure had no recognizable shape.
    pub fn is_unknown(&self) -> bool {
        self.reason.is_unknown()
    }

    /// The full reason exactly as it arrived on the wire.
    pub fn reason(&self) -> &ErrorReason {
        &self.reason
    }
}

impl From<ErrorReason> for RemoteError {
    fn from(reason: ErrorReason) -> Self {
        Self { reason }
    }
}

impl fmt::Display for RemoteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // ---
        if self.reason.message.is_empty() {
            f.write_str(&self.reason.name)
        } else {
            write!(f, "{}: {}", self.reason.name, self.reason.message)
        }
    }
}

impl std::error::Error for RemoteError {}
