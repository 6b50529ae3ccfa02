//! Error types for the corral CLI.
//!
//! Uses thiserror for derive macros. Each variant corresponds to one class of
//! the coordination failure taxonomy and maps to a distinct exit code.

use crate::exit_codes;
use thiserror::Error;

/// Main error type for corral operations.
#[derive(Error, Debug)]
pub enum CorralError {
    /// User provided invalid arguments or configuration.
    #[error("{0}")]
    UserError(String),

    /// The leader socket is missing, not a socket, or unreachable.
    ///
    /// Transport failures are fatal and never retried: reaching the leader is
    /// a local-socket connect, not a flaky remote call.
    #[error("transport error: {0}")]
    TransportError(String),

    /// The leader answered outside the operation's defined outcomes.
    #[error("protocol error: {0}")]
    ProtocolError(String),

    /// A lock transition was attempted from the wrong state.
    ///
    /// Fatal by design: corral refuses to guess a recovery and instead points
    /// the operator at `corral lock get <key>` for inspection.
    #[error("invalid lock state: {0}")]
    StateError(String),

    /// An opt-in deadline expired before the wait completed.
    #[error("timed out: {0}")]
    TimeoutError(String),
}

impl CorralError {
    /// Returns the appropriate exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            CorralError::UserError(_) => exit_codes::USER_ERROR,
            CorralError::TransportError(_) => exit_codes::TRANSPORT_FAILURE,
            CorralError::ProtocolError(_) => exit_codes::PROTOCOL_FAILURE,
            CorralError::StateError(_) => exit_codes::STATE_FAILURE,
            CorralError::TimeoutError(_) => exit_codes::TIMEOUT,
        }
    }
}

/// Result type alias for corral operations.
pub type Result<T> = std::result::Result<T, CorralError>;
