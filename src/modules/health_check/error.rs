//! Health check error types.

use std::time::Duration;
use thiserror::Error;

/// Errors a probe can fail with.
///
/// Probe errors are never fatal: the monitor treats any of these as
/// "target down" and logs them at debug level.
#[derive(Debug, Error)]
pub enum CheckError {
    /// Could not connect to the target.
    #[error("connection to {endpoint} failed: {message}")]
    ConnectionFailed {
        /// Probed endpoint.
        endpoint: String,
        /// Underlying error message.
        message: String,
    },

    /// The probe did not complete within its timeout.
    #[error("probe timed out after {0:?}")]
    Timeout(Duration),

    /// Sending the probe request failed.
    #[error("request failed: {0}")]
    Request(String),

    /// The target answered with the wrong status code.
    #[error("unexpected status code {got} != {want}")]
    UnexpectedStatus {
        /// Status code received.
        got: u16,
        /// Status code expected.
        want: u16,
    },

    /// The expected content was not found in the response body.
    #[error("expected content not found in response body")]
    ContentMismatch,

    /// The target spoke the wrong protocol.
    #[error("expected reply code {expected}, got: {reply}")]
    UnexpectedReply {
        /// Reply code the probe waited for.
        expected: String,
        /// Line the target actually sent.
        reply: String,
    },

    /// A setting value could not be used.
    #[error("invalid setting '{key}': {message}")]
    InvalidSetting {
        /// Setting key.
        key: String,
        /// Why the value is unusable.
        message: String,
    },

    /// TLS handshake failed.
    #[error("TLS handshake failed: {0}")]
    Tls(String),

    /// IO error mid-probe.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for health check operations.
pub type CheckResult<T> = Result<T, CheckError>;
