//! NAT module error types.

use thiserror::Error;

/// Errors that can occur while programming the kernel NAT table.
#[derive(Debug, Error)]
pub enum NatError {
    /// The packet-filter backend could not be reached at all.
    #[error("NAT backend unavailable: {0}")]
    BackendUnavailable(String),

    /// A backend command against a chain failed.
    #[error("NAT command failed on chain '{chain}': {message}")]
    CommandFailed {
        /// Chain the command targeted.
        chain: String,
        /// Backend error message.
        message: String,
    },

    /// Installing a chain's rule set failed.
    #[error("failed to install chain '{chain}': {source}")]
    ChainInstall {
        /// Chain being installed.
        chain: String,
        /// Underlying backend error.
        #[source]
        source: Box<NatError>,
    },
}

impl NatError {
    /// Wrap a backend error with the chain it occurred on.
    pub fn command(chain: impl Into<String>, message: impl ToString) -> Self {
        Self::CommandFailed {
            chain: chain.into(),
            message: message.to_string(),
        }
    }
}

/// Result type for NAT operations.
pub type NatResult<T> = Result<T, NatError>;
