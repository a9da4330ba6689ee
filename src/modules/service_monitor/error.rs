//! Service monitor error types.

use crate::modules::nat::NatError;
use thiserror::Error;

/// Errors that terminate a service monitor.
///
/// Any of these is fatal for the monitor and, through the orchestrator,
/// for the process. Probe failures are not errors at this level; they are
/// the expected signal driving the healthy set.
#[derive(Debug, Error)]
pub enum MonitorError {
    /// The configured health check type is not registered.
    #[error("health check type '{0}' is not registered")]
    UnknownChecker(String),

    /// Rebuilding the managed chains failed.
    #[error("failed to rebuild managed chains: {0}")]
    ChainRebuild(#[from] NatError),

    /// A spawned task died instead of reporting back.
    #[error("task failed: {0}")]
    TaskJoin(String),
}

/// Result type for service monitor operations.
pub type MonitorResult<T> = Result<T, MonitorError>;
