//! # Service Monitor
//!
//! One monitor per configured service: probes all targets in parallel each
//! interval, reconciles the results with the chain manager, and triggers a
//! chain rebuild only when the healthy set changed.

pub mod error;
pub mod monitor;

pub use error::{MonitorError, MonitorResult};
pub use monitor::ServiceMonitor;
