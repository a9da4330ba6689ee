//! # Balancer Modules
//!
//! The subsystems natlb is built from:
//!
//! - [`nat`] - kernel NAT programming: backend adapter, chain manager,
//!   rule compilation
//! - [`health_check`] - probe contract, settings bags and the concrete
//!   TCP/HTTP/SMTP checks
//! - [`service_monitor`] - the per-service reconciliation loop tying the
//!   two together

pub mod health_check;
pub mod nat;
pub mod service_monitor;
