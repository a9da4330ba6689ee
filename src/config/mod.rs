//! # Configuration System
//!
//! TOML-based configuration for natlb: the managed chain prefix and the
//! list of services to expose, each with its bind endpoint, health check
//! and weighted backend targets.
//!
//! ## Example Configuration
//!
//! ```toml
//! managed_chain = "NATLB"
//!
//! [[services]]
//! name = "web"
//! bind_addr = "10.0.0.1"
//! bind_port = 80
//! proto = "tcp"
//!
//! [services.health_check]
//! type = "http"
//! interval = "10s"
//!
//! [services.health_check.settings]
//! path = "/healthz"
//!
//! [[services.targets]]
//! addr = "192.168.1.10"
//! local_addr = "192.168.1.1"
//! port = 8080
//! weight = 2
//! ```

mod error;
mod loader;
mod types;
mod validation;

pub use error::{ConfigError, ConfigResult};
pub use loader::ConfigLoader;
pub use types::{BalancerConfig, HealthCheckConfig, Protocol, ServiceConfig, TargetConfig};
pub use validation::{
    BasicValidator, BindConflictValidator, ValidationError, ValidationResult, Validator,
};
