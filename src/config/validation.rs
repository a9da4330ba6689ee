//! Configuration validation system.

use super::types::BalancerConfig;

/// A single validation error.
#[derive(Debug, Clone)]
pub struct ValidationError {
    /// The field path that failed validation.
    pub field: String,
    /// Error message.
    pub message: String,
}

impl ValidationError {
    /// Create a new error.
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Result of configuration validation.
#[derive(Debug, Default)]
pub struct ValidationResult {
    errors: Vec<ValidationError>,
}

impl ValidationResult {
    /// Create a new empty (valid) result.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an error to the result.
    pub fn add_error(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    /// Check if the validation passed (no errors).
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Get all validation errors.
    #[must_use]
    pub fn errors(&self) -> &[ValidationError] {
        &self.errors
    }
}

/// Trait for configuration validators.
pub trait Validator: std::fmt::Debug + Send + Sync {
    /// Validate a configuration and return any errors.
    fn validate(&self, config: &BalancerConfig) -> ValidationResult;
}

/// Built-in validator for basic configuration checks.
#[derive(Debug, Default)]
pub struct BasicValidator;

impl BasicValidator {
    /// Create a new basic validator.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Validator for BasicValidator {
    fn validate(&self, config: &BalancerConfig) -> ValidationResult {
        let mut result = ValidationResult::new();

        if config.managed_chain.is_empty() {
            result.add_error(ValidationError::new(
                "managed_chain",
                "managed chain prefix cannot be empty",
            ));
        }

        let mut seen_names = std::collections::HashSet::new();
        for service in &config.services {
            if service.name.is_empty() {
                result.add_error(ValidationError::new(
                    "services[].name",
                    "service name cannot be empty",
                ));
            }

            if !seen_names.insert(&service.name) {
                result.add_error(ValidationError::new(
                    format!("services.{}", service.name),
                    format!("duplicate service name: {}", service.name),
                ));
            }

            if service.bind_port == 0 {
                result.add_error(ValidationError::new(
                    format!("services.{}.bind_port", service.name),
                    "bind port cannot be 0",
                ));
            }

            if service.health_check.check_type.is_empty() {
                result.add_error(ValidationError::new(
                    format!("services.{}.health_check.type", service.name),
                    "health check type cannot be empty",
                ));
            }

            if service.health_check.interval.is_zero() {
                result.add_error(ValidationError::new(
                    format!("services.{}.health_check.interval", service.name),
                    "health check interval cannot be zero",
                ));
            }

            if service.targets.is_empty() {
                result.add_error(ValidationError::new(
                    format!("services.{}.targets", service.name),
                    "service needs at least one target",
                ));
            }

            for target in &service.targets {
                if target.port == 0 {
                    result.add_error(ValidationError::new(
                        format!("services.{}.targets", service.name),
                        format!("target {} has port 0", target.addr),
                    ));
                }
            }
        }

        result
    }
}

/// Validator that rejects two services claiming the same bind endpoint.
#[derive(Debug, Default)]
pub struct BindConflictValidator;

impl BindConflictValidator {
    /// Create a new bind conflict validator.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Validator for BindConflictValidator {
    fn validate(&self, config: &BalancerConfig) -> ValidationResult {
        let mut result = ValidationResult::new();
        let mut used = std::collections::HashMap::new();

        for service in &config.services {
            let endpoint = (service.proto, service.bind_addr, service.bind_port);
            if let Some(existing) = used.insert(endpoint, &service.name) {
                result.add_error(ValidationError::new(
                    format!("services.{}", service.name),
                    format!(
                        "bind endpoint {}://{}:{} already used by service '{}'",
                        service.proto, service.bind_addr, service.bind_port, existing
                    ),
                ));
            }
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::types::{HealthCheckConfig, ServiceConfig, TargetConfig};
    use std::time::Duration;

    fn service(name: &str, bind_port: u16) -> ServiceConfig {
        ServiceConfig {
            name: name.to_string(),
            bind_addr: "10.0.0.1".parse().unwrap(),
            bind_port,
            proto: Default::default(),
            health_check: HealthCheckConfig {
                check_type: "tcp".to_string(),
                interval: Duration::from_secs(10),
                settings: toml::Table::new(),
            },
            targets: vec![TargetConfig {
                addr: "192.168.1.10".parse().unwrap(),
                local_addr: None,
                port: 8080,
                weight: 1,
            }],
        }
    }

    fn config(services: Vec<ServiceConfig>) -> BalancerConfig {
        BalancerConfig {
            managed_chain: "NATLB".to_string(),
            services,
        }
    }

    #[test]
    fn test_basic_validator_valid() {
        let result = BasicValidator::new().validate(&config(vec![service("web", 80)]));
        assert!(result.is_valid());
    }

    #[test]
    fn test_basic_validator_empty_chain_prefix() {
        let mut cfg = config(vec![]);
        cfg.managed_chain = String::new();

        let result = BasicValidator::new().validate(&cfg);
        assert!(!result.is_valid());
        assert!(result.errors()[0].message.contains("cannot be empty"));
    }

    #[test]
    fn test_basic_validator_duplicate_service_names() {
        let cfg = config(vec![service("web", 80), service("web", 443)]);
        let result = BasicValidator::new().validate(&cfg);

        assert!(!result.is_valid());
        assert!(result.errors()[0].message.contains("duplicate"));
    }

    #[test]
    fn test_basic_validator_no_targets() {
        let mut svc = service("web", 80);
        svc.targets.clear();

        let result = BasicValidator::new().validate(&config(vec![svc]));
        assert!(!result.is_valid());
        assert!(result.errors()[0].message.contains("at least one target"));
    }

    #[test]
    fn test_basic_validator_zero_interval() {
        let mut svc = service("web", 80);
        svc.health_check.interval = Duration::ZERO;

        let result = BasicValidator::new().validate(&config(vec![svc]));
        assert!(!result.is_valid());
    }

    #[test]
    fn test_bind_conflict_validator() {
        let cfg = config(vec![service("web", 80), service("web2", 80)]);
        let result = BindConflictValidator::new().validate(&cfg);

        assert!(!result.is_valid());
        assert!(result.errors()[0].message.contains("already used"));
    }

    #[test]
    fn test_bind_conflict_allows_distinct_ports() {
        let cfg = config(vec![service("web", 80), service("web2", 443)]);
        assert!(BindConflictValidator::new().validate(&cfg).is_valid());
    }
}
