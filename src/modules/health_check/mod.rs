//! # Health Checks
//!
//! Application-level probes deciding which targets belong to a service's
//! healthy set. Checks are resolved by the configured type name:
//!
//! - [`tcp`] - a TCP connection can be established
//! - [`http`] - an HTTP request yields the expected status / content
//! - [`smtp`] - the target completes an SMTP greeting and EHLO exchange
//!
//! Every check reads its knobs from an opaque [`CheckSettings`] bag with
//! typed-accessor-with-default semantics; [`Checker::help`] enumerates the
//! recognized keys for the operator-facing `checkhelp` command.

pub mod error;
pub mod http;
pub mod settings;
pub mod smtp;
pub mod tcp;

pub use error::{CheckError, CheckResult};
pub use settings::CheckSettings;

use crate::config::TargetConfig;
use async_trait::async_trait;

/// A health probe for one target.
#[async_trait]
pub trait Checker: Send + Sync {
    /// Probe `target`. `Ok(())` means the target is up; any error means it
    /// is down and says why.
    async fn check(&self, settings: &CheckSettings, target: &TargetConfig) -> CheckResult<()>;

    /// The settings this check recognizes, for operator-facing help.
    fn help(&self) -> Vec<SettingHelp>;
}

/// One row of a check's settings documentation.
#[derive(Debug, Clone)]
pub struct SettingHelp {
    /// Setting key.
    pub name: &'static str,
    /// Rendered default value.
    pub default: String,
    /// What the setting does.
    pub description: &'static str,
}

/// Check type names [`by_name`] resolves, in registry order.
pub const KNOWN_CHECKS: &[&str] = &["http", "smtp", "tcp"];

/// Resolve a check by its configured type name.
#[must_use]
pub fn by_name(name: &str) -> Option<Box<dyn Checker>> {
    match name {
        "http" => Some(Box::new(http::HttpCheck::new())),
        "smtp" => Some(Box::new(smtp::SmtpCheck::new())),
        "tcp" => Some(Box::new(tcp::TcpCheck::new())),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_by_name_resolves_known_checks() {
        for name in KNOWN_CHECKS {
            assert!(by_name(name).is_some(), "check '{name}' not resolvable");
        }
    }

    #[test]
    fn test_by_name_unknown() {
        assert!(by_name("icmp").is_none());
        assert!(by_name("").is_none());
    }

    #[test]
    fn test_all_checks_document_their_settings() {
        for name in KNOWN_CHECKS {
            let check = by_name(name).unwrap();
            let help = check.help();
            assert!(!help.is_empty());
            for row in help {
                assert!(!row.name.is_empty());
                assert!(!row.description.is_empty());
            }
        }
    }
}
