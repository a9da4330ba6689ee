//! TCP connect health check.

use super::error::{CheckError, CheckResult};
use super::settings::CheckSettings;
use super::{Checker, SettingHelp};
use crate::config::TargetConfig;
use async_trait::async_trait;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;

const SETTING_PORT: &str = "port";
const SETTING_TIMEOUT: &str = "timeout";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(1);

/// A target is up iff a TCP connection to it can be established.
#[derive(Debug, Default)]
pub struct TcpCheck;

impl TcpCheck {
    /// Create a new TCP check.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Checker for TcpCheck {
    async fn check(&self, settings: &CheckSettings, target: &TargetConfig) -> CheckResult<()> {
        let addr = SocketAddr::new(target.addr, settings.port_or(SETTING_PORT, target.port));
        let limit = settings.duration_or(SETTING_TIMEOUT, DEFAULT_TIMEOUT);

        match timeout(limit, TcpStream::connect(addr)).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(CheckError::ConnectionFailed {
                endpoint: addr.to_string(),
                message: e.to_string(),
            }),
            Err(_) => Err(CheckError::Timeout(limit)),
        }
    }

    fn help(&self) -> Vec<SettingHelp> {
        vec![
            SettingHelp {
                name: SETTING_PORT,
                default: "target-port".to_string(),
                description: "Port to connect to",
            },
            SettingHelp {
                name: SETTING_TIMEOUT,
                default: humantime::format_duration(DEFAULT_TIMEOUT).to_string(),
                description: "Timeout for the connect",
            },
        ]
    }
}
