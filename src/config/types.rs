//! Configuration type definitions.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;
use std::time::Duration;

/// Root configuration structure for natlb.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct BalancerConfig {
    /// Name prefix for every chain this instance manages.
    pub managed_chain: String,

    /// Services to expose and balance.
    pub services: Vec<ServiceConfig>,
}

/// A single virtual endpoint mapped onto a weighted backend pool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Service name, unique; also a component of its chain names.
    pub name: String,

    /// Virtual address clients connect to.
    pub bind_addr: IpAddr,

    /// Virtual port clients connect to.
    pub bind_port: u16,

    /// Transport protocol.
    #[serde(default)]
    pub proto: Protocol,

    /// Health check applied to every target.
    pub health_check: HealthCheckConfig,

    /// Backend targets, in configuration order.
    pub targets: Vec<TargetConfig>,
}

/// Health-check descriptor: which probe to run, how often, and its
/// probe-specific settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheckConfig {
    /// Registered check type name (`tcp`, `http`, `smtp`).
    #[serde(rename = "type")]
    pub check_type: String,

    /// Probe interval per reconciliation tick.
    #[serde(with = "humantime_serde", default = "default_interval")]
    pub interval: Duration,

    /// Opaque settings bag handed to the check; recognized keys depend on
    /// the check type (`natlb checkhelp <type>` lists them).
    #[serde(default)]
    pub settings: toml::Table,
}

/// A single backend target of a service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetConfig {
    /// Backend address traffic is forwarded to.
    pub addr: IpAddr,

    /// Local source address replies are rewritten to originate from, so
    /// they return through this host for un-NAT.
    pub local_addr: Option<IpAddr>,

    /// Backend port traffic is forwarded to.
    pub port: u16,

    /// Relative share of traffic this target receives.
    #[serde(default = "default_weight")]
    pub weight: u32,
}

impl TargetConfig {
    /// The `addr:port` form used in logs.
    #[must_use]
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.addr, self.port)
    }
}

/// Transport protocol of a service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    /// TCP (default).
    #[default]
    Tcp,
    /// UDP.
    Udp,
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tcp => write!(f, "tcp"),
            Self::Udp => write!(f, "udp"),
        }
    }
}

fn default_interval() -> Duration {
    Duration::from_secs(10)
}

fn default_weight() -> u32 {
    1
}
