//! Runtime routing targets.

use crate::config::{Protocol, ServiceConfig, TargetConfig};
use std::net::IpAddr;

/// The flattened record the chain manager routes traffic to.
///
/// One `NatTarget` combines a configured backend target with the bind
/// endpoint of the service it belongs to. Two targets are the same entry
/// iff every field matches; registration deduplicates on that equality.
#[derive(Debug, Clone, PartialEq)]
pub struct NatTarget {
    /// Backend address traffic is forwarded to.
    pub addr: IpAddr,
    /// Virtual address clients connect to.
    pub bind_addr: IpAddr,
    /// Virtual port clients connect to.
    pub bind_port: u16,
    /// Local source address replies are rewritten to originate from.
    pub local_addr: Option<IpAddr>,
    /// Backend port traffic is forwarded to.
    pub port: u16,
    /// Transport protocol of the service.
    pub proto: Protocol,
    /// Relative share of traffic this target receives.
    pub weight: f64,
}

impl NatTarget {
    /// Flatten a configured target with its service's bind endpoint into
    /// the record the chain manager routes.
    #[must_use]
    pub fn from_service(service: &ServiceConfig, target: &TargetConfig) -> Self {
        Self {
            addr: target.addr,
            bind_addr: service.bind_addr,
            bind_port: service.bind_port,
            local_addr: target.local_addr,
            port: target.port,
            proto: service.proto,
            weight: f64::from(target.weight),
        }
    }
}
