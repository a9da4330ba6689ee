//! Wiring of configuration, chain manager and service monitors.

use crate::config::BalancerConfig;
use crate::modules::nat::{ChainManager, IptablesBackend, NatBackend, NatError};
use crate::modules::service_monitor::{MonitorError, ServiceMonitor};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::info;

/// Errors that abort the balancer.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// Setting up the NAT chains failed.
    #[error("setting up NAT chains: {0}")]
    Nat(#[from] NatError),

    /// A service monitor died.
    #[error("service monitor '{service}' failed: {source}")]
    Monitor {
        /// Name of the failed service.
        service: String,
        /// The monitor's fatal error.
        #[source]
        source: MonitorError,
    },

    /// A spawned task died instead of reporting back.
    #[error("task failed: {0}")]
    TaskJoin(String),
}

/// Result type for orchestrator operations.
pub type OrchestratorResult<T> = Result<T, OrchestratorError>;

/// Run the balancer against the host's iptables until the first fatal
/// error.
///
/// `install_jumps` additionally inserts the jumps from PREROUTING and
/// POSTROUTING into the managed chains; without it operators wire those
/// jumps themselves.
pub async fn run(config: BalancerConfig, install_jumps: bool) -> OrchestratorResult<()> {
    let backend = IptablesBackend::new()?;
    run_with_backend(config, install_jumps, Box::new(backend)).await
}

/// Run the balancer against an arbitrary NAT backend.
pub async fn run_with_backend(
    config: BalancerConfig,
    install_jumps: bool,
    backend: Box<dyn NatBackend>,
) -> OrchestratorResult<()> {
    let chains = Arc::new(ChainManager::new(
        backend,
        &config.managed_chain,
        config.services.iter().map(|s| s.name.clone()),
    ));

    // Materialize the chain skeletons before any monitor runs, so the
    // dispatchers exist (and are jumpable) from the start.
    let skeleton = chains.clone();
    tokio::task::spawn_blocking(move || skeleton.ensure_managed_chains())
        .await
        .map_err(|e| OrchestratorError::TaskJoin(e.to_string()))??;

    if install_jumps {
        let routing = chains.clone();
        tokio::task::spawn_blocking(move || routing.enable_managed_routing_chains())
            .await
            .map_err(|e| OrchestratorError::TaskJoin(e.to_string()))??;
    }

    let service_count = config.services.len();
    let (tx, mut rx) = mpsc::channel(service_count.max(1));

    for service in config.services {
        let name = service.name.clone();
        let monitor = ServiceMonitor::new(chains.clone(), service);
        let tx = tx.clone();

        tokio::spawn(async move {
            let result = monitor.run().await;
            let _ = tx.send((name, result)).await;
        });
    }
    drop(tx);

    info!(
        services = service_count,
        version = env!("CARGO_PKG_VERSION"),
        "natlb started"
    );

    while let Some((service, result)) = rx.recv().await {
        if let Err(source) = result {
            return Err(OrchestratorError::Monitor { service, source });
        }
    }

    Ok(())
}
