//! Per-service reconciliation loop.

use super::error::{MonitorError, MonitorResult};
use crate::config::{ServiceConfig, TargetConfig};
use crate::modules::health_check::{self, CheckError, CheckSettings, Checker};
use crate::modules::nat::{ChainManager, NatTarget};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, warn};

/// Drives one service's healthy set from its configured health probe.
///
/// Each tick probes every configured target in parallel, reconciles the
/// results with the chain manager, and rebuilds the managed chains iff the
/// registered set actually changed. A single probe flap therefore rewrites
/// the kernel ruleset at most once per interval.
pub struct ServiceMonitor {
    chains: Arc<ChainManager>,
    service: ServiceConfig,
    settings: Arc<CheckSettings>,
}

/// What one probe task reports back to the joining side.
struct ProbeOutcome {
    target: TargetConfig,
    result: Result<(), CheckError>,
}

impl ServiceMonitor {
    /// Create a monitor for one configured service.
    #[must_use]
    pub fn new(chains: Arc<ChainManager>, service: ServiceConfig) -> Self {
        let settings = Arc::new(CheckSettings::new(service.health_check.settings.clone()));
        Self {
            chains,
            service,
            settings,
        }
    }

    /// Run the reconciliation loop.
    ///
    /// Never returns under normal operation; returning an error means the
    /// monitor is dead and the error is fatal for the process. The sleep is
    /// anchored at tick start, so slow probes shorten the pause; when they
    /// exceed the interval the next tick starts immediately.
    pub async fn run(self) -> MonitorResult<()> {
        loop {
            let tick_start = Instant::now();

            let checker: Arc<dyn Checker> =
                health_check::by_name(&self.service.health_check.check_type)
                    .ok_or_else(|| {
                        MonitorError::UnknownChecker(self.service.health_check.check_type.clone())
                    })?
                    .into();

            self.reconcile(checker).await?;

            let interval = self.service.health_check.interval;
            tokio::time::sleep(interval.saturating_sub(tick_start.elapsed())).await;
        }
    }

    /// One reconciliation tick: probe all targets, update the healthy set,
    /// rebuild the chains iff it changed.
    async fn reconcile(&self, checker: Arc<dyn Checker>) -> MonitorResult<()> {
        let mut probes = Vec::with_capacity(self.service.targets.len());
        for target in &self.service.targets {
            let checker = checker.clone();
            let settings = self.settings.clone();
            let target = target.clone();

            probes.push(tokio::spawn(async move {
                let result = checker.check(&settings, &target).await;
                ProbeOutcome { target, result }
            }));
        }

        let mut up = Vec::new();
        let mut down = Vec::new();
        let mut changed = false;

        for probe in probes {
            let outcome = probe
                .await
                .map_err(|e| MonitorError::TaskJoin(e.to_string()))?;

            let nat_target = NatTarget::from_service(&self.service, &outcome.target);
            let endpoint = outcome.target.endpoint();

            match outcome.result {
                Ok(()) => {
                    debug!(service = %self.service.name, target = %endpoint, "target up");
                    changed |= self
                        .chains
                        .register_service_target(&self.service.name, nat_target);
                    up.push(endpoint);
                }
                Err(err) => {
                    debug!(
                        service = %self.service.name,
                        target = %endpoint,
                        error = %err,
                        "detected target down"
                    );
                    changed |= self
                        .chains
                        .unregister_service_target(&self.service.name, &nat_target);
                    down.push(endpoint);
                }
            }
        }

        let total = up.len() + down.len();
        if down.is_empty() {
            debug!(
                service = %self.service.name,
                up = ?up,
                "{}/{} targets up", up.len(), total
            );
        } else if !up.is_empty() {
            warn!(
                service = %self.service.name,
                up = ?up,
                down = ?down,
                "{}/{} targets up", up.len(), total
            );
        } else {
            error!(
                service = %self.service.name,
                down = ?down,
                "{}/{} targets up", up.len(), total
            );
        }

        if !changed {
            return Ok(());
        }

        let chains = self.chains.clone();
        tokio::task::spawn_blocking(move || chains.ensure_managed_chains())
            .await
            .map_err(|e| MonitorError::TaskJoin(e.to_string()))??;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HealthCheckConfig;
    use crate::modules::nat::backend::NatBackend;
    use crate::modules::nat::rule::Rule;
    use crate::modules::nat::NatResult;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::net::TcpListener;

    /// Backend that accepts everything and counts chain installs.
    #[derive(Default)]
    struct CountingBackend {
        clears: AtomicUsize,
    }

    impl CountingBackend {
        fn rebuilds(&self) -> usize {
            // Every ensure_managed_chains clears the top-level DNAT chain
            // exactly once; per-service chains inflate the raw count, so
            // callers compare relative values only.
            self.clears.load(Ordering::Relaxed)
        }
    }

    impl NatBackend for CountingBackend {
        fn chain_exists(&self, _chain: &str) -> NatResult<bool> {
            Ok(true)
        }
        fn new_chain(&self, _chain: &str) -> NatResult<()> {
            Ok(())
        }
        fn clear_chain(&self, _chain: &str) -> NatResult<()> {
            self.clears.fetch_add(1, Ordering::Relaxed);
            Ok(())
        }
        fn append(&self, _chain: &str, _rule: &Rule) -> NatResult<()> {
            Ok(())
        }
        fn insert_unique(&self, _chain: &str, _position: u32, _rule: &Rule) -> NatResult<()> {
            Ok(())
        }
    }

    fn service(name: &str, targets: Vec<TargetConfig>, settings: toml::Table) -> ServiceConfig {
        ServiceConfig {
            name: name.to_string(),
            bind_addr: "10.0.0.1".parse().unwrap(),
            bind_port: 80,
            proto: Default::default(),
            health_check: HealthCheckConfig {
                check_type: "tcp".to_string(),
                interval: Duration::from_secs(10),
                settings,
            },
            targets,
        }
    }

    fn target(addr: &str, port: u16) -> TargetConfig {
        TargetConfig {
            addr: addr.parse().unwrap(),
            local_addr: None,
            port,
            weight: 1,
        }
    }

    fn fixture(svc: &ServiceConfig) -> (ServiceMonitor, Arc<CountingBackend>) {
        let backend = Arc::new(CountingBackend::default());
        let chains = Arc::new(ChainManager::new(
            Box::new(backend.clone()),
            "natlb",
            [svc.name.clone()],
        ));
        (ServiceMonitor::new(chains, svc.clone()), backend)
    }

    fn checker() -> Arc<dyn Checker> {
        health_check::by_name("tcp").unwrap().into()
    }

    #[tokio::test]
    async fn test_rebuild_only_on_change() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let svc = service("web", vec![target("127.0.0.1", port)], toml::Table::new());
        let (monitor, backend) = fixture(&svc);

        // First tick: target newly registered, chains rebuilt.
        monitor.reconcile(checker()).await.unwrap();
        let after_first = backend.rebuilds();
        assert!(after_first > 0);

        // Second tick: nothing changed, no rebuild.
        monitor.reconcile(checker()).await.unwrap();
        assert_eq!(backend.rebuilds(), after_first);
    }

    #[tokio::test]
    async fn test_failed_probe_unregisters_target() {
        let settings: toml::Table = toml::from_str(r#"timeout = "100ms""#).unwrap();
        let svc = service("web", vec![target("192.0.2.1", 65535)], settings);
        let (monitor, backend) = fixture(&svc);

        // Seed the healthy set as if a previous tick had the target up.
        let nat_target = NatTarget::from_service(&svc, &svc.targets[0]);
        assert!(monitor
            .chains
            .register_service_target("web", nat_target.clone()));

        // Probe fails, target leaves the set, chains rebuilt once.
        monitor.reconcile(checker()).await.unwrap();
        assert!(!monitor.chains.unregister_service_target("web", &nat_target));
        assert!(backend.rebuilds() > 0);

        // Still down on the next tick: no further rebuild.
        let after_first = backend.rebuilds();
        monitor.reconcile(checker()).await.unwrap();
        assert_eq!(backend.rebuilds(), after_first);
    }

    #[tokio::test]
    async fn test_unknown_checker_is_fatal() {
        let mut svc = service("web", vec![target("127.0.0.1", 80)], toml::Table::new());
        svc.health_check.check_type = "icmp".to_string();
        let (monitor, _) = fixture(&svc);

        let err = monitor.run().await.unwrap_err();
        assert!(matches!(err, MonitorError::UnknownChecker(name) if name == "icmp"));
    }
}
