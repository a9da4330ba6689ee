//! Managed chain hierarchy and rule compilation.
//!
//! The chain manager owns the authoritative copy of every service's healthy
//! target set and keeps the kernel's chain hierarchy in sync with it:
//!
//! ```text
//! PREROUTING ──▶ M_DNAT ──▶ M_<svc>_DNAT   (statistic-match DNAT per target)
//! POSTROUTING ─▶ M_SNAT ──▶ M_<svc>_SNAT   (SNAT to the target's local addr)
//! ```
//!
//! Chains are rebuilt clear-then-append; a chain being rebuilt is briefly
//! empty and packets traversing it in that window fall through to the
//! dispatcher's RETURN un-NATed. Only the one chain being rebuilt is
//! affected.

use super::backend::NatBackend;
use super::error::{NatError, NatResult};
use super::rule::{chain_name, residual_probabilities, Rule};
use super::target::NatTarget;
use std::collections::BTreeMap;
use std::sync::RwLock;
use tracing::{debug, warn};

/// Owns the managed chain hierarchy for one chain prefix.
pub struct ChainManager {
    backend: Box<dyn NatBackend>,
    managed_chain: String,
    services: RwLock<BTreeMap<String, Vec<NatTarget>>>,
}

impl ChainManager {
    /// Create a chain manager for the given prefix, seeded with every
    /// configured service name so the per-service chain skeletons exist
    /// from the first [`ensure_managed_chains`](Self::ensure_managed_chains).
    pub fn new<I, S>(
        backend: Box<dyn NatBackend>,
        managed_chain: impl Into<String>,
        services: I,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let services = services
            .into_iter()
            .map(|name| (name.into(), Vec::new()))
            .collect();

        Self {
            backend,
            managed_chain: managed_chain.into(),
            services: RwLock::new(services),
        }
    }

    /// Recompile and install every chain this manager owns.
    ///
    /// Holds the read lock over the service mapping for the whole install
    /// so no registration can interleave a compile. Aborts on the first
    /// backend error; the next successful call fully reinstalls.
    pub fn ensure_managed_chains(&self) -> NatResult<()> {
        let services = self.services.read().expect("services lock poisoned");

        let mut dnat_jumps = Vec::with_capacity(services.len() + 1);
        let mut snat_jumps = Vec::with_capacity(services.len() + 1);

        for (service, targets) in services.iter() {
            let dnat_chain = chain_name(&[&self.managed_chain, service, "DNAT"]);
            let snat_chain = chain_name(&[&self.managed_chain, service, "SNAT"]);

            self.ensure_chain_with_rules(&dnat_chain, &dnat_rules(service, targets))?;
            self.ensure_chain_with_rules(&snat_chain, &snat_rules(targets))?;

            dnat_jumps.push(Rule::jump(&dnat_chain));
            snat_jumps.push(Rule::jump(&snat_chain));
        }

        dnat_jumps.push(Rule::ret());
        snat_jumps.push(Rule::ret());

        self.ensure_chain_with_rules(&chain_name(&[&self.managed_chain, "DNAT"]), &dnat_jumps)?;
        self.ensure_chain_with_rules(&chain_name(&[&self.managed_chain, "SNAT"]), &snat_jumps)?;

        Ok(())
    }

    /// Idempotently insert the jumps from PREROUTING and POSTROUTING into
    /// the top-level managed chains, at position 1.
    ///
    /// Gated behind an operator flag: operators may prefer to wire these
    /// jumps into their own rule layout manually.
    pub fn enable_managed_routing_chains(&self) -> NatResult<()> {
        self.backend.insert_unique(
            "PREROUTING",
            1,
            &Rule::jump(&chain_name(&[&self.managed_chain, "DNAT"])),
        )?;
        self.backend.insert_unique(
            "POSTROUTING",
            1,
            &Rule::jump(&chain_name(&[&self.managed_chain, "SNAT"])),
        )?;

        Ok(())
    }

    /// Add a routing target to a service's healthy set.
    ///
    /// Returns `true` iff the set changed; re-registering a structurally
    /// equal target is a no-op.
    pub fn register_service_target(&self, service: &str, target: NatTarget) -> bool {
        let mut services = self.services.write().expect("services lock poisoned");
        let targets = services.entry(service.to_string()).or_default();

        if targets.contains(&target) {
            return false;
        }

        targets.push(target);
        true
    }

    /// Remove a routing target from a service's healthy set.
    ///
    /// Returns `true` iff a structurally equal entry was present.
    pub fn unregister_service_target(&self, service: &str, target: &NatTarget) -> bool {
        let mut services = self.services.write().expect("services lock poisoned");
        let Some(targets) = services.get_mut(service) else {
            return false;
        };

        let before = targets.len();
        targets.retain(|t| t != target);
        targets.len() != before
    }

    /// Install `rules` as the exact content of `chain`: clear it if it
    /// exists, create it otherwise, then append in order.
    fn ensure_chain_with_rules(&self, chain: &str, rules: &[Rule]) -> NatResult<()> {
        self.install_rules(chain, rules)
            .map_err(|e| NatError::ChainInstall {
                chain: chain.to_string(),
                source: Box::new(e),
            })
    }

    fn install_rules(&self, chain: &str, rules: &[Rule]) -> NatResult<()> {
        if self.backend.chain_exists(chain)? {
            self.backend.clear_chain(chain)?;
        } else {
            self.backend.new_chain(chain)?;
        }

        for rule in rules {
            self.backend.append(chain, rule)?;
        }

        debug!(chain, rules = rules.len(), "installed chain rules");
        Ok(())
    }
}

/// Compile the DNAT dispatch rules for one service's healthy targets.
fn dnat_rules(service: &str, targets: &[NatTarget]) -> Vec<Rule> {
    let total: f64 = targets.iter().map(|t| t.weight).sum();
    if !targets.is_empty() && total <= 0.0 {
        warn!(service, "total target weight is zero, service receives no traffic");
        return vec![Rule::ret()];
    }

    let probabilities = residual_probabilities(targets);
    let mut rules: Vec<Rule> = targets
        .iter()
        .zip(probabilities)
        .map(|(target, p)| Rule::dnat(target, p))
        .collect();

    rules.push(Rule::ret());
    rules
}

/// Compile the SNAT rewrite rules for one service's healthy targets.
///
/// Targets without a local address get no SNAT rule; there is nothing to
/// rewrite the source to.
fn snat_rules(targets: &[NatTarget]) -> Vec<Rule> {
    let mut rules: Vec<Rule> = targets
        .iter()
        .filter_map(|target| target.local_addr.map(|local| Rule::snat(target, local)))
        .collect();

    rules.push(Rule::ret());
    rules
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Protocol;
    use std::collections::BTreeMap;
    use std::sync::{Arc, Mutex};

    /// Stateful in-memory backend recording every chain's rule list.
    #[derive(Default)]
    struct RecordingBackend {
        chains: Mutex<BTreeMap<String, Vec<String>>>,
    }

    impl RecordingBackend {
        fn rules(&self, chain: &str) -> Vec<String> {
            self.chains
                .lock()
                .unwrap()
                .get(chain)
                .cloned()
                .unwrap_or_default()
        }

        fn chain_names(&self) -> Vec<String> {
            self.chains.lock().unwrap().keys().cloned().collect()
        }
    }

    impl NatBackend for RecordingBackend {
        fn chain_exists(&self, chain: &str) -> NatResult<bool> {
            Ok(self.chains.lock().unwrap().contains_key(chain))
        }

        fn new_chain(&self, chain: &str) -> NatResult<()> {
            let mut chains = self.chains.lock().unwrap();
            if chains.contains_key(chain) {
                return Err(NatError::command(chain, "chain already exists"));
            }
            chains.insert(chain.to_string(), Vec::new());
            Ok(())
        }

        fn clear_chain(&self, chain: &str) -> NatResult<()> {
            let mut chains = self.chains.lock().unwrap();
            match chains.get_mut(chain) {
                Some(rules) => {
                    rules.clear();
                    Ok(())
                }
                None => Err(NatError::command(chain, "no such chain")),
            }
        }

        fn append(&self, chain: &str, rule: &Rule) -> NatResult<()> {
            let mut chains = self.chains.lock().unwrap();
            match chains.get_mut(chain) {
                Some(rules) => {
                    rules.push(rule.to_string());
                    Ok(())
                }
                None => Err(NatError::command(chain, "no such chain")),
            }
        }

        fn insert_unique(&self, chain: &str, position: u32, rule: &Rule) -> NatResult<()> {
            let mut chains = self.chains.lock().unwrap();
            let rules = chains.entry(chain.to_string()).or_default();
            let rule = rule.to_string();
            if rules.contains(&rule) {
                return Ok(());
            }
            rules.insert((position as usize).saturating_sub(1).min(rules.len()), rule);
            Ok(())
        }
    }

    fn target(addr: &str, weight: f64) -> NatTarget {
        NatTarget {
            addr: addr.parse().unwrap(),
            bind_addr: "10.0.0.1".parse().unwrap(),
            bind_port: 80,
            local_addr: Some("192.168.1.1".parse().unwrap()),
            port: 8080,
            proto: Protocol::Tcp,
            weight,
        }
    }

    fn manager(services: &[&str]) -> (ChainManager, Arc<RecordingBackend>) {
        let backend = Arc::new(RecordingBackend::default());
        let manager = ChainManager::new(
            Box::new(backend.clone()),
            "natlb",
            services.iter().copied(),
        );
        (manager, backend)
    }

    #[test]
    fn test_register_deduplicates() {
        let (manager, _) = manager(&["web"]);

        assert!(manager.register_service_target("web", target("192.168.1.10", 1.0)));
        assert!(!manager.register_service_target("web", target("192.168.1.10", 1.0)));
        assert!(manager.register_service_target("web", target("192.168.1.11", 1.0)));
    }

    #[test]
    fn test_unregister_removes_all_equal_entries() {
        let (manager, _) = manager(&["web"]);
        let t = target("192.168.1.10", 1.0);

        assert!(manager.register_service_target("web", t.clone()));
        assert!(manager.unregister_service_target("web", &t));
        assert!(!manager.unregister_service_target("web", &t));
    }

    #[test]
    fn test_unregister_unknown_service() {
        let (manager, _) = manager(&[]);
        assert!(!manager.unregister_service_target("ghost", &target("192.168.1.10", 1.0)));
    }

    #[test]
    fn test_skeleton_chains_for_configured_services() {
        let (manager, backend) = manager(&["web", "api"]);
        manager.ensure_managed_chains().unwrap();

        assert_eq!(
            backend.chain_names(),
            vec![
                "NATLB_API_DNAT",
                "NATLB_API_SNAT",
                "NATLB_DNAT",
                "NATLB_SNAT",
                "NATLB_WEB_DNAT",
                "NATLB_WEB_SNAT",
            ]
        );
        assert_eq!(backend.rules("NATLB_WEB_DNAT"), vec!["-j RETURN"]);
    }

    #[test]
    fn test_weighted_dnat_chain_contents() {
        let (manager, backend) = manager(&["web"]);
        manager.register_service_target("web", target("192.168.1.10", 1.0));
        manager.register_service_target("web", target("192.168.1.11", 3.0));
        manager.ensure_managed_chains().unwrap();

        let rules = backend.rules("NATLB_WEB_DNAT");
        assert_eq!(rules.len(), 3);
        assert!(rules[0].contains("--probability 0.250"));
        assert!(rules[0].ends_with("--to-destination 192.168.1.10:8080"));
        assert!(rules[1].contains("--probability 1.000"));
        assert!(rules[1].ends_with("--to-destination 192.168.1.11:8080"));
        assert_eq!(rules[2], "-j RETURN");
    }

    #[test]
    fn test_snat_chain_skips_targets_without_local_addr() {
        let (manager, backend) = manager(&["web"]);
        let mut bare = target("192.168.1.11", 1.0);
        bare.local_addr = None;

        manager.register_service_target("web", target("192.168.1.10", 1.0));
        manager.register_service_target("web", bare);
        manager.ensure_managed_chains().unwrap();

        let rules = backend.rules("NATLB_WEB_SNAT");
        assert_eq!(rules.len(), 2);
        assert!(rules[0].contains("-d 192.168.1.10"));
        assert_eq!(rules[1], "-j RETURN");
    }

    #[test]
    fn test_zero_total_weight_installs_return_only() {
        let (manager, backend) = manager(&["web"]);
        manager.register_service_target("web", target("192.168.1.10", 0.0));
        manager.ensure_managed_chains().unwrap();

        assert_eq!(backend.rules("NATLB_WEB_DNAT"), vec!["-j RETURN"]);
    }

    #[test]
    fn test_dispatcher_holds_one_jump_per_service() {
        let (manager, backend) = manager(&["web", "api"]);
        manager.ensure_managed_chains().unwrap();

        assert_eq!(
            backend.rules("NATLB_DNAT"),
            vec!["-j NATLB_API_DNAT", "-j NATLB_WEB_DNAT", "-j RETURN"]
        );
        assert_eq!(
            backend.rules("NATLB_SNAT"),
            vec!["-j NATLB_API_SNAT", "-j NATLB_WEB_SNAT", "-j RETURN"]
        );
    }

    #[test]
    fn test_rebuild_replaces_chain_contents() {
        let (manager, backend) = manager(&["web"]);
        let t = target("192.168.1.10", 1.0);

        manager.register_service_target("web", t.clone());
        manager.ensure_managed_chains().unwrap();
        assert_eq!(backend.rules("NATLB_WEB_DNAT").len(), 2);

        manager.unregister_service_target("web", &t);
        manager.ensure_managed_chains().unwrap();
        assert_eq!(backend.rules("NATLB_WEB_DNAT"), vec!["-j RETURN"]);
    }

    #[test]
    fn test_routing_jumps_inserted_once_at_position_one() {
        let (manager, backend) = manager(&["web"]);
        backend
            .insert_unique("PREROUTING", 1, &Rule::new(["-j", "DOCKER"]))
            .unwrap();

        manager.enable_managed_routing_chains().unwrap();
        manager.enable_managed_routing_chains().unwrap();

        let prerouting = backend.rules("PREROUTING");
        assert_eq!(prerouting, vec!["-j NATLB_DNAT", "-j DOCKER"]);
        assert_eq!(backend.rules("POSTROUTING"), vec!["-j NATLB_SNAT"]);
    }
}
