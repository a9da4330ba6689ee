//! Abstraction over the kernel packet-filter command surface.
//!
//! [`NatBackend`] mirrors the five operations the chain manager needs, all
//! against the `nat` table. Production code uses [`IptablesBackend`] on top
//! of the `iptables` crate; tests implement the trait with stateful
//! in-memory backends.

use super::error::{NatError, NatResult};
use super::rule::Rule;

/// The iptables table all managed chains live in.
pub const NAT_TABLE: &str = "nat";

/// Operations the chain manager issues against the kernel NAT table.
///
/// The backend exposes no higher-level semantics: atomicity, ordering and
/// idempotence are entirely the chain manager's responsibility.
pub trait NatBackend: Send + Sync {
    /// Whether `chain` exists in the `nat` table.
    ///
    /// An error here means the backend itself is unavailable and is treated
    /// as fatal by callers.
    fn chain_exists(&self, chain: &str) -> NatResult<bool>;

    /// Create `chain` empty. Fails if the chain already exists.
    fn new_chain(&self, chain: &str) -> NatResult<()>;

    /// Remove all rules from an existing `chain`, preserving the chain.
    fn clear_chain(&self, chain: &str) -> NatResult<()>;

    /// Append one rule to `chain`.
    fn append(&self, chain: &str, rule: &Rule) -> NatResult<()>;

    /// Insert `rule` at `position` iff no equal rule exists anywhere in
    /// `chain`. Idempotent: an already-present rule is a successful no-op.
    fn insert_unique(&self, chain: &str, position: u32, rule: &Rule) -> NatResult<()>;
}

impl<T: NatBackend + ?Sized> NatBackend for std::sync::Arc<T> {
    fn chain_exists(&self, chain: &str) -> NatResult<bool> {
        (**self).chain_exists(chain)
    }

    fn new_chain(&self, chain: &str) -> NatResult<()> {
        (**self).new_chain(chain)
    }

    fn clear_chain(&self, chain: &str) -> NatResult<()> {
        (**self).clear_chain(chain)
    }

    fn append(&self, chain: &str, rule: &Rule) -> NatResult<()> {
        (**self).append(chain, rule)
    }

    fn insert_unique(&self, chain: &str, position: u32, rule: &Rule) -> NatResult<()> {
        (**self).insert_unique(chain, position, rule)
    }
}

/// Production [`NatBackend`] backed by the `iptables` crate.
pub struct IptablesBackend {
    inner: iptables::IPTables,
}

impl IptablesBackend {
    /// Connect to the host's iptables command surface (IPv4).
    pub fn new() -> NatResult<Self> {
        let inner =
            iptables::new(false).map_err(|e| NatError::BackendUnavailable(e.to_string()))?;
        Ok(Self { inner })
    }
}

impl NatBackend for IptablesBackend {
    fn chain_exists(&self, chain: &str) -> NatResult<bool> {
        self.inner
            .chain_exists(NAT_TABLE, chain)
            .map_err(|e| NatError::BackendUnavailable(e.to_string()))
    }

    fn new_chain(&self, chain: &str) -> NatResult<()> {
        self.inner
            .new_chain(NAT_TABLE, chain)
            .map_err(|e| NatError::command(chain, e))
    }

    fn clear_chain(&self, chain: &str) -> NatResult<()> {
        self.inner
            .flush_chain(NAT_TABLE, chain)
            .map_err(|e| NatError::command(chain, e))
    }

    fn append(&self, chain: &str, rule: &Rule) -> NatResult<()> {
        self.inner
            .append(NAT_TABLE, chain, &rule.to_string())
            .map_err(|e| NatError::command(chain, e))
    }

    fn insert_unique(&self, chain: &str, position: u32, rule: &Rule) -> NatResult<()> {
        // The crate's own insert_unique errors on an existing rule; the
        // required semantics are a successful no-op.
        let rule = rule.to_string();
        let exists = self
            .inner
            .exists(NAT_TABLE, chain, &rule)
            .map_err(|e| NatError::command(chain, e))?;
        if exists {
            return Ok(());
        }

        self.inner
            .insert(NAT_TABLE, chain, &rule, position as i32)
            .map_err(|e| NatError::command(chain, e))
    }
}
