//! # Kernel NAT Programming
//!
//! This module owns everything that touches the kernel's `nat` table:
//!
//! - [`backend`] - thin adapter over the iptables command surface
//! - [`chains`] - the managed chain hierarchy and its rule compilation
//! - [`rule`] - rule argument vectors, chain naming, match probabilities
//! - [`target`] - the runtime routing record
//!
//! The balancing itself happens in the kernel; nothing here sits on the
//! packet path.

pub mod backend;
pub mod chains;
pub mod error;
pub mod rule;
pub mod target;

pub use backend::{IptablesBackend, NatBackend, NAT_TABLE};
pub use chains::ChainManager;
pub use error::{NatError, NatResult};
pub use rule::{chain_name, Rule};
pub use target::NatTarget;
