//! # natlb
//!
//! A host-local layer-4 load balancer that programs the kernel's `nat`
//! table instead of proxying traffic itself: inbound connections to a
//! service's bind endpoint are distributed across a weighted pool of
//! backend targets with statistic-match DNAT rules, and reply traffic is
//! pulled back through this host with SNAT.
//!
//! The software's job is to (a) compile the declarative service model
//! into the correct chain hierarchy, (b) keep that ruleset in sync with
//! the health of every target, and (c) do both atomically enough that
//! in-flight traffic never sees a half-installed dispatcher.
//!
//! ## Architecture
//!
//! ```text
//! config ──▶ orchestrator ──▶ chain manager ──▶ iptables (nat table)
//!                  │                ▲
//!                  └─▶ monitor per service (parallel health probes)
//! ```
//!
//! The kernel does the balancing; nothing in this process sits on the
//! packet path. See [`orchestrator::run`] for the entry point.

pub mod config;
pub mod modules;
pub mod orchestrator;
