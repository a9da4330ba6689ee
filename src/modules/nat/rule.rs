//! NAT rule vectors, chain naming and probability formatting.

use super::target::NatTarget;
use std::fmt;
use std::net::IpAddr;

/// A single packet-filter rule as an ordered argument vector.
///
/// Arguments are separate tokens passed to the backend verbatim, so no
/// quoting or escaping is required anywhere in the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    args: Vec<String>,
}

impl Rule {
    /// Create a rule from raw argument tokens.
    pub fn new<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// An unconditional jump to a chain or verdict.
    #[must_use]
    pub fn jump(target: &str) -> Self {
        Self::new(["-j", target])
    }

    /// The `-j RETURN` terminator every managed chain ends with.
    #[must_use]
    pub fn ret() -> Self {
        Self::jump("RETURN")
    }

    /// The probabilistic DNAT dispatch rule for one target.
    ///
    /// `probability` is the conditional match probability for this rule's
    /// position in the chain, not the target's unconditional share (see
    /// [`residual_probabilities`]).
    #[must_use]
    pub fn dnat(target: &NatTarget, probability: f64) -> Self {
        let prob = format_probability(probability);
        let proto = target.proto.to_string();
        let bind_addr = target.bind_addr.to_string();
        let bind_port = target.bind_port.to_string();
        let dest = format!("{}:{}", target.addr, target.port);

        Self::new([
            "-m",
            "statistic",
            "--mode",
            "random",
            "--probability",
            prob.as_str(),
            "-p",
            proto.as_str(),
            "-d",
            bind_addr.as_str(),
            "--dport",
            bind_port.as_str(),
            "-j",
            "DNAT",
            "--to-destination",
            dest.as_str(),
        ])
    }

    /// The SNAT rewrite rule ensuring replies for one target leave through
    /// the given local source address.
    #[must_use]
    pub fn snat(target: &NatTarget, local_addr: IpAddr) -> Self {
        let proto = target.proto.to_string();
        let addr = target.addr.to_string();
        let port = target.port.to_string();
        let source = local_addr.to_string();

        Self::new([
            "-p",
            proto.as_str(),
            "-d",
            addr.as_str(),
            "--dport",
            port.as_str(),
            "-j",
            "SNAT",
            "--to-source",
            source.as_str(),
        ])
    }

    /// The rule's argument tokens in order.
    #[must_use]
    pub fn args(&self) -> &[String] {
        &self.args
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.args.join(" "))
    }
}

/// Build a managed chain name from its components.
///
/// Components are upper-cased, every character outside `[A-Z0-9_]` is
/// replaced with `_`, and the results are joined with `_`. The mapping is
/// stable across runs.
#[must_use]
pub fn chain_name(components: &[&str]) -> String {
    components
        .iter()
        .map(|c| sanitize(c))
        .collect::<Vec<_>>()
        .join("_")
}

fn sanitize(component: &str) -> String {
    component
        .to_uppercase()
        .chars()
        .map(|c| {
            if c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Format a match probability with exactly three fractional digits, the
/// precision `xt_statistic` is driven with.
#[must_use]
pub fn format_probability(probability: f64) -> String {
    format!("{probability:.3}")
}

/// Compute the conditional match probability for each target.
///
/// The kernel applies statistic-mode rules sequentially: rule `i` only sees
/// packets not matched by rules before it, so to give target `i` the
/// unconditional share `wᵢ / W` its rule must match with `wᵢ / Wᵢ` where
/// `Wᵢ` is the weight not yet consumed by earlier rules. A residual weight
/// of zero means every remaining target has weight zero and gets
/// probability zero.
#[must_use]
pub fn residual_probabilities(targets: &[NatTarget]) -> Vec<f64> {
    let mut weight_left: f64 = targets.iter().map(|t| t.weight).sum();

    targets
        .iter()
        .map(|t| {
            let p = if weight_left > 0.0 {
                t.weight / weight_left
            } else {
                0.0
            };
            weight_left -= t.weight;
            p
        })
        .collect()
}
