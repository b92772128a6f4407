//! Lattice setup with a degrade-and-retry ladder
//!
//! Building a lattice can run out of memory. Rather than failing outright,
//! setup walks three tiers:
//!
//! 1. the configuration as requested
//! 2. the same configuration with its dimensions capped at the defaults
//! 3. the default configuration
//!
//! Only resource exhaustion moves down the ladder. Configuration mistakes
//! (an unknown rule, zero rows) are reported straight away since a smaller
//! lattice would not fix them.

use crate::config::SimulationConfig;
use crate::error::{Error, Result};
use lattica_core::{Lattice, LatticeSpec, Rule, RuleRegistry, TopologyRegistry};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Which rung of the ladder produced the lattice
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildTier {
    Requested,
    Reduced,
    Defaults,
}

impl fmt::Display for BuildTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BuildTier::Requested => "requested",
            BuildTier::Reduced => "reduced",
            BuildTier::Defaults => "defaults",
        };
        f.write_str(name)
    }
}

/// The configuration that was actually built, and how it was reached
#[derive(Debug, Clone, PartialEq)]
pub struct BuildOutcome {
    pub config: SimulationConfig,
    pub tier: BuildTier,
}

impl BuildOutcome {
    /// Check whether the caller should be told their settings were not used
    pub fn degraded(&self) -> bool {
        self.tier != BuildTier::Requested
    }
}

/// A freshly built lattice with its rule, ready to run
pub struct Built {
    pub lattice: Lattice,
    pub rule: Arc<dyn Rule>,
    pub outcome: BuildOutcome,
}

/// Build the lattice for `config`, degrading on memory exhaustion
pub fn build(
    config: &SimulationConfig,
    rules: &RuleRegistry,
    topologies: &TopologyRegistry,
) -> Result<Built> {
    build_with_fallback(config, &SimulationConfig::default(), rules, topologies)
}

/// Like [`build`], with `fallback` as the last tier instead of the defaults
pub fn build_with_fallback(
    config: &SimulationConfig,
    fallback: &SimulationConfig,
    rules: &RuleRegistry,
    topologies: &TopologyRegistry,
) -> Result<Built> {
    let mut tiers = vec![(BuildTier::Requested, config.clone())];
    if let Some(reduced) = config.reduced() {
        tiers.push((BuildTier::Reduced, reduced));
    }
    tiers.push((BuildTier::Defaults, fallback.clone()));

    let attempts = tiers.len();
    let mut last = None;
    for (tier, candidate) in tiers {
        match build_exact(&candidate, rules, topologies) {
            Ok((lattice, rule)) => {
                info!(
                    %tier,
                    rows = candidate.rows,
                    columns = candidate.columns,
                    rule = rule.name(),
                    "lattice ready"
                );
                return Ok(Built {
                    lattice,
                    rule,
                    outcome: BuildOutcome {
                        config: candidate,
                        tier,
                    },
                });
            }
            Err(e @ Error::InsufficientMemory { .. }) => {
                warn!(%tier, error = %e, "lattice build out of memory, degrading");
                last = Some(e);
            }
            Err(e) => return Err(e),
        }
    }

    Err(Error::LatticeBuildFailed {
        attempts,
        last: last.map(|e| e.to_string()).unwrap_or_default(),
    })
}

/// Build exactly `config`, with no retry
pub fn build_exact(
    config: &SimulationConfig,
    rules: &RuleRegistry,
    topologies: &TopologyRegistry,
) -> Result<(Lattice, Arc<dyn Rule>)> {
    config.validate()?;
    let dimensions = config.dimensions()?;
    let rule = rules.create(&config.rule, &config.rule_params)?;
    let topology = topologies.create(&config.topology, &config.topology_params)?;
    let required = rule.required_generations().max(1);

    let spec = LatticeSpec {
        dimensions,
        topology,
        boundary: config.boundary,
        initial: rule.compatible_state(),
        history_capacity: config.history_capacity(required),
        required_generations: required,
    };

    let estimated_bytes = spec.estimated_bytes();
    let out_of_memory = || Error::InsufficientMemory {
        requested_cells: dimensions.cell_count(),
        estimated_bytes,
        limit_bytes: config.memory_limit_bytes,
    };
    if estimated_bytes > u128::from(config.memory_limit_bytes) {
        return Err(out_of_memory());
    }
    debug!(estimated_bytes, "building lattice");

    let lattice = Lattice::build(&spec).map_err(|e| match e {
        lattica_core::Error::InsufficientMemory { .. } => out_of_memory(),
        other => Error::Core(other),
    })?;
    config.initial.apply(&lattice, rule.compatible_state());
    Ok((lattice, rule))
}
