//! Simulation configuration - lattice shape, rule choice and run settings
//!
//! [`SimulationConfig`] is built once per run (usually from a RON file) and
//! passed down to everything that needs it. Only the processor count, the
//! time delay and the step limit change during a run, and those go through
//! the controller's setters.
//!
//! [`SchedulerConfig`] carries the processor count on its own so the
//! scheduler can be driven without a full simulation config.

use crate::error::{Error, Result};
use lattica_core::{Boundary, Dimensions, InitialCondition, Params};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::warn;

/// Processor count for the generation scheduler
///
/// # Example
///
/// ```
/// use lattica_hub::SchedulerConfig;
///
/// // Serial mode (default)
/// let config = SchedulerConfig::default();
/// assert!(config.is_serial());
///
/// // Configure for 4 processors (clamped to available cores)
/// let config = SchedulerConfig::with_processor_count(4);
/// assert_eq!(config.processor_count(), 4.min(lattica_hub::max_cores()));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Number of shards processed in parallel, clamped to `[1, max_cores()]`
    processor_count: usize,
}

impl SchedulerConfig {
    /// Create a configuration with the given processor count
    ///
    /// The count is clamped to `[1, max_cores()]`.
    pub fn with_processor_count(processor_count: usize) -> Self {
        Self {
            processor_count: clamp_processors(processor_count),
        }
    }

    /// Create a configuration with exactly `processor_count` shards
    ///
    /// Not clamped to the machine's cores; shards beyond the core count
    /// simply share threads. Zero still becomes 1.
    pub fn exact(processor_count: usize) -> Self {
        Self {
            processor_count: processor_count.max(1),
        }
    }

    pub fn processor_count(&self) -> usize {
        self.processor_count
    }

    /// Set the processor count, clamped to `[1, max_cores()]`
    pub fn set_processor_count(&mut self, n: usize) {
        self.processor_count = clamp_processors(n);
    }

    /// Check if generations run on the calling thread
    pub fn is_serial(&self) -> bool {
        self.processor_count == 1
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self { processor_count: 1 }
    }
}

/// Get the maximum available cores on this system
///
/// ```
/// assert!(lattica_hub::max_cores() >= 1);
/// ```
pub fn max_cores() -> usize {
    num_cpus::get()
}

fn clamp_processors(requested: usize) -> usize {
    let clamped = requested.clamp(1, max_cores());
    if clamped != requested {
        warn!(requested, clamped, "processor count out of range, clamped");
    }
    clamped
}

/// Everything needed to set up one simulation run
///
/// Missing fields take their defaults, so a RON file only needs the
/// settings it changes:
///
/// ```
/// use lattica_hub::SimulationConfig;
///
/// let config = SimulationConfig::from_ron_str(r#"(
///     rows: 20,
///     columns: 30,
///     rule: "cyclic",
///     rule_params: { "states": "5" },
/// )"#).unwrap();
/// assert_eq!(config.rows, 20);
/// assert_eq!(config.rule_params.get("states"), Some("5"));
/// assert_eq!(config.topology, "square-8");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub rows: usize,
    pub columns: usize,
    /// Topology registry id
    pub topology: String,
    pub topology_params: Params,
    pub boundary: Boundary,
    /// Rule registry id
    pub rule: String,
    pub rule_params: Params,
    /// Generations that can be rewound beyond the rule's own lookback
    pub rewind_depth: usize,
    /// Generations averaged for display
    pub averaging_window: usize,
    pub processor_count: usize,
    pub time_delay_ms: u64,
    /// Stop after this many generations (`None` runs until stopped)
    pub max_steps: Option<u64>,
    /// Upper bound on the estimated lattice footprint
    pub memory_limit_bytes: u64,
    pub initial: InitialCondition,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            rows: DEFAULT_ROWS,
            columns: DEFAULT_COLUMNS,
            topology: "square-8".to_string(),
            topology_params: Params::new(),
            boundary: Boundary::Wrap,
            rule: "life".to_string(),
            rule_params: Params::new(),
            rewind_depth: 10,
            averaging_window: 1,
            processor_count: 1,
            time_delay_ms: 0,
            max_steps: None,
            memory_limit_bytes: 512 * 1024 * 1024,
            initial: InitialCondition::Random {
                density: 0.35,
                seed: 42,
            },
        }
    }
}

pub const DEFAULT_ROWS: usize = 100;
pub const DEFAULT_COLUMNS: usize = 100;

impl SimulationConfig {
    /// Parse a configuration from RON text
    pub fn from_ron_str(text: &str) -> Result<Self> {
        Ok(ron::from_str(text)?)
    }

    /// Load a configuration from a RON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_ron_str(&text)
    }

    /// Serialize to pretty RON
    pub fn to_ron_string(&self) -> Result<String> {
        ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
            .map_err(|e| Error::Config(e.to_string()))
    }

    /// Lattice dimensions, rejecting zero rows or columns
    pub fn dimensions(&self) -> Result<Dimensions> {
        Ok(Dimensions::new(self.rows, self.columns)?)
    }

    /// Check values that have no sane substitute
    pub fn validate(&self) -> Result<()> {
        self.dimensions()?;
        if let InitialCondition::Random { density, .. } = self.initial {
            if !(0.0..=1.0).contains(&density) {
                return Err(Error::Config(format!(
                    "random density {} is outside [0, 1]",
                    density
                )));
            }
        }
        Ok(())
    }

    /// History slots each cell needs for a rule reading `required` generations
    ///
    /// One slot beyond the rule's lookback keeps the pre-update state
    /// readable after a cell has advanced, so rewinding always has at least
    /// one step of room.
    pub fn history_capacity(&self, required: usize) -> usize {
        let required = required.max(1);
        required
            .saturating_add(self.rewind_depth.max(1))
            .max(self.averaging_window)
    }

    pub fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig::with_processor_count(self.processor_count)
    }

    pub fn time_delay(&self) -> Duration {
        Duration::from_millis(self.time_delay_ms)
    }

    /// This configuration with its dimensions capped at the defaults
    ///
    /// Returns `None` when nothing would change.
    pub fn reduced(&self) -> Option<Self> {
        let rows = self.rows.min(DEFAULT_ROWS);
        let columns = self.columns.min(DEFAULT_COLUMNS);
        if rows == self.rows && columns == self.columns {
            return None;
        }
        Some(Self {
            rows,
            columns,
            ..self.clone()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_serial() {
        let config = SchedulerConfig::default();
        assert!(config.is_serial());
        assert_eq!(config.processor_count(), 1);
    }

    #[test]
    fn test_processor_count_clamped() {
        assert_eq!(SchedulerConfig::with_processor_count(0).processor_count(), 1);
        assert_eq!(
            SchedulerConfig::with_processor_count(10000).processor_count(),
            max_cores()
        );

        let mut config = SchedulerConfig::default();
        config.set_processor_count(4);
        assert_eq!(config.processor_count(), 4.min(max_cores()));
        config.set_processor_count(1);
        assert!(config.is_serial());
    }

    #[test]
    fn test_exact_is_not_clamped() {
        assert_eq!(SchedulerConfig::exact(64).processor_count(), 64);
        assert_eq!(SchedulerConfig::exact(0).processor_count(), 1);
    }

    #[test]
    fn test_ron_round_trip() {
        let config = SimulationConfig {
            rows: 1,
            columns: 7,
            topology: "line".into(),
            rule: "second-order".into(),
            rule_params: Params::new().with("base", "elementary"),
            max_steps: Some(12),
            initial: InitialCondition::SingleSeed,
            ..SimulationConfig::default()
        };
        let text = config.to_ron_string().unwrap();
        assert_eq!(SimulationConfig::from_ron_str(&text).unwrap(), config);
    }

    #[test]
    fn test_from_ron_str_errors() {
        assert!(matches!(
            SimulationConfig::from_ron_str("(rows: \"ten\")"),
            Err(Error::Ron(_))
        ));
        assert!(matches!(
            SimulationConfig::load("/definitely/not/here.ron"),
            Err(Error::Io(_))
        ));
    }

    #[test]
    fn test_validate() {
        let mut config = SimulationConfig::default();
        assert!(config.validate().is_ok());

        config.rows = 0;
        assert!(matches!(
            config.validate(),
            Err(Error::Core(lattica_core::Error::InvalidDimensions { .. }))
        ));

        config.rows = 5;
        config.initial = InitialCondition::Random {
            density: 1.5,
            seed: 0,
        };
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_history_capacity() {
        let mut config = SimulationConfig::default();
        config.rewind_depth = 0;
        config.averaging_window = 1;
        assert_eq!(config.history_capacity(1), 2);
        assert_eq!(config.history_capacity(2), 3);

        config.rewind_depth = 3;
        assert_eq!(config.history_capacity(2), 5);

        config.averaging_window = 20;
        assert_eq!(config.history_capacity(2), 20);

        config.rewind_depth = usize::MAX;
        assert_eq!(config.history_capacity(2), usize::MAX);
    }

    #[test]
    fn test_reduced() {
        let mut config = SimulationConfig::default();
        assert!(config.reduced().is_none());

        config.rows = 10_000;
        config.columns = 50;
        let reduced = config.reduced().unwrap();
        assert_eq!((reduced.rows, reduced.columns), (DEFAULT_ROWS, 50));
        assert_eq!(reduced.rule, config.rule);
    }
}
