//! Engine configuration loading.
//!
//! Every section and every field is optional; anything left out falls back
//! to the defaults below, which describe the standard five-day, 30-period
//! week.
//!
//! The expected YAML structure is:
//! ```yaml
//! grid:
//!   days: [Monday, Tuesday, Wednesday, Thursday, Friday]
//!   periods_per_day: 30
//!   bands:
//!     morning: [1, 10]
//!     afternoon: [11, 20]
//!     night: [21, 30]
//!   rest_periods: []
//!   midweek_days: [Tuesday, Wednesday, Thursday]
//! search:
//!   mode: soft          # soft | hard
//!   parallel: false
//!   workers: 4          # optional, defaults to available parallelism
//! ranker:
//!   preferred_buildings: ["F"]
//!   cache_capacity: 1024
//! annealing:
//!   enabled: true
//!   initial_temperature: 100.0
//!   cooling_rate: 0.995
//!   min_temperature: 0.1
//!   max_iterations: 100000
//!   time_limit_ms: 2000   # optional
//!   seed: 42
//! ```

use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

// ── Grid ──────────────────────────────────────────────────────────────────────

/// Inclusive period ranges of the three bands.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct BandConfig {
    pub morning: (u8, u8),
    pub afternoon: (u8, u8),
    pub night: (u8, u8),
}

impl Default for BandConfig {
    fn default() -> Self {
        Self {
            morning: (1, 10),
            afternoon: (11, 20),
            night: (21, 30),
        }
    }
}

/// Shape of the weekly grid.  Validated by [`PeriodModel::new`].
///
/// [`PeriodModel::new`]: crate::period::PeriodModel::new
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    pub days: Vec<String>,
    pub periods_per_day: u8,
    pub bands: BandConfig,
    /// Periods that can never host a session, whatever the band.
    pub rest_periods: Vec<u8>,
    /// Days year-2 sessions try before the others.
    pub midweek_days: Vec<String>,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            days: ["Monday", "Tuesday", "Wednesday", "Thursday", "Friday"]
                .into_iter()
                .map(String::from)
                .collect(),
            periods_per_day: 30,
            bands: BandConfig::default(),
            rest_periods: Vec::new(),
            midweek_days: ["Tuesday", "Wednesday", "Thursday"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

// ── Search ────────────────────────────────────────────────────────────────────

/// How the constructive pass treats professor / class-group overlaps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConstraintMode {
    /// Overlaps are scored as penalties; the best candidate wins regardless.
    #[default]
    Soft,
    /// Any candidate with a conflict or a room-type mismatch is discarded.
    Hard,
}

impl std::fmt::Display for ConstraintMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConstraintMode::Soft => f.write_str("soft"),
            ConstraintMode::Hard => f.write_str("hard"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Mode of the first constructive pass.  The hard-mode fallback runs
    /// only when this pass assigns nothing.
    pub mode: ConstraintMode,
    /// Fan per-session search out to a worker pool.
    pub parallel: bool,
    /// Worker count for the parallel pass; `None` uses the hardware
    /// parallelism.
    pub workers: Option<usize>,
}

// ── Room ranker ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RankerConfig {
    /// Building / area tags that earn a small bonus.
    pub preferred_buildings: Vec<String>,
    /// Maximum number of per-session rankings kept.  Once full, new rankings
    /// are computed but no longer cached.
    pub cache_capacity: usize,
}

impl Default for RankerConfig {
    fn default() -> Self {
        Self {
            preferred_buildings: Vec::new(),
            cache_capacity: 1024,
        }
    }
}

// ── Annealing ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct AnnealConfig {
    pub enabled: bool,
    pub initial_temperature: f64,
    /// Multiplier applied to the temperature each iteration; must be in (0, 1).
    pub cooling_rate: f64,
    pub min_temperature: f64,
    /// Hard cap on iterations regardless of the cooling schedule.
    pub max_iterations: u64,
    /// Optional wall-clock budget for the whole annealing run.
    pub time_limit_ms: Option<u64>,
    pub seed: u64,
}

impl Default for AnnealConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            initial_temperature: 100.0,
            cooling_rate: 0.995,
            min_temperature: 0.1,
            max_iterations: 100_000,
            time_limit_ms: None,
            seed: 42,
        }
    }
}

impl AnnealConfig {
    /// Number of iterations the cooling schedule alone would run.
    pub fn scheduled_iterations(&self) -> u64 {
        if self.initial_temperature <= self.min_temperature {
            return 0;
        }
        let steps = (self.min_temperature / self.initial_temperature).ln() / self.cooling_rate.ln();
        steps.ceil() as u64
    }
}

// ── EngineConfig ──────────────────────────────────────────────────────────────

/// Complete engine configuration.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub grid: GridConfig,
    pub search: SearchConfig,
    pub ranker: RankerConfig,
    pub annealing: AnnealConfig,
}

impl EngineConfig {
    /// Parse a YAML document.  An empty document yields the defaults.
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: EngineConfig =
            serde_yaml::from_str(content).context("Failed to parse engine configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse `path`.
    ///
    /// # Errors
    /// Returns an error if the file cannot be opened, if the YAML is
    /// structurally invalid, or if [`validate`](Self::validate) rejects it.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        info!("Loading engine configuration from: {}", path.display());

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Cannot open configuration file: {}", path.display()))?;
        let config = Self::from_yaml_str(&content)
            .with_context(|| format!("Invalid configuration file: {}", path.display()))?;

        debug!(
            days = config.grid.days.len(),
            periods_per_day = config.grid.periods_per_day,
            mode = %config.search.mode,
            parallel = config.search.parallel,
            annealing = config.annealing.enabled,
            "engine configuration loaded"
        );
        Ok(config)
    }

    /// Reject settings the engine cannot run with.
    ///
    /// Grid shape is checked separately by the period model.
    pub fn validate(&self) -> Result<()> {
        let a = &self.annealing;
        if !(a.cooling_rate > 0.0 && a.cooling_rate < 1.0) {
            bail!(
                "annealing.cooling_rate must be strictly between 0 and 1, got {}",
                a.cooling_rate
            );
        }
        if !(a.min_temperature > 0.0) {
            bail!(
                "annealing.min_temperature must be positive, got {}",
                a.min_temperature
            );
        }
        if a.initial_temperature < a.min_temperature {
            bail!(
                "annealing.initial_temperature ({}) is below min_temperature ({})",
                a.initial_temperature,
                a.min_temperature
            );
        }
        if self.search.workers == Some(0) {
            bail!("search.workers must be at least 1");
        }
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
