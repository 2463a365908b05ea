use crate::neighborhood::Metric;
use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::{fmt::Debug, fs, ops::RangeBounds, path::Path};

/// Simulation configuration parameters.
///
/// Loaded from a TOML file and validated before use.
/// Every section and field is optional and falls back to its default.
#[derive(Debug, Default, PartialEq, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub grid: GridConfig,
    pub infection: InfectionConfig,
    pub movement: MovementConfig,
    pub lethality: LethalityConfig,
    pub vaccine: VaccineConfig,
    pub incubation: IncubationConfig,
    pub quarantine: QuarantineConfig,
    pub output: OutputConfig,
}

/// Grid dimensions and initial population.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GridConfig {
    /// Number of rows and columns.
    pub size: usize,
    /// Share of cells seeded with susceptible agents.
    pub susceptible_share: f64,
    /// Share of cells seeded with infective agents.
    pub infected_share: f64,
    /// Random seed; generated when absent.
    pub seed: Option<u64>,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            size: 100,
            susceptible_share: 0.69,
            infected_share: 0.01,
            seed: None,
        }
    }
}

/// Spread and recovery.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct InfectionConfig {
    /// Probability of infecting a susceptible neighbor per day.
    pub prob: f64,
    /// Probability of leaving the infective state per day.
    pub remove_prob: f64,
    pub radius: usize,
    pub metric: Metric,
}

impl Default for InfectionConfig {
    fn default() -> Self {
        Self {
            prob: 0.2,
            remove_prob: 0.6,
            radius: 1,
            metric: Metric::Manhattan,
        }
    }
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MovementConfig {
    /// Probability that an agent moves on a given day.
    pub mixing: f64,
    /// Restrict moves to the neighborhood of the current cell.
    pub limited: bool,
    pub radius: usize,
    pub metric: Metric,
    /// Draw the radius of each move from a half-normal distribution.
    pub long_moves_uncommon: bool,
}

impl Default for MovementConfig {
    fn default() -> Self {
        Self {
            mixing: 1.0,
            limited: false,
            radius: 3,
            metric: Metric::Euclidean,
            long_moves_uncommon: false,
        }
    }
}

/// Split of removals into deaths and immunity.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LethalityConfig {
    pub enabled: bool,
    pub prob: f64,
}

impl Default for LethalityConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            prob: 0.03,
        }
    }
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct VaccineConfig {
    pub enabled: bool,
    /// Day on which the vaccine is handed out.
    pub day: usize,
    /// Share of susceptible agents vaccinated on that day.
    pub share: f64,
}

impl Default for VaccineConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            day: 50,
            share: 0.5,
        }
    }
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IncubationConfig {
    pub enabled: bool,
    /// Days spent incubating before becoming infective.
    pub period: usize,
}

impl Default for IncubationConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            period: 5,
        }
    }
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct QuarantineConfig {
    pub enabled: bool,
    /// Target share of isolated agents among infective plus isolated ones.
    pub share: f64,
}

impl Default for QuarantineConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            share: 0.5,
        }
    }
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputConfig {
    /// Upper bound on the days simulated per create or resume.
    pub max_days: usize,
    /// Compute the neighborhood-based reproduction number every day.
    pub exact_r: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            max_days: 10_000,
            exact_r: true,
        }
    }
}

impl Config {
    /// Load a [`Config`] from a TOML file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, deserialized,
    /// or if the configuration values are invalid.
    pub fn from_file<P: AsRef<Path>>(file: P) -> Result<Self> {
        let file = file.as_ref();
        let contents =
            fs::read_to_string(file).with_context(|| format!("failed to read {file:?}"))?;

        let config: Config = toml::from_str(&contents).context("failed to deserialize config")?;

        config.validate().context("failed to validate config")?;

        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let grid = &self.grid;
        // Cells are allocated up front, size² of them.
        check_num(grid.size, 1..=MAX_GRID_SIZE).context("invalid grid size")?;
        check_num(grid.susceptible_share, 0.0..=1.0).context("invalid susceptible share")?;
        check_num(grid.infected_share, 0.0..=1.0).context("invalid infected share")?;
        let share_sum = grid.susceptible_share + grid.infected_share;
        if share_sum > 1.0 {
            bail!(
                "susceptible share {} plus infected share {} must not exceed 1.0, but is {share_sum}",
                grid.susceptible_share,
                grid.infected_share
            );
        }

        let inf = &self.infection;
        check_num(inf.prob, 0.0..=1.0).context("invalid infection probability")?;
        check_num(inf.remove_prob, 0.0..=1.0).context("invalid removal probability")?;
        check_num(inf.radius, 1..).context("invalid infection radius")?;

        let mov = &self.movement;
        check_num(mov.mixing, 0.0..=1.0).context("invalid mixing value")?;
        check_num(mov.radius, 1..).context("invalid movement radius")?;

        check_num(self.lethality.prob, 0.0..=1.0).context("invalid lethality")?;
        check_num(self.vaccine.share, 0.0..=1.0).context("invalid vaccine share")?;
        check_num(self.quarantine.share, 0.0..=1.0).context("invalid quarantine share")?;

        check_num(self.output.max_days, 1..).context("invalid maximum number of days")?;

        Ok(())
    }
}

/// Largest accepted grid side length.
pub const MAX_GRID_SIZE: usize = 10_000;

fn check_num<T, R>(num: T, range: R) -> Result<()>
where
    T: PartialOrd + Debug,
    R: RangeBounds<T> + Debug,
{
    if !range.contains(&num) {
        bail!("number must be in the range {range:?}, but is {num:?}");
    }
    Ok(())
}
