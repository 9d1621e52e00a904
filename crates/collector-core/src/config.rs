//! Configuration loading and typed config structures for the Collector simulation.
//!
//! The canonical configuration lives in `collector-config.yaml` in the
//! working directory. This module defines strongly-typed structs that
//! mirror the YAML structure, and provides a loader that reads the file
//! and a validator for the semantic constraints serde cannot express.
//!
//! Every field has a default, so an empty file (or no file at all) yields
//! a runnable configuration: the standard 1/4096 special rate, per-member
//! retention, and a cadence tuned for runs of billions of draws.

use std::path::{Path, PathBuf};

use collector_types::{RunName, RunNameError};
use serde::{Deserialize, Serialize};

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// The configuration parsed but describes an impossible run.
    #[error("invalid configuration: {reason}")]
    Invalid {
        /// Explanation of what is wrong with the configuration.
        reason: String,
    },

    /// The configured run name cannot be used as a storage key.
    #[error("invalid run name: {source}")]
    RunName {
        /// The underlying validation error.
        #[from]
        source: RunNameError,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level simulation configuration.
///
/// Mirrors the structure of `collector-config.yaml`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SimulationConfig {
    /// Run identity, seed, and storage root.
    #[serde(default)]
    pub run: RunConfig,

    /// Population source and weight tuning constants.
    #[serde(default)]
    pub population: PopulationConfig,

    /// Special-event and retention probabilities.
    #[serde(default)]
    pub encounter: EncounterConfig,

    /// Draw-count intervals for milestones, checkpoints, progress, and ETA.
    #[serde(default)]
    pub cadence: CadenceConfig,

    /// Log level and record buffer capacities.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl SimulationConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// Environment variables override YAML values:
    /// - `COLLECTOR_RUN_NAME` overrides `run.name`
    /// - `COLLECTOR_POPULATION` overrides `population.source`
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, or
    /// [`ConfigError::Yaml`] if the content is not valid YAML.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: Self = serde_yml::from_str(&contents)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Parse configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yml::from_str(yaml)?;
        Ok(config)
    }

    /// Override run name and population source from the environment when set.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("COLLECTOR_RUN_NAME") {
            self.run.name = val;
        }
        if let Ok(val) = std::env::var("COLLECTOR_POPULATION") {
            self.population.source = PathBuf::from(val);
        }
    }

    /// Validated run name.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::RunName`] if `run.name` is not a valid run name.
    pub fn run_name(&self) -> Result<RunName, ConfigError> {
        Ok(RunName::parse(&self.run.name)?)
    }

    /// Check every semantic constraint on the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] describing the first violated
    /// constraint, or [`ConfigError::RunName`] for a bad run name.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.run_name()?;

        let rate = self.encounter.special_rate.probability();
        if !rate.is_finite() || rate <= 0.0 || rate > 1.0 {
            return Err(invalid(format!(
                "encounter.special_rate must be in (0, 1], got {rate}"
            )));
        }

        let stability = self.population.stability_constant;
        if !stability.is_finite() || stability <= 0.0 {
            return Err(invalid(format!(
                "population.stability_constant must be positive, got {stability}"
            )));
        }

        let exponent = self.population.rarity_exponent;
        if !exponent.is_finite() || exponent <= 1.0 {
            return Err(invalid(format!(
                "population.rarity_exponent must be greater than 1, got {exponent}"
            )));
        }

        let scale = self.population.retention_scale;
        if !scale.is_finite() || scale <= 0.0 {
            return Err(invalid(format!(
                "population.retention_scale must be positive, got {scale}"
            )));
        }

        let intervals = [
            ("cadence.milestone_interval", self.cadence.milestone_interval),
            ("cadence.checkpoint_interval", self.cadence.checkpoint_interval),
            ("cadence.progress_interval", self.cadence.progress_interval),
            ("cadence.estimate_interval", self.cadence.estimate_interval),
        ];
        for (name, value) in intervals {
            if value == 0 {
                return Err(invalid(format!("{name} must be at least 1")));
            }
        }

        if self.logging.event_buffer_capacity == 0 {
            return Err(invalid(
                "logging.event_buffer_capacity must be at least 1".to_owned(),
            ));
        }
        if self.logging.milestone_buffer_capacity == 0 {
            return Err(invalid(
                "logging.milestone_buffer_capacity must be at least 1".to_owned(),
            ));
        }

        Ok(())
    }
}

const fn invalid(reason: String) -> ConfigError {
    ConfigError::Invalid { reason }
}

/// Run identity and storage configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RunConfig {
    /// Run name; selects the checkpoint to resume and names the storage directory.
    #[serde(default = "default_run_name")]
    pub name: String,

    /// Seed for the run's random generator. Ignored when resuming, where
    /// the checkpointed seed and stream position take over.
    #[serde(default = "default_seed")]
    pub seed: u64,

    /// Root directory holding one subdirectory per run plus the run registry.
    #[serde(default = "default_reports_dir")]
    pub reports_dir: PathBuf,

    /// Start over even if a checkpoint exists for this run name.
    #[serde(default)]
    pub fresh: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            name: default_run_name(),
            seed: default_seed(),
            reports_dir: default_reports_dir(),
            fresh: false,
        }
    }
}

/// Population source and weight tuning.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PopulationConfig {
    /// Path to the tabular population source (CSV with a header row).
    #[serde(default = "default_population_source")]
    pub source: PathBuf,

    /// Added to every rank before exponentiation; keeps weights finite for rank 0.
    #[serde(default = "default_stability_constant")]
    pub stability_constant: f64,

    /// How steeply draw weight falls off with rank.
    #[serde(default = "default_rarity_exponent")]
    pub rarity_exponent: f64,

    /// Source retention values are divided by this before use.
    ///
    /// `1.0` for sources that already hold probabilities, `255.0` for
    /// sources holding 0..=255 catch rates.
    #[serde(default = "default_retention_scale")]
    pub retention_scale: f64,
}

impl Default for PopulationConfig {
    fn default() -> Self {
        Self {
            source: default_population_source(),
            stability_constant: default_stability_constant(),
            rarity_exponent: default_rarity_exponent(),
            retention_scale: default_retention_scale(),
        }
    }
}

/// Named special-rate presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RatePreset {
    /// 1 in 4096.
    Standard,
    /// 1 in 1365.3.
    Charm,
    /// 1 in 682.7.
    Masuda,
    /// Charm and Masuda combined, 1 in 512.
    Both,
}

impl RatePreset {
    /// Per-draw special probability of the preset.
    pub fn probability(self) -> f64 {
        match self {
            Self::Standard => 1.0 / 4096.0,
            Self::Charm => 1.0 / 1365.3,
            Self::Masuda => 1.0 / 682.7,
            Self::Both => 1.0 / 512.0,
        }
    }

    /// Lowercase preset name as written in configuration.
    pub const fn label(self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::Charm => "charm",
            Self::Masuda => "masuda",
            Self::Both => "both",
        }
    }
}

/// A special rate given either as a preset name or a literal probability.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SpecialRate {
    /// One of the named presets.
    Preset(RatePreset),
    /// An explicit per-draw probability.
    Probability(f64),
}

impl SpecialRate {
    /// Per-draw special probability.
    pub fn probability(self) -> f64 {
        match self {
            Self::Preset(preset) => preset.probability(),
            Self::Probability(p) => p,
        }
    }

    /// Label stored in checkpoints and the run registry.
    pub fn label(self) -> String {
        match self {
            Self::Preset(preset) => preset.label().to_owned(),
            Self::Probability(p) => format!("custom({p})"),
        }
    }
}

impl Default for SpecialRate {
    fn default() -> Self {
        Self::Preset(RatePreset::Standard)
    }
}

/// Probability model of a single draw.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct EncounterConfig {
    /// Per-draw probability that a draw is special.
    #[serde(default)]
    pub special_rate: SpecialRate,

    /// Retain every special draw regardless of the member's retention rate.
    #[serde(default)]
    pub guaranteed_retention: bool,
}

/// Draw-count intervals.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CadenceConfig {
    /// Emit a milestone record every N draws.
    #[serde(default = "default_milestone_interval")]
    pub milestone_interval: u64,

    /// Flush logs and save a checkpoint every N draws.
    #[serde(default = "default_checkpoint_interval")]
    pub checkpoint_interval: u64,

    /// Report progress every N draws.
    #[serde(default = "default_progress_interval")]
    pub progress_interval: u64,

    /// Refresh the completion estimate every N draws (also refreshed on each new retention).
    #[serde(default = "default_estimate_interval")]
    pub estimate_interval: u64,
}

impl Default for CadenceConfig {
    fn default() -> Self {
        Self {
            milestone_interval: default_milestone_interval(),
            checkpoint_interval: default_checkpoint_interval(),
            progress_interval: default_progress_interval(),
            estimate_interval: default_estimate_interval(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error). `RUST_LOG` wins when set.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Special-event records buffered before an automatic flush.
    #[serde(default = "default_buffer_capacity")]
    pub event_buffer_capacity: usize,

    /// Milestone records buffered before an automatic flush.
    #[serde(default = "default_buffer_capacity")]
    pub milestone_buffer_capacity: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            event_buffer_capacity: default_buffer_capacity(),
            milestone_buffer_capacity: default_buffer_capacity(),
        }
    }
}

// ---------------------------------------------------------------------------
// Default value functions (serde default requires named functions)
// ---------------------------------------------------------------------------

fn default_run_name() -> String {
    "baseline".to_owned()
}

const fn default_seed() -> u64 {
    42
}

fn default_reports_dir() -> PathBuf {
    PathBuf::from("reports")
}

fn default_population_source() -> PathBuf {
    PathBuf::from("population.csv")
}

const fn default_stability_constant() -> f64 {
    100.0
}

const fn default_rarity_exponent() -> f64 {
    1.8
}

const fn default_retention_scale() -> f64 {
    1.0
}

const fn default_milestone_interval() -> u64 {
    5_000
}

const fn default_checkpoint_interval() -> u64 {
    25_000_000
}

const fn default_progress_interval() -> u64 {
    100_000
}

const fn default_estimate_interval() -> u64 {
    1_000_000
}

fn default_log_level() -> String {
    "info".to_owned()
}

const fn default_buffer_capacity() -> usize {
    1_000
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = SimulationConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.run.name, "baseline");
        assert_eq!(config.cadence.milestone_interval, 5_000);
        assert_eq!(config.cadence.checkpoint_interval, 25_000_000);
        assert_eq!(config.encounter.special_rate.probability(), 1.0 / 4096.0);
        assert!(!config.encounter.guaranteed_retention);
    }

    #[test]
    fn parse_full_yaml() {
        let yaml = r#"
run:
  name: "charm-guaranteed"
  seed: 7
  reports_dir: "out"
  fresh: true
population:
  source: "data/pokedex.csv"
  stability_constant: 50
  rarity_exponent: 2.5
  retention_scale: 255
encounter:
  special_rate: charm
  guaranteed_retention: true
cadence:
  milestone_interval: 10
  checkpoint_interval: 1000
  progress_interval: 100
  estimate_interval: 500
logging:
  level: "debug"
  event_buffer_capacity: 16
  milestone_buffer_capacity: 4
"#;
        let config = SimulationConfig::parse(yaml).unwrap();
        assert_eq!(config.run.name, "charm-guaranteed");
        assert_eq!(config.run.seed, 7);
        assert!(config.run.fresh);
        assert_eq!(config.population.source, PathBuf::from("data/pokedex.csv"));
        assert_eq!(config.population.retention_scale, 255.0);
        assert_eq!(
            config.encounter.special_rate,
            SpecialRate::Preset(RatePreset::Charm)
        );
        assert!(config.encounter.guaranteed_retention);
        assert_eq!(config.cadence.milestone_interval, 10);
        assert_eq!(config.logging.event_buffer_capacity, 16);
        assert_eq!(config.logging.milestone_buffer_capacity, 4);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn special_rate_accepts_literal_probability() {
        let config = SimulationConfig::parse("encounter:\n  special_rate: 0.25\n").unwrap();
        assert_eq!(config.encounter.special_rate, SpecialRate::Probability(0.25));
        assert_eq!(config.encounter.special_rate.label(), "custom(0.25)");
    }

    #[test]
    fn parse_minimal_yaml() {
        let config = SimulationConfig::parse("run:\n  seed: 9\n").unwrap();
        assert_eq!(config.run.seed, 9);
        assert_eq!(config.run.name, "baseline");
        assert_eq!(config.cadence.progress_interval, 100_000);
    }

    #[test]
    fn parse_empty_yaml() {
        assert!(SimulationConfig::parse("").is_ok());
    }

    #[test]
    fn rejects_zero_special_rate() {
        let config = SimulationConfig::parse("encounter:\n  special_rate: 0.0\n").unwrap();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { .. })
        ));
    }

    #[test]
    fn rejects_shallow_rarity_exponent() {
        let config = SimulationConfig::parse("population:\n  rarity_exponent: 1.0\n").unwrap();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { .. })
        ));
    }

    #[test]
    fn rejects_zero_interval() {
        let config = SimulationConfig::parse("cadence:\n  checkpoint_interval: 0\n").unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("cadence.checkpoint_interval"));
    }

    #[test]
    fn rejects_bad_run_name() {
        let config = SimulationConfig::parse("run:\n  name: \"a/b\"\n").unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::RunName { .. })));
    }

    #[test]
    fn presets_are_ordered_by_rarity() {
        assert!(RatePreset::Standard.probability() < RatePreset::Charm.probability());
        assert!(RatePreset::Charm.probability() < RatePreset::Masuda.probability());
        assert!(RatePreset::Masuda.probability() < RatePreset::Both.probability());
    }
}
