//! Balancer configuration
//!
//! Configuration is an explicit value handed to the balancer. It can be
//! built in code, loaded from a TOML file or read from environment variables.
//!
//! Example `balancer.toml`:
//! ```toml
//! region_count_skew_cost = 500.0
//! table_skew_cost = 35.0
//! max_steps = 1000000
//! max_run_time_ms = 30000
//! ```

use regionbalancer_core::BalancerError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Configuration loading errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),

    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error(transparent)]
    Invalid(#[from] BalancerError),
}

/// Stochastic balancer configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BalancerConfig {
    /// Weight of the per-server region count skew (0 disables)
    pub region_count_skew_cost: f64,

    /// Weight of the per-table region count skew (0 disables)
    pub table_skew_cost: f64,

    /// Weight of the number of regions moved (0 disables)
    pub move_cost: f64,

    /// Weight of the per-server store file size dispersion (0 disables)
    pub store_file_cost: f64,

    /// Hard ceiling on search steps
    pub max_steps: u64,

    /// Steps granted per region per server before the ceiling applies
    pub steps_per_region: u64,

    /// Wall-clock budget for one run in milliseconds
    pub max_run_time_ms: u64,

    /// Minimum drop in total cost required to emit a plan
    pub min_cost_improvement: f64,

    /// Annealing temperature at the first step
    pub initial_temperature: f64,

    /// Annealing temperature reached at the last step
    pub final_temperature: f64,

    /// Fraction of regions a single run may move
    pub max_moves_percent: f64,

    /// Lower bound on the move cap regardless of cluster size
    pub min_max_moves: u64,

    /// Scheduling hint: moves per destination server in one wave
    pub max_moves_per_server: usize,

    /// Relative weight of the random region move generator
    pub random_move_weight: u32,

    /// Relative weight of the random region swap generator
    pub random_swap_weight: u32,

    /// Relative weight of the most-loaded to least-loaded move generator
    pub load_move_weight: u32,

    /// Seed for the random source; entropy when unset
    pub seed: Option<u64>,
}

impl Default for BalancerConfig {
    fn default() -> Self {
        Self {
            region_count_skew_cost: 500.0,
            table_skew_cost: 35.0,
            move_cost: 7.0,
            store_file_cost: 5.0,
            max_steps: 1_000_000,
            steps_per_region: 800,
            max_run_time_ms: 30_000,
            min_cost_improvement: 0.01,
            initial_temperature: 1.0,
            final_temperature: 0.0001,
            max_moves_percent: 0.25,
            min_max_moves: 600,
            max_moves_per_server: 4,
            random_move_weight: 1,
            random_swap_weight: 1,
            load_move_weight: 1,
            seed: None,
        }
    }
}

impl BalancerConfig {
    /// Create configuration from environment variables, falling back to defaults
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let config = Self {
            region_count_skew_cost: env_or("BALANCER_REGION_COUNT_COST", defaults.region_count_skew_cost)?,
            table_skew_cost: env_or("BALANCER_TABLE_SKEW_COST", defaults.table_skew_cost)?,
            move_cost: env_or("BALANCER_MOVE_COST", defaults.move_cost)?,
            store_file_cost: env_or("BALANCER_STORE_FILE_COST", defaults.store_file_cost)?,
            max_steps: env_or("BALANCER_MAX_STEPS", defaults.max_steps)?,
            steps_per_region: env_or("BALANCER_STEPS_PER_REGION", defaults.steps_per_region)?,
            max_run_time_ms: env_or("BALANCER_MAX_RUN_TIME_MS", defaults.max_run_time_ms)?,
            min_cost_improvement: env_or(
                "BALANCER_MIN_COST_IMPROVEMENT",
                defaults.min_cost_improvement,
            )?,
            initial_temperature: env_or(
                "BALANCER_INITIAL_TEMPERATURE",
                defaults.initial_temperature,
            )?,
            final_temperature: env_or("BALANCER_FINAL_TEMPERATURE", defaults.final_temperature)?,
            max_moves_percent: env_or("BALANCER_MAX_MOVES_PERCENT", defaults.max_moves_percent)?,
            min_max_moves: env_or("BALANCER_MIN_MAX_MOVES", defaults.min_max_moves)?,
            max_moves_per_server: env_or(
                "BALANCER_MAX_MOVES_PER_SERVER",
                defaults.max_moves_per_server,
            )?,
            random_move_weight: env_or(
                "BALANCER_RANDOM_MOVE_PICKER_WEIGHT",
                defaults.random_move_weight,
            )?,
            random_swap_weight: env_or(
                "BALANCER_RANDOM_SWAP_PICKER_WEIGHT",
                defaults.random_swap_weight,
            )?,
            load_move_weight: env_or("BALANCER_LOAD_MOVE_PICKER_WEIGHT", defaults.load_move_weight)?,
            seed: match std::env::var("BALANCER_SEED") {
                Ok(v) => Some(v.parse().map_err(|_| {
                    ConfigError::InvalidValue("BALANCER_SEED".to_string(), v.clone())
                })?),
                Err(_) => None,
            },
        };

        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from TOML; missing keys take their defaults
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Reject configurations the optimizer cannot run with
    pub fn validate(&self) -> regionbalancer_core::Result<()> {
        let weights = [
            ("region_count_skew_cost", self.region_count_skew_cost),
            ("table_skew_cost", self.table_skew_cost),
            ("move_cost", self.move_cost),
            ("store_file_cost", self.store_file_cost),
        ];
        for (name, weight) in weights {
            if !weight.is_finite() || weight < 0.0 {
                return Err(invalid(format!("{} must be a finite non-negative weight", name)));
            }
        }

        if self.max_steps == 0 {
            return Err(invalid("max_steps must be positive".to_string()));
        }
        if !self.min_cost_improvement.is_finite() || self.min_cost_improvement < 0.0 {
            return Err(invalid("min_cost_improvement must be non-negative".to_string()));
        }
        if !self.initial_temperature.is_finite()
            || !self.final_temperature.is_finite()
            || self.final_temperature < 0.0
            || self.final_temperature > self.initial_temperature
        {
            return Err(invalid(format!(
                "temperatures must satisfy 0 <= final ({}) <= initial ({})",
                self.final_temperature, self.initial_temperature
            )));
        }
        if !(0.0..=1.0).contains(&self.max_moves_percent) {
            return Err(invalid("max_moves_percent must be within [0, 1]".to_string()));
        }
        if self.max_moves_per_server == 0 {
            return Err(invalid("max_moves_per_server must be positive".to_string()));
        }
        if self.random_move_weight == 0 && self.random_swap_weight == 0 && self.load_move_weight == 0
        {
            return Err(invalid("at least one action generator needs a weight".to_string()));
        }

        Ok(())
    }

    /// Get the run budget as Duration
    pub fn max_run_time(&self) -> Duration {
        Duration::from_millis(self.max_run_time_ms)
    }

    /// Step budget for a cluster of the given shape
    pub fn step_budget(&self, total_regions: usize, server_count: usize) -> u64 {
        let scaled = (total_regions as u64)
            .saturating_mul(self.steps_per_region)
            .saturating_mul(server_count as u64);
        scaled.min(self.max_steps)
    }

    /// Most regions a single run may leave away from their initial server
    pub fn move_cap(&self, total_regions: usize) -> usize {
        let by_percent = (total_regions as f64 * self.max_moves_percent).ceil() as u64;
        by_percent.max(self.min_max_moves) as usize
    }
}

fn invalid(msg: String) -> BalancerError {
    BalancerError::InvalidConfig(msg)
}

fn env_or<T: FromStr>(key: &str, default: T) -> Result<T, ConfigError> {
    match std::env::var(key) {
        Ok(v) => v
            .parse()
            .map_err(|_| ConfigError::InvalidValue(key.to_string(), v)),
        Err(_) => Ok(default),
    }
}
