use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;
use superhelfer_core::Tier;

/// Offline routing calibration
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CalibrationConfig {
    /// Run the loop alongside `serve`
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_interval", deserialize_with = "crate::duration::deserialize")]
    pub interval: Duration,
    /// Queries per cycle
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Share of each batch drawn from the hard negative bank
    #[serde(default = "default_hard_negative_fraction")]
    pub hard_negative_fraction: f64,
    /// Directory for cycle files, the rolling summary and the bank
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    /// Cycles kept in the rolling summary
    #[serde(default = "default_rolling_window")]
    pub rolling_window: usize,
    /// Fixed RNG seed for reproducible batches
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default)]
    pub costs: CostMatrixConfig,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval: default_interval(),
            batch_size: default_batch_size(),
            hard_negative_fraction: default_hard_negative_fraction(),
            output_dir: default_output_dir(),
            rolling_window: default_rolling_window(),
            seed: None,
            costs: CostMatrixConfig::default(),
        }
    }
}

/// Penalty for routing a query expected on one tier to another
///
/// Field names read as `<expected>_as_<actual>`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CostMatrixConfig {
    pub heavy_as_code: f64,
    pub heavy_as_fast: f64,
    pub code_as_fast: f64,
    pub code_as_heavy: f64,
    pub fast_as_code: f64,
    pub fast_as_heavy: f64,
}

impl CostMatrixConfig {
    /// Cost of routing `expected` to `actual`; zero on the diagonal
    pub const fn cost(&self, expected: Tier, actual: Tier) -> f64 {
        match (expected, actual) {
            (Tier::Heavy, Tier::Code) => self.heavy_as_code,
            (Tier::Heavy, Tier::Fast) => self.heavy_as_fast,
            (Tier::Code, Tier::Fast) => self.code_as_fast,
            (Tier::Code, Tier::Heavy) => self.code_as_heavy,
            (Tier::Fast, Tier::Code) => self.fast_as_code,
            (Tier::Fast, Tier::Heavy) => self.fast_as_heavy,
            (Tier::Fast, Tier::Fast) | (Tier::Code, Tier::Code) | (Tier::Heavy, Tier::Heavy) => 0.0,
        }
    }

    pub(crate) const fn entries(&self) -> [(&'static str, f64); 6] {
        [
            ("heavy_as_code", self.heavy_as_code),
            ("heavy_as_fast", self.heavy_as_fast),
            ("code_as_fast", self.code_as_fast),
            ("code_as_heavy", self.code_as_heavy),
            ("fast_as_code", self.fast_as_code),
            ("fast_as_heavy", self.fast_as_heavy),
        ]
    }
}

impl Default for CostMatrixConfig {
    fn default() -> Self {
        Self {
            heavy_as_code: 2.0,
            heavy_as_fast: 3.0,
            code_as_fast: 1.0,
            code_as_heavy: 0.5,
            fast_as_code: 0.5,
            fast_as_heavy: 1.0,
        }
    }
}

const fn default_interval() -> Duration {
    Duration::from_secs(300)
}

const fn default_batch_size() -> usize {
    100
}

const fn default_hard_negative_fraction() -> f64 {
    1.0 / 3.0
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("calibration")
}

const fn default_rolling_window() -> usize {
    10
}
