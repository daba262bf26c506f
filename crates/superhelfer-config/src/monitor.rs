use std::time::Duration;

use serde::Deserialize;
use superhelfer_core::SwitchDecision;

/// GPU memory monitoring and the switch confirmation gate
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MonitorConfig {
    /// Where memory readings come from
    #[serde(default)]
    pub reporter: ReporterConfig,
    /// Usage fraction above which a switch needs confirmation
    #[serde(default = "default_warning_threshold")]
    pub warning_threshold: f64,
    /// How long to wait for a confirmation decision
    #[serde(default = "default_confirm_timeout", deserialize_with = "crate::duration::deserialize")]
    pub confirm_timeout: Duration,
    /// Decision applied when the confirmation wait expires
    #[serde(default = "default_on_timeout")]
    pub on_timeout: SwitchDecision,
    /// Who decides risky switches
    #[serde(default)]
    pub policy: PolicyKind,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            reporter: ReporterConfig::default(),
            warning_threshold: default_warning_threshold(),
            confirm_timeout: default_confirm_timeout(),
            on_timeout: default_on_timeout(),
            policy: PolicyKind::default(),
        }
    }
}

/// Memory reporting source
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReporterConfig {
    /// No reporter; the confirmation gate is skipped
    #[default]
    None,
    /// Poll `nvidia-smi`
    NvidiaSmi {
        #[serde(default = "default_nvidia_smi")]
        command: String,
    },
    /// Fixed reading, for headless setups and tests
    Static { total_mb: u64, used_mb: u64 },
}

/// Confirmation policy for risky switches
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyKind {
    /// Always load the requested tier
    Proceed,
    /// Never load a tier while memory is under pressure
    Abort,
    /// Abort only when the tier would not fit into total memory
    #[default]
    Capacity,
    /// Ask on the terminal (interactive CLI only)
    Prompt,
}

const fn default_warning_threshold() -> f64 {
    0.8
}

const fn default_confirm_timeout() -> Duration {
    Duration::from_secs(30)
}

const fn default_on_timeout() -> SwitchDecision {
    SwitchDecision::Abort
}

fn default_nvidia_smi() -> String {
    "nvidia-smi".to_owned()
}
