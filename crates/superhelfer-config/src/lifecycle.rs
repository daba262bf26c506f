use std::time::Duration;

use serde::Deserialize;

/// Background unloading of idle tiers
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LifecycleConfig {
    #[serde(default = "default_sweep_interval", deserialize_with = "crate::duration::deserialize")]
    pub sweep_interval: Duration,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            sweep_interval: default_sweep_interval(),
        }
    }
}

const fn default_sweep_interval() -> Duration {
    Duration::from_secs(60)
}
