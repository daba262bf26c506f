use std::time::Duration;

use serde::Deserialize;
use superhelfer_core::Tier;

/// Model served by one tier
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TierConfig {
    /// Backend model identifier (e.g. `llama3.1:70b`)
    pub model: String,
    /// Estimated GPU memory footprint in MiB
    pub footprint_mb: u64,
    /// Upper bound for one inference call
    #[serde(default = "default_timeout", deserialize_with = "crate::duration::deserialize")]
    pub timeout: Duration,
    /// Idle time after which the model is unloaded; zero keeps it loaded
    #[serde(default, deserialize_with = "crate::duration::deserialize")]
    pub idle_unload: Duration,
}

impl TierConfig {
    /// Whether the lifecycle sweep may unload this tier
    pub const fn unloads_when_idle(&self) -> bool {
        !self.idle_unload.is_zero()
    }
}

/// The three tiers, each with its own model
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TiersConfig {
    #[serde(default = "default_fast")]
    pub fast: TierConfig,
    #[serde(default = "default_code")]
    pub code: TierConfig,
    #[serde(default = "default_heavy")]
    pub heavy: TierConfig,
}

impl TiersConfig {
    /// Configuration for a tier
    pub const fn get(&self, tier: Tier) -> &TierConfig {
        match tier {
            Tier::Fast => &self.fast,
            Tier::Code => &self.code,
            Tier::Heavy => &self.heavy,
        }
    }
}

impl Default for TiersConfig {
    fn default() -> Self {
        Self {
            fast: default_fast(),
            code: default_code(),
            heavy: default_heavy(),
        }
    }
}

const fn default_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_fast() -> TierConfig {
    TierConfig {
        model: "llama3.2:3b".to_owned(),
        footprint_mb: 2_000,
        timeout: Duration::from_secs(30),
        idle_unload: Duration::ZERO,
    }
}

fn default_code() -> TierConfig {
    TierConfig {
        model: "qwen3-coder-30b-local".to_owned(),
        footprint_mb: 18_000,
        timeout: Duration::from_secs(30),
        idle_unload: Duration::from_secs(600),
    }
}

fn default_heavy() -> TierConfig {
    TierConfig {
        model: "llama3.1:70b".to_owned(),
        footprint_mb: 42_000,
        timeout: Duration::from_secs(300),
        idle_unload: Duration::from_secs(300),
    }
}
