//! Tier registry with per-tier usage state
//!
//! Configuration is read-only after startup. Usage state lives in atomics
//! so live routing never takes a lock.

use std::sync::atomic::{AtomicBool, AtomicU8, AtomicU64, Ordering};
use std::time::Duration;

use serde::Serialize;
use superhelfer_config::{TierConfig, TiersConfig};
use superhelfer_core::Tier;

use crate::clock::now_millis;

/// Sentinel for "no tier used yet"
const NO_TIER: u8 = u8::MAX;

#[derive(Debug, Default)]
struct TierState {
    /// Unix millis of the last successful inference; 0 = never
    last_used_ms: AtomicU64,
    loaded: AtomicBool,
}

/// Per-tier configuration and usage state
#[derive(Debug)]
pub struct TierRegistry {
    configs: TiersConfig,
    states: [TierState; 3],
    current: AtomicU8,
}

/// Point-in-time view of one tier
#[derive(Debug, Clone, Serialize)]
pub struct TierStatus {
    pub tier: Tier,
    pub model: String,
    pub footprint_mb: u64,
    pub loaded: bool,
    /// Seconds since the last successful inference while loaded
    pub idle_secs: Option<u64>,
    pub idle_unload_secs: u64,
}

impl TierRegistry {
    pub fn new(configs: TiersConfig) -> Self {
        Self {
            configs,
            states: Default::default(),
            current: AtomicU8::new(NO_TIER),
        }
    }

    pub const fn configs(&self) -> &TiersConfig {
        &self.configs
    }

    pub const fn config(&self, tier: Tier) -> &TierConfig {
        self.configs.get(tier)
    }

    fn state(&self, tier: Tier) -> &TierState {
        &self.states[tier.index()]
    }

    /// Most recently used tier, while it is still loaded
    pub fn current(&self) -> Option<Tier> {
        let index = self.current.load(Ordering::Acquire);
        Tier::ALL.get(usize::from(index)).copied()
    }

    pub fn is_loaded(&self, tier: Tier) -> bool {
        self.state(tier).loaded.load(Ordering::Acquire)
    }

    /// Record a successful inference on `tier`
    pub fn mark_used(&self, tier: Tier) {
        self.mark_used_at(tier, now_millis());
    }

    pub(crate) fn mark_used_at(&self, tier: Tier, now_ms: u64) {
        let state = self.state(tier);
        state.last_used_ms.store(now_ms, Ordering::Release);
        state.loaded.store(true, Ordering::Release);

        let index = u8::try_from(tier.index()).unwrap_or(NO_TIER);
        let previous = self.current.swap(index, Ordering::AcqRel);
        if previous != index {
            tracing::debug!(%tier, "current tier changed");
        }
    }

    /// Record that the backend released `tier`
    ///
    /// Skipped when the tier was used again after `observed_last_used`, so a
    /// sweep racing a live request does not hide a freshly loaded model.
    /// An unloaded tier stops being current.
    pub(crate) fn mark_unloaded(&self, tier: Tier, observed_last_used: u64) -> bool {
        let state = self.state(tier);
        if state.last_used_ms.load(Ordering::Acquire) != observed_last_used {
            return false;
        }

        state.loaded.store(false, Ordering::Release);

        let index = u8::try_from(tier.index()).unwrap_or(NO_TIER);
        if self
            .current
            .compare_exchange(index, NO_TIER, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            tracing::debug!(%tier, "current tier unloaded");
        }
        true
    }

    pub(crate) fn last_used_ms(&self, tier: Tier) -> u64 {
        self.state(tier).last_used_ms.load(Ordering::Acquire)
    }

    /// Idle time of a loaded tier at `now_ms`
    pub fn idle_for(&self, tier: Tier, now_ms: u64) -> Option<Duration> {
        if !self.is_loaded(tier) {
            return None;
        }

        let last = self.last_used_ms(tier);
        Some(Duration::from_millis(now_ms.saturating_sub(last)))
    }

    /// Loaded tiers idle for longer than their unload interval
    pub fn idle_candidates(&self, now_ms: u64) -> Vec<Tier> {
        Tier::ALL
            .into_iter()
            .filter(|&tier| {
                let config = self.config(tier);
                config.unloads_when_idle()
                    && self
                        .idle_for(tier, now_ms)
                        .is_some_and(|idle| idle > config.idle_unload)
            })
            .collect()
    }

    pub fn status(&self) -> Vec<TierStatus> {
        let now_ms = now_millis();

        Tier::ALL
            .into_iter()
            .map(|tier| {
                let config = self.config(tier);
                TierStatus {
                    tier,
                    model: config.model.clone(),
                    footprint_mb: config.footprint_mb,
                    loaded: self.is_loaded(tier),
                    idle_secs: self.idle_for(tier, now_ms).map(|d| d.as_secs()),
                    idle_unload_secs: config.idle_unload.as_secs(),
                }
            })
            .collect()
    }
}
