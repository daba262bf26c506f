//! GPU memory monitoring and the switch confirmation gate

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use superhelfer_config::{MonitorConfig, TierConfig};
use superhelfer_core::{SwitchDecision, Tier};
use thiserror::Error;

use crate::policy::{SwitchPolicy, SwitchRequest};

/// Raw memory reading in MiB
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MemoryReading {
    pub total_mb: u64,
    pub used_mb: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MonitorError {
    /// The reporting interface could not be queried; never fatal
    #[error("resource information unavailable: {0}")]
    ResourceUnavailable(String),
}

/// Source of GPU memory readings
#[async_trait]
pub trait MemoryReporter: Send + Sync {
    async fn query_memory(&self) -> Result<MemoryReading, MonitorError>;
}

/// Reporter returning a fixed reading
#[derive(Debug, Clone, Copy)]
pub struct StaticReporter(pub MemoryReading);

impl StaticReporter {
    pub const fn new(total_mb: u64, used_mb: u64) -> Self {
        Self(MemoryReading { total_mb, used_mb })
    }
}

#[async_trait]
impl MemoryReporter for StaticReporter {
    async fn query_memory(&self) -> Result<MemoryReading, MonitorError> {
        Ok(self.0)
    }
}

/// Memory state at one instant; read fresh for every evaluation
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ResourceSnapshot {
    pub total_mb: u64,
    pub used_mb: u64,
    pub usage_fraction: f64,
}

impl ResourceSnapshot {
    pub fn from_reading(reading: MemoryReading) -> Self {
        let usage_fraction = if reading.total_mb == 0 {
            1.0
        } else {
            (reading.used_mb as f64 / reading.total_mb as f64).clamp(0.0, 1.0)
        };

        Self {
            total_mb: reading.total_mb,
            used_mb: reading.used_mb,
            usage_fraction,
        }
    }
}

/// Memory monitor with a pluggable confirmation policy
pub struct ResourceMonitor {
    reporter: Option<Arc<dyn MemoryReporter>>,
    policy: Arc<dyn SwitchPolicy>,
    warning_threshold: f64,
    confirm_timeout: Duration,
    on_timeout: SwitchDecision,
}

impl ResourceMonitor {
    pub fn new(reporter: Option<Arc<dyn MemoryReporter>>, policy: Arc<dyn SwitchPolicy>, config: &MonitorConfig) -> Self {
        Self {
            reporter,
            policy,
            warning_threshold: config.warning_threshold,
            confirm_timeout: config.confirm_timeout,
            on_timeout: config.on_timeout,
        }
    }

    pub fn has_reporter(&self) -> bool {
        self.reporter.is_some()
    }

    pub fn policy_name(&self) -> &'static str {
        self.policy.name()
    }

    /// Read current memory usage
    pub async fn snapshot(&self) -> Result<ResourceSnapshot, MonitorError> {
        let reporter = self
            .reporter
            .as_ref()
            .ok_or_else(|| MonitorError::ResourceUnavailable("no memory reporter configured".to_owned()))?;

        reporter.query_memory().await.map(ResourceSnapshot::from_reading)
    }

    /// Decide whether loading `tier` may proceed
    ///
    /// Without memory pressure the policy is not consulted. When the
    /// snapshot cannot be taken the gate is skipped.
    pub async fn confirm_switch(&self, tier: Tier, target: &TierConfig) -> SwitchDecision {
        let snapshot = match self.snapshot().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::debug!(%tier, error = %e, "skipping switch confirmation");
                return SwitchDecision::Proceed;
            }
        };

        let projected_used_mb = snapshot.used_mb.saturating_add(target.footprint_mb);
        let exceeds_capacity = projected_used_mb > snapshot.total_mb;
        let under_pressure = snapshot.usage_fraction > self.warning_threshold;

        if !under_pressure && !exceeds_capacity {
            return SwitchDecision::Proceed;
        }

        let request = SwitchRequest {
            tier,
            model: target.model.clone(),
            footprint_mb: target.footprint_mb,
            snapshot,
            projected_used_mb,
            projected_fraction: if snapshot.total_mb == 0 {
                f64::INFINITY
            } else {
                projected_used_mb as f64 / snapshot.total_mb as f64
            },
            exceeds_capacity,
        };

        tracing::warn!(
            %tier,
            model = %request.model,
            usage = snapshot.usage_fraction,
            projected = request.projected_fraction,
            policy = self.policy.name(),
            "tier switch under memory pressure, asking for confirmation"
        );

        let decision = match tokio::time::timeout(self.confirm_timeout, self.policy.decide(&request)).await {
            Ok(decision) => decision,
            Err(_) => {
                tracing::warn!(
                    %tier,
                    timeout = ?self.confirm_timeout,
                    decision = %self.on_timeout,
                    "switch confirmation timed out, applying default"
                );
                self.on_timeout
            }
        };

        tracing::info!(%tier, %decision, "switch confirmation resolved");
        decision
    }
}
