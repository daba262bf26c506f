//! Runtime feedback per tier
//!
//! Records latency and failure counts of inference attempts. Sliding
//! window for latency percentiles. In-memory only.

use std::collections::VecDeque;
use std::time::Duration;

use dashmap::DashMap;
use serde::Serialize;
use superhelfer_core::Tier;

/// Maximum samples to retain per tier in the sliding window
const MAX_SAMPLES: usize = 1000;

#[derive(Debug, Default)]
struct TierSamples {
    latencies_ms: VecDeque<f64>,
    requests: u64,
    failures: u64,
    timeouts: u64,
}

/// Outcome of one inference attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOutcome {
    Success,
    Timeout,
    Failure,
}

/// Track observed performance of each tier
#[derive(Debug, Default)]
pub struct TierFeedback {
    tiers: DashMap<Tier, TierSamples>,
}

impl TierFeedback {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, tier: Tier, latency: Duration, outcome: AttemptOutcome) {
        let mut entry = self.tiers.entry(tier).or_default();
        entry.requests += 1;

        match outcome {
            AttemptOutcome::Success => {
                if entry.latencies_ms.len() >= MAX_SAMPLES {
                    entry.latencies_ms.pop_front();
                }
                entry.latencies_ms.push_back(latency.as_secs_f64() * 1000.0);
            }
            AttemptOutcome::Timeout => {
                entry.failures += 1;
                entry.timeouts += 1;
            }
            AttemptOutcome::Failure => entry.failures += 1,
        }
    }

    pub fn snapshot(&self, tier: Tier) -> TierFeedbackSnapshot {
        let Some(entry) = self.tiers.get(&tier) else {
            return TierFeedbackSnapshot::default();
        };

        let mut sorted: Vec<f64> = entry.latencies_ms.iter().copied().collect();
        let (requests, failures, timeouts) = (entry.requests, entry.failures, entry.timeouts);
        drop(entry);

        sorted.sort_by(f64::total_cmp);

        TierFeedbackSnapshot {
            requests,
            failures,
            timeouts,
            error_rate: (requests > 0).then(|| failures as f64 / requests as f64),
            latency_p50_ms: percentile(&sorted, 0.50),
            latency_p95_ms: percentile(&sorted, 0.95),
        }
    }
}

/// Observed performance of one tier
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TierFeedbackSnapshot {
    pub requests: u64,
    pub failures: u64,
    pub timeouts: u64,
    /// Fraction of attempts that failed (0.0 to 1.0)
    pub error_rate: Option<f64>,
    pub latency_p50_ms: Option<f64>,
    pub latency_p95_ms: Option<f64>,
}

/// Percentile of sorted values
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn percentile(sorted: &[f64], p: f64) -> Option<f64> {
    let last = sorted.len().checked_sub(1)?;
    let idx = (p * last as f64).round() as usize;
    sorted.get(idx.min(last)).copied()
}
