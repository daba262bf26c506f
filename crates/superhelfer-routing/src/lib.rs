//! Tier routing for superhelfer
//!
//! Classifies a query into one of three model tiers, gates expensive tier
//! switches on GPU memory pressure, and falls back to cheaper tiers when an
//! inference call times out or the backend is unavailable:
//! - **Analysis**: pattern-based signals and a priority-ordered rule engine
//! - **Monitor**: memory snapshots and the switch confirmation gate
//! - **Registry**: per-tier usage atomics and the idle-unload sweep
//! - **Router**: decision, gate and execution with single-step fallback

#![allow(clippy::must_use_candidate, clippy::missing_errors_doc, clippy::cast_precision_loss)]

pub mod analysis;
pub mod backend;
mod clock;
pub mod error;
pub mod feedback;
pub mod lifecycle;
mod metrics;
pub mod monitor;
mod patterns;
pub mod policy;
pub mod registry;
pub mod router;
pub mod rules;
pub mod session;
#[cfg(test)]
mod testing;

use serde::Serialize;
use superhelfer_config::TiersConfig;
pub use superhelfer_core::{SwitchDecision, Tier};

pub use analysis::{AnalysisFlags, QueryAnalysis, QueryAnalyzer};
pub use backend::{InferenceBackend, InferenceError};
pub use error::{AttemptFailure, RoutingError};
pub use feedback::{TierFeedback, TierFeedbackSnapshot};
pub use lifecycle::LifecycleManager;
pub use monitor::{MemoryReading, MemoryReporter, MonitorError, ResourceMonitor, ResourceSnapshot, StaticReporter};
pub use policy::{SwitchPolicy, SwitchRequest};
pub use registry::{TierRegistry, TierStatus};
pub use router::{Response, RouteState, Router};
pub use session::{SessionStats, SessionStore, Turn};

/// Why a tier was selected
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, strum::Display, strum::IntoStaticStr, strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ReasonCode {
    /// No alphanumeric content
    FastDegenerate,
    /// "Which command shows ..." style question
    FastBasicCommand,
    /// High complexity combined with a calculation verb
    HeavyHighComplexityVerb,
    /// Mathematical signals outweigh technical ones
    HeavyWinRelaxed,
    /// Technical or programming signals
    CodeTech,
    /// Nothing matched
    FastDefault,
    /// Short follow-up inheriting the previous turn's tier
    SessionFollowUp,
    /// Tier chosen by the caller
    Forced,
    /// The confirmation gate refused the switch
    SwitchAborted,
    /// The costlier tier timed out
    TimeoutFallback,
    /// The costlier tier's backend call failed
    UnavailableFallback,
}

/// Why a request moved to a cheaper tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, strum::Display, strum::IntoStaticStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FallbackCause {
    Timeout,
    Unavailable,
    SwitchAborted,
}

impl FallbackCause {
    pub const fn reason(self) -> ReasonCode {
        match self {
            Self::Timeout => ReasonCode::TimeoutFallback,
            Self::Unavailable => ReasonCode::UnavailableFallback,
            Self::SwitchAborted => ReasonCode::SwitchAborted,
        }
    }
}

/// Analyzer scores carried into a decision
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct RouteScores {
    pub heavy_score: f64,
    pub tech_score: f64,
    pub complexity_score: f64,
}

/// Outcome of routing one query; immutable once produced
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoutingDecision {
    pub tier: Tier,
    /// Backend model serving the tier
    pub model: String,
    pub reason: ReasonCode,
    /// Tier this decision fell back from, if any
    pub fallback_from: Option<Tier>,
    /// Informational; the tier's configured footprint in MiB
    pub cost_estimate_mb: u64,
    pub scores: RouteScores,
}

impl RoutingDecision {
    /// Decision for `tier` with the given reason
    pub fn for_tier(tier: Tier, reason: ReasonCode, scores: RouteScores, tiers: &TiersConfig) -> Self {
        let config = tiers.get(tier);
        Self {
            tier,
            model: config.model.clone(),
            reason,
            fallback_from: None,
            cost_estimate_mb: config.footprint_mb,
            scores,
        }
    }

    /// The same request one tier cheaper, or `None` on the floor tier
    pub fn fall_back(&self, cause: FallbackCause, tiers: &TiersConfig) -> Option<Self> {
        let cheaper = self.tier.cheaper()?;
        let mut next = Self::for_tier(cheaper, cause.reason(), self.scores, tiers);
        next.fallback_from = Some(self.tier);
        Some(next)
    }

    pub const fn is_fallback(&self) -> bool {
        self.fallback_from.is_some()
    }
}

/// Pure decision for an analysis: the analyzer's recommended tier
pub fn decide(analysis: &QueryAnalysis, tiers: &TiersConfig) -> RoutingDecision {
    RoutingDecision::for_tier(analysis.tier, analysis.reason_code, analysis.scores(), tiers)
}
