//! Tier selection, switch gating and execution with fallback
//!
//! ```text
//! Analyzing -> Selecting -> (ConfirmingSwitch)? -> Executing
//!     -> Succeeded | FallingBack -> Executing | Failed
//! ```

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use superhelfer_config::TierConfig;
use superhelfer_core::{SwitchDecision, Tier};
use tokio_util::sync::CancellationToken;

use crate::backend::{InferenceBackend, InferenceError};
use crate::error::{AttemptFailure, RoutingError};
use crate::feedback::{AttemptOutcome, TierFeedback};
use crate::metrics::RoutingMetrics;
use crate::monitor::ResourceMonitor;
use crate::registry::TierRegistry;
use crate::{FallbackCause, QueryAnalysis, ReasonCode, RoutingDecision};

/// Inference attempts per request: the selected tier plus one fallback
const MAX_ATTEMPTS: usize = 2;

/// Request lifecycle states, traced at debug level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RouteState {
    Analyzing,
    Selecting,
    ConfirmingSwitch,
    Executing,
    FallingBack,
    Succeeded,
    Failed,
}

/// Successful inference
#[derive(Debug, Clone, Serialize)]
pub struct Response {
    pub text: String,
    /// Decision of the attempt that answered
    pub decision: RoutingDecision,
    /// Attempts that failed before it
    pub failures: Vec<AttemptFailure>,
    pub latency: Duration,
    /// Execution states in order
    pub states: Vec<RouteState>,
}

fn enter(states: &mut Vec<RouteState>, state: RouteState, tier: Tier) {
    tracing::debug!(%tier, %state, "route state transition");
    states.push(state);
}

/// Routes analyzed queries to tiers and runs them on the backend
pub struct Router {
    registry: Arc<TierRegistry>,
    monitor: Arc<ResourceMonitor>,
    backend: Arc<dyn InferenceBackend>,
    feedback: Arc<TierFeedback>,
    metrics: RoutingMetrics,
}

impl Router {
    pub fn new(registry: Arc<TierRegistry>, monitor: Arc<ResourceMonitor>, backend: Arc<dyn InferenceBackend>) -> Self {
        Self {
            registry,
            monitor,
            backend,
            feedback: Arc::new(TierFeedback::new()),
            metrics: RoutingMetrics::new(),
        }
    }

    pub const fn registry(&self) -> &Arc<TierRegistry> {
        &self.registry
    }

    pub const fn monitor(&self) -> &Arc<ResourceMonitor> {
        &self.monitor
    }

    pub const fn feedback(&self) -> &Arc<TierFeedback> {
        &self.feedback
    }

    pub fn backend(&self) -> &Arc<dyn InferenceBackend> {
        &self.backend
    }

    /// The analyzer's recommendation, without gating or side effects
    pub fn decide(&self, analysis: &QueryAnalysis) -> RoutingDecision {
        crate::decide(analysis, self.registry.configs())
    }

    /// Select a tier for `analysis` and pass it through the switch gate
    pub async fn route(
        &self,
        analysis: &QueryAnalysis,
        cancel: &CancellationToken,
    ) -> Result<RoutingDecision, RoutingError> {
        tracing::debug!(state = %RouteState::Selecting, tokens = analysis.token_count, "route state transition");
        self.gate(self.decide(analysis), cancel).await
    }

    /// Use `tier` regardless of the analysis; still gated
    pub async fn route_forced(
        &self,
        tier: Tier,
        analysis: &QueryAnalysis,
        cancel: &CancellationToken,
    ) -> Result<RoutingDecision, RoutingError> {
        self.route_pinned(tier, ReasonCode::Forced, analysis, cancel).await
    }

    /// Keep the session's previous tier for a short follow-up; still gated
    pub async fn route_follow_up(
        &self,
        tier: Tier,
        analysis: &QueryAnalysis,
        cancel: &CancellationToken,
    ) -> Result<RoutingDecision, RoutingError> {
        self.route_pinned(tier, ReasonCode::SessionFollowUp, analysis, cancel).await
    }

    async fn route_pinned(
        &self,
        tier: Tier,
        reason: ReasonCode,
        analysis: &QueryAnalysis,
        cancel: &CancellationToken,
    ) -> Result<RoutingDecision, RoutingError> {
        let decision = RoutingDecision::for_tier(tier, reason, analysis.scores(), self.registry.configs());
        self.gate(decision, cancel).await
    }

    /// Confirm a switch to an unloaded costlier tier
    ///
    /// An abort moves the decision exactly one tier down without asking
    /// again.
    pub async fn gate(
        &self,
        decision: RoutingDecision,
        cancel: &CancellationToken,
    ) -> Result<RoutingDecision, RoutingError> {
        let tier = decision.tier;

        let decision = if self.needs_confirmation(tier) {
            tracing::debug!(%tier, state = %RouteState::ConfirmingSwitch, "route state transition");

            let verdict = tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    tracing::debug!(%tier, "request cancelled during switch confirmation");
                    return Err(RoutingError::Cancelled);
                }
                verdict = self.monitor.confirm_switch(tier, self.registry.config(tier)) => verdict,
            };

            match verdict {
                SwitchDecision::Proceed => decision,
                SwitchDecision::Abort => match decision.fall_back(FallbackCause::SwitchAborted, self.registry.configs()) {
                    Some(fallback) => {
                        tracing::warn!(
                            from = %tier,
                            to = %fallback.tier,
                            cause = %FallbackCause::SwitchAborted,
                            "tier switch aborted, falling back"
                        );
                        self.metrics.fallback(tier, fallback.tier, FallbackCause::SwitchAborted);
                        fallback
                    }
                    None => decision,
                },
            }
        } else {
            decision
        };

        tracing::info!(
            tier = %decision.tier,
            model = %decision.model,
            reason = %decision.reason,
            heavy_score = decision.scores.heavy_score,
            tech_score = decision.scores.tech_score,
            complexity_score = decision.scores.complexity_score,
            fallback_from = ?decision.fallback_from,
            "routing decision made"
        );
        self.metrics.decision(&decision);

        Ok(decision)
    }

    /// Only loading a tier above the floor needs confirmation
    fn needs_confirmation(&self, tier: Tier) -> bool {
        tier.cheaper().is_some() && !self.registry.is_loaded(tier)
    }

    /// Run `prompt` on the decided tier, falling back once on failure
    pub async fn execute(
        &self,
        decision: RoutingDecision,
        prompt: &str,
        cancel: &CancellationToken,
    ) -> Result<Response, RoutingError> {
        let started = Instant::now();
        let mut states = Vec::new();
        let mut failures: Vec<AttemptFailure> = Vec::new();
        let mut current = decision;

        loop {
            let tier = current.tier;
            enter(&mut states, RouteState::Executing, tier);

            let config = self.registry.config(tier);
            let attempt_started = Instant::now();

            let result = tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    tracing::debug!(%tier, "request cancelled during inference");
                    return Err(RoutingError::Cancelled);
                }
                result = self.invoke(config, prompt) => result,
            };

            match result {
                Ok(text) => {
                    self.registry.mark_used(tier);
                    self.feedback
                        .record(tier, attempt_started.elapsed(), AttemptOutcome::Success);
                    self.metrics.inference(tier, attempt_started, true);
                    enter(&mut states, RouteState::Succeeded, tier);

                    return Ok(Response {
                        text,
                        decision: current,
                        failures,
                        latency: started.elapsed(),
                        states,
                    });
                }
                Err(e) => {
                    let (cause, outcome) = match e {
                        InferenceError::Timeout { .. } => (FallbackCause::Timeout, AttemptOutcome::Timeout),
                        InferenceError::Unavailable { .. } => (FallbackCause::Unavailable, AttemptOutcome::Failure),
                    };
                    self.feedback.record(tier, attempt_started.elapsed(), outcome);
                    self.metrics.inference(tier, attempt_started, false);

                    failures.push(AttemptFailure {
                        tier,
                        model: config.model.clone(),
                        cause,
                        message: e.to_string(),
                    });

                    let next = if failures.len() < MAX_ATTEMPTS {
                        current.fall_back(cause, self.registry.configs())
                    } else {
                        None
                    };

                    let Some(next) = next else {
                        enter(&mut states, RouteState::Failed, tier);
                        tracing::error!(%tier, attempts = failures.len(), error = %e, "all permitted tiers failed");
                        return Err(RoutingError::Exhausted { attempts: failures });
                    };

                    enter(&mut states, RouteState::FallingBack, tier);
                    tracing::warn!(
                        from = %tier,
                        to = %next.tier,
                        %cause,
                        error = %e,
                        "inference failed, falling back"
                    );
                    self.metrics.fallback(tier, next.tier, cause);
                    current = next;
                }
            }
        }
    }

    /// One backend call bounded by the tier timeout
    async fn invoke(&self, config: &TierConfig, prompt: &str) -> Result<String, InferenceError> {
        match tokio::time::timeout(
            config.timeout,
            self.backend.generate(&config.model, prompt, config.timeout),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(InferenceError::Timeout {
                model: config.model.clone(),
                after: config.timeout,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use superhelfer_config::{MonitorConfig, TiersConfig};

    use super::*;
    use crate::analysis::QueryAnalyzer;
    use crate::lifecycle::LifecycleManager;
    use crate::monitor::{MemoryReporter, StaticReporter};
    use crate::policy::{AlwaysAbort, AlwaysProceed, SwitchPolicy};
    use crate::testing::{Behavior, ScriptedBackend};

    const HEAVY_QUERY: &str = "Löse das Gleichungssystem: x+y=10, x-y=2";
    const CODE_QUERY: &str = "Zeige mir alle laufenden Prozesse mit ps aux | grep python";
    const FAST_QUERY: &str = "Welcher Befehl zeigt die Festplattenbelegung an?";

    fn router_with(
        backend: Arc<ScriptedBackend>,
        reporter: Option<Arc<dyn MemoryReporter>>,
        policy: Arc<dyn SwitchPolicy>,
    ) -> Router {
        let registry = Arc::new(TierRegistry::new(TiersConfig::default()));
        let monitor = Arc::new(ResourceMonitor::new(reporter, policy, &MonitorConfig::default()));
        Router::new(registry, monitor, backend)
    }

    fn ungated(backend: Arc<ScriptedBackend>) -> Router {
        router_with(backend, None, Arc::new(AlwaysProceed))
    }

    fn pressured(backend: Arc<ScriptedBackend>) -> Router {
        router_with(
            backend,
            Some(Arc::new(StaticReporter::new(100_000, 85_000))),
            Arc::new(AlwaysAbort),
        )
    }

    fn analyze(query: &str) -> QueryAnalysis {
        QueryAnalyzer::default().analyze(query)
    }

    fn heavy_decision(router: &Router) -> RoutingDecision {
        router.decide(&analyze(HEAVY_QUERY))
    }

    #[tokio::test]
    async fn decide_follows_analysis() {
        let router = ungated(Arc::new(ScriptedBackend::default()));
        assert_eq!(router.decide(&analyze(FAST_QUERY)).tier, Tier::Fast);
        assert_eq!(router.decide(&analyze(CODE_QUERY)).tier, Tier::Code);

        let heavy = heavy_decision(&router);
        assert_eq!(heavy.tier, Tier::Heavy);
        assert_eq!(heavy.model, "llama3.1:70b");
        assert_eq!(heavy.cost_estimate_mb, 42_000);
        assert_eq!(heavy.fallback_from, None);
    }

    #[tokio::test]
    async fn aborted_switch_falls_back_one_tier() {
        let router = pressured(Arc::new(ScriptedBackend::default()));

        let decision = router.route(&analyze(HEAVY_QUERY), &CancellationToken::new()).await.unwrap();

        assert_eq!(decision.tier, Tier::Code);
        assert_eq!(decision.fallback_from, Some(Tier::Heavy));
        assert_eq!(decision.reason, ReasonCode::SwitchAborted);
    }

    #[tokio::test]
    async fn loaded_tier_is_not_gated() {
        let router = pressured(Arc::new(ScriptedBackend::default()));
        router.registry().mark_used(Tier::Heavy);

        let decision = router.route(&analyze(HEAVY_QUERY), &CancellationToken::new()).await.unwrap();
        assert_eq!(decision.tier, Tier::Heavy);
        assert_eq!(decision.fallback_from, None);
    }

    #[tokio::test]
    async fn tier_unloaded_by_sweep_is_gated_again() {
        let backend = Arc::new(ScriptedBackend::default());
        let router = pressured(Arc::clone(&backend));
        router.registry().mark_used_at(Tier::Heavy, 0);

        let lifecycle = LifecycleManager::new(
            Arc::clone(router.registry()),
            backend,
            Duration::from_secs(60),
        );
        assert_eq!(lifecycle.sweep_at(400_000).await, vec![Tier::Heavy]);
        assert_eq!(router.registry().current(), None);

        let decision = router.route(&analyze(HEAVY_QUERY), &CancellationToken::new()).await.unwrap();
        assert_eq!(decision.tier, Tier::Code);
        assert_eq!(decision.fallback_from, Some(Tier::Heavy));
        assert_eq!(decision.reason, ReasonCode::SwitchAborted);
    }

    #[tokio::test]
    async fn fast_tier_is_never_gated() {
        let router = pressured(Arc::new(ScriptedBackend::default()));

        let decision = router.route(&analyze(FAST_QUERY), &CancellationToken::new()).await.unwrap();
        assert_eq!(decision.tier, Tier::Fast);
        assert_eq!(decision.reason, ReasonCode::FastBasicCommand);
    }

    #[tokio::test]
    async fn forced_tier_still_passes_the_gate() {
        let router = pressured(Arc::new(ScriptedBackend::default()));
        let cancel = CancellationToken::new();

        let decision = router.route_forced(Tier::Code, &analyze(FAST_QUERY), &cancel).await.unwrap();
        assert_eq!(decision.tier, Tier::Fast);
        assert_eq!(decision.fallback_from, Some(Tier::Code));

        let router = ungated(Arc::new(ScriptedBackend::default()));
        let decision = router.route_forced(Tier::Heavy, &analyze(FAST_QUERY), &cancel).await.unwrap();
        assert_eq!(decision.tier, Tier::Heavy);
        assert_eq!(decision.reason, ReasonCode::Forced);
    }

    #[tokio::test]
    async fn follow_up_keeps_tier_with_its_own_reason() {
        let router = ungated(Arc::new(ScriptedBackend::default()));

        let decision = router
            .route_follow_up(Tier::Heavy, &analyze("Und warum?"), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(decision.tier, Tier::Heavy);
        assert_eq!(decision.reason, ReasonCode::SessionFollowUp);
    }

    #[tokio::test]
    async fn successful_execution_marks_tier_used() {
        let backend = Arc::new(ScriptedBackend::default().with("llama3.1:70b", Behavior::Reply("x = 6, y = 4")));
        let router = ungated(backend.clone());

        let response = router
            .execute(heavy_decision(&router), HEAVY_QUERY, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(response.text, "x = 6, y = 4");
        assert_eq!(response.decision.tier, Tier::Heavy);
        assert!(response.failures.is_empty());
        assert_eq!(response.states, vec![RouteState::Executing, RouteState::Succeeded]);
        assert!(router.registry().is_loaded(Tier::Heavy));
        assert_eq!(router.registry().current(), Some(Tier::Heavy));
        assert_eq!(router.feedback().snapshot(Tier::Heavy).requests, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn heavy_timeout_falls_back_to_code_once() {
        let backend = Arc::new(
            ScriptedBackend::default()
                .with("llama3.1:70b", Behavior::Hang)
                .with("qwen3-coder-30b-local", Behavior::Reply("answer from code tier")),
        );
        let router = ungated(backend.clone());

        let response = router
            .execute(heavy_decision(&router), HEAVY_QUERY, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(response.text, "answer from code tier");
        assert_eq!(response.decision.tier, Tier::Code);
        assert_eq!(response.decision.fallback_from, Some(Tier::Heavy));
        assert_eq!(response.decision.reason, ReasonCode::TimeoutFallback);
        assert_eq!(response.failures.len(), 1);
        assert_eq!(response.failures[0].cause, FallbackCause::Timeout);
        assert_eq!(
            response.states,
            vec![
                RouteState::Executing,
                RouteState::FallingBack,
                RouteState::Executing,
                RouteState::Succeeded
            ]
        );
        assert_eq!(backend.calls(), vec!["llama3.1:70b", "qwen3-coder-30b-local"]);
        assert!(!router.registry().is_loaded(Tier::Heavy));
        assert_eq!(router.feedback().snapshot(Tier::Heavy).timeouts, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn second_failure_is_terminal() {
        let backend = Arc::new(
            ScriptedBackend::default()
                .with("llama3.1:70b", Behavior::Hang)
                .with("qwen3-coder-30b-local", Behavior::Fail("out of memory")),
        );
        let router = ungated(backend.clone());

        let err = router
            .execute(heavy_decision(&router), HEAVY_QUERY, &CancellationToken::new())
            .await
            .unwrap_err();

        let RoutingError::Exhausted { attempts } = err else {
            panic!("expected exhaustion");
        };
        assert_eq!(attempts.len(), 2);
        assert_eq!(attempts[0].tier, Tier::Heavy);
        assert_eq!(attempts[0].cause, FallbackCause::Timeout);
        assert_eq!(attempts[1].tier, Tier::Code);
        assert_eq!(attempts[1].cause, FallbackCause::Unavailable);
        assert!(attempts[1].message.contains("out of memory"));

        // Never reaches the fast tier
        assert_eq!(backend.calls(), vec!["llama3.1:70b", "qwen3-coder-30b-local"]);
        assert_eq!(router.registry().current(), None);
    }

    #[tokio::test]
    async fn fast_failure_is_terminal() {
        let backend = Arc::new(ScriptedBackend::default().with("llama3.2:3b", Behavior::Fail("connection refused")));
        let router = ungated(backend.clone());

        let decision = router.decide(&analyze(FAST_QUERY));
        let err = router.execute(decision, FAST_QUERY, &CancellationToken::new()).await.unwrap_err();

        assert!(matches!(err, RoutingError::Exhausted { ref attempts } if attempts.len() == 1));
        assert_eq!(backend.calls(), vec!["llama3.2:3b"]);
    }

    #[tokio::test]
    async fn fallback_never_climbs() {
        let backend = Arc::new(
            ScriptedBackend::default()
                .with("qwen3-coder-30b-local", Behavior::Fail("boom"))
                .with("llama3.2:3b", Behavior::Reply("short answer")),
        );
        let router = ungated(backend.clone());

        let response = router
            .execute(router.decide(&analyze(CODE_QUERY)), CODE_QUERY, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(response.decision.tier, Tier::Fast);
        assert_eq!(response.decision.reason, ReasonCode::UnavailableFallback);
        assert!(response.decision.tier < Tier::Code);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_drops_inference_without_marking_use() {
        let backend = Arc::new(ScriptedBackend::default().with("qwen3-coder-30b-local", Behavior::Hang));
        let router = ungated(backend);
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            trigger.cancel();
        });

        let err = router
            .execute(router.decide(&analyze(CODE_QUERY)), CODE_QUERY, &cancel)
            .await
            .unwrap_err();

        assert!(matches!(err, RoutingError::Cancelled));
        assert!(!router.registry().is_loaded(Tier::Code));
        assert_eq!(router.registry().current(), None);
    }

    #[tokio::test]
    async fn cancellation_during_confirmation() {
        struct NeverAnswers;

        #[async_trait::async_trait]
        impl SwitchPolicy for NeverAnswers {
            fn name(&self) -> &'static str {
                "never"
            }

            async fn decide(&self, _request: &crate::policy::SwitchRequest) -> SwitchDecision {
                std::future::pending().await
            }
        }

        let router = router_with(
            Arc::new(ScriptedBackend::default()),
            Some(Arc::new(StaticReporter::new(100_000, 90_000))),
            Arc::new(NeverAnswers),
        );
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = router.route(&analyze(HEAVY_QUERY), &cancel).await.unwrap_err();
        assert!(matches!(err, RoutingError::Cancelled));
    }
}
