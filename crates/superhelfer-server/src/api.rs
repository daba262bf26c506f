//! `/v1` routing and query endpoints

use axum::extract::{Path, State};
use axum::{Json, Router, routing};
use serde::{Deserialize, Serialize};
use superhelfer_routing::{
    AttemptFailure, QueryAnalysis, ResourceSnapshot, RouteState, RoutingDecision, SessionStats, Tier,
    TierFeedbackSnapshot, TierStatus, Turn,
};
use tokio_util::sync::CancellationToken;

use crate::error::ApiError;
use crate::state::AppState;

pub fn api_router(state: AppState) -> Router {
    Router::new()
        .route("/v1/route", routing::post(route))
        .route("/v1/query", routing::post(query))
        .route("/v1/status", routing::get(status))
        .route("/v1/sessions/{id}", routing::get(session))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
pub struct RouteRequest {
    pub query: String,
}

#[derive(Debug, Serialize)]
pub struct RouteResponse {
    pub analysis: QueryAnalysis,
    pub decision: RoutingDecision,
}

/// Handle `POST /v1/route`: analysis and decision only, no gate, no inference
async fn route(State(state): State<AppState>, Json(request): Json<RouteRequest>) -> Json<RouteResponse> {
    let analysis = state.analyzer().analyze(&request.query);
    let decision = state.router().decide(&analysis);

    Json(RouteResponse { analysis, decision })
}

#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    pub query: String,
    #[serde(default)]
    pub session_id: Option<String>,
    /// Skip analysis and use this tier
    #[serde(default)]
    pub tier: Option<Tier>,
}

#[derive(Debug, Serialize)]
pub struct QueryResponse {
    pub response: String,
    pub tier: Tier,
    pub model: String,
    pub session_id: String,
    pub decision: RoutingDecision,
    /// Attempts that failed before the answer
    pub failures: Vec<AttemptFailure>,
    pub states: Vec<RouteState>,
    pub latency_ms: u64,
}

/// Handle `POST /v1/query`
///
/// A client disconnect drops this future, which cancels the token and with
/// it any pending confirmation or inference.
async fn query(State(state): State<AppState>, Json(request): Json<QueryRequest>) -> Result<Json<QueryResponse>, ApiError> {
    let cancel = CancellationToken::new();
    let _cancel_on_drop = cancel.clone().drop_guard();

    let sessions = state.sessions();
    let router = state.router();

    let session_id = sessions.open(request.session_id.as_deref());
    let analysis = state.analyzer().analyze(&request.query);

    let decision = if let Some(tier) = request.tier {
        router.route_forced(tier, &analysis, &cancel).await?
    } else if let Some(tier) = sessions.follow_up_tier(&session_id, &analysis) {
        tracing::debug!(session = %session_id, %tier, "short follow-up keeps previous tier");
        router.route_follow_up(tier, &analysis, &cancel).await?
    } else {
        router.route(&analysis, &cancel).await?
    };

    let prompt = sessions.context_prompt(&session_id, &request.query);
    let response = router.execute(decision, &prompt, &cancel).await?;

    sessions.record_turn(
        &session_id,
        Turn::new(&request.query, response.decision.tier, analysis.complexity_score, &response.text),
    );

    Ok(Json(QueryResponse {
        tier: response.decision.tier,
        model: response.decision.model.clone(),
        response: response.text,
        session_id,
        decision: response.decision,
        failures: response.failures,
        states: response.states,
        latency_ms: u64::try_from(response.latency.as_millis()).unwrap_or(u64::MAX),
    }))
}

#[derive(Debug, Serialize)]
pub struct TierView {
    #[serde(flatten)]
    pub status: TierStatus,
    pub stats: TierFeedbackSnapshot,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub current_tier: Option<Tier>,
    pub policy: &'static str,
    /// `None` without a reporter or when the reading failed
    pub resources: Option<ResourceSnapshot>,
    pub sessions: usize,
    pub tiers: Vec<TierView>,
}

/// Handle `GET /v1/status`
async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
    let router = state.router();
    let monitor = router.monitor();

    let resources = if monitor.has_reporter() {
        monitor
            .snapshot()
            .await
            .inspect_err(|e| tracing::debug!(error = %e, "no resource snapshot for status"))
            .ok()
    } else {
        None
    };

    let tiers = router
        .registry()
        .status()
        .into_iter()
        .map(|status| TierView {
            stats: router.feedback().snapshot(status.tier),
            status,
        })
        .collect();

    Json(StatusResponse {
        current_tier: router.registry().current(),
        policy: monitor.policy_name(),
        resources,
        sessions: state.sessions().len(),
        tiers,
    })
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    #[serde(flatten)]
    pub stats: SessionStats,
    pub history: Vec<Turn>,
}

/// Handle `GET /v1/sessions/{id}`
async fn session(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<SessionResponse>, ApiError> {
    let sessions = state.sessions();

    let (Some(stats), Some(history)) = (sessions.stats(&id), sessions.get(&id)) else {
        return Err(ApiError::SessionNotFound(id));
    };

    Ok(Json(SessionResponse { stats, history }))
}
