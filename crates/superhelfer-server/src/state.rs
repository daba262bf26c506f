//! Shared state for the HTTP handlers

use std::sync::Arc;

use superhelfer_backend::{OllamaBackend, probe_tiers, reporter_from_config};
use superhelfer_config::Config;
use superhelfer_routing::policy::{self, SwitchPolicy};
use superhelfer_routing::{
    InferenceBackend, LifecycleManager, MemoryReporter, QueryAnalyzer, ResourceMonitor, Router, SessionStore,
    TierRegistry,
};

/// Analyzer, router and session store behind one `Arc`
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    analyzer: QueryAnalyzer,
    router: Router,
    sessions: Arc<SessionStore>,
}

impl AppState {
    /// Assemble the routing stack around an arbitrary backend and reporter
    pub fn new(
        config: &Config,
        backend: Arc<dyn InferenceBackend>,
        reporter: Option<Arc<dyn MemoryReporter>>,
        policy: Arc<dyn SwitchPolicy>,
    ) -> Self {
        let registry = Arc::new(TierRegistry::new(config.tiers.clone()));
        let monitor = Arc::new(ResourceMonitor::new(reporter, policy, &config.monitor));

        Self {
            inner: Arc::new(AppStateInner {
                analyzer: QueryAnalyzer::new(&config.analyzer),
                router: Router::new(registry, monitor, backend),
                sessions: Arc::new(SessionStore::new(config.session.clone())),
            }),
        }
    }

    /// Ollama backend, configured reporter and policy
    ///
    /// Probes the tier models when `backend.check_availability` is set;
    /// missing models are logged, never fatal.
    pub async fn from_config(config: &Config) -> anyhow::Result<Self> {
        let backend: Arc<dyn InferenceBackend> = Arc::new(OllamaBackend::new(&config.backend)?);

        if config.backend.check_availability {
            let missing = probe_tiers(backend.as_ref(), &config.tiers).await;
            if !missing.is_empty() {
                tracing::warn!(?missing, base_url = %config.backend.base_url, "some tier models are not available");
            }
        }

        let reporter = reporter_from_config(&config.monitor.reporter);
        if reporter.is_none() {
            tracing::info!("no memory reporter configured, tier switches are not gated");
        }

        Ok(Self::new(config, backend, reporter, policy::from_kind(config.monitor.policy)))
    }

    pub fn analyzer(&self) -> &QueryAnalyzer {
        &self.inner.analyzer
    }

    pub fn router(&self) -> &Router {
        &self.inner.router
    }

    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.inner.sessions
    }

    /// Idle-unload sweep over this state's registry and backend
    pub fn lifecycle(&self, config: &Config) -> LifecycleManager {
        LifecycleManager::new(
            Arc::clone(self.router().registry()),
            Arc::clone(self.router().backend()),
            config.lifecycle.sweep_interval,
        )
    }
}
