//! Idle-unload sweep

use std::sync::Arc;
use std::time::Duration;

use superhelfer_core::Tier;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::backend::InferenceBackend;
use crate::clock::now_millis;
use crate::registry::TierRegistry;

/// Unloads tiers that have been idle longer than their configured interval
pub struct LifecycleManager {
    registry: Arc<TierRegistry>,
    backend: Arc<dyn InferenceBackend>,
    sweep_interval: Duration,
}

impl LifecycleManager {
    pub fn new(registry: Arc<TierRegistry>, backend: Arc<dyn InferenceBackend>, sweep_interval: Duration) -> Self {
        Self {
            registry,
            backend,
            sweep_interval,
        }
    }

    /// Run one sweep now
    pub async fn sweep(&self) -> Vec<Tier> {
        self.sweep_at(now_millis()).await
    }

    /// Run one sweep as of `now_ms`; returns the tiers that were unloaded
    ///
    /// A failed unload leaves the tier marked loaded so the next sweep
    /// retries it.
    pub async fn sweep_at(&self, now_ms: u64) -> Vec<Tier> {
        let mut unloaded = Vec::new();

        for tier in self.registry.idle_candidates(now_ms) {
            let model = &self.registry.config(tier).model;
            let observed = self.registry.last_used_ms(tier);

            match self.backend.unload(model).await {
                Ok(()) => {
                    if self.registry.mark_unloaded(tier, observed) {
                        tracing::info!(%tier, %model, "unloaded idle tier");
                        unloaded.push(tier);
                    } else {
                        tracing::debug!(%tier, %model, "tier used during unload, keeping it marked loaded");
                    }
                }
                Err(e) => {
                    tracing::warn!(%tier, %model, error = %e, "failed to unload idle tier, retrying next sweep");
                }
            }
        }

        unloaded
    }

    /// Sweep every `sweep_interval` until `cancel` fires
    pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(self.sweep_interval);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // The first tick completes immediately
            interval.tick().await;

            tracing::debug!(interval = ?self.sweep_interval, "lifecycle sweep started");

            loop {
                tokio::select! {
                    () = cancel.cancelled() => break,
                    _ = interval.tick() => {
                        self.sweep().await;
                    }
                }
            }

            tracing::debug!("lifecycle sweep stopped");
        })
    }
}

#[cfg(test)]
mod tests {
    use superhelfer_config::TiersConfig;

    use super::*;
    use crate::testing::ScriptedBackend;

    fn manager(backend: Arc<ScriptedBackend>) -> LifecycleManager {
        let registry = Arc::new(TierRegistry::new(TiersConfig::default()));
        LifecycleManager::new(registry, backend, Duration::from_secs(60))
    }

    #[tokio::test]
    async fn unloads_only_expired_tiers() {
        let backend = Arc::new(ScriptedBackend::default());
        let manager = manager(backend.clone());
        for tier in Tier::ALL {
            manager.registry.mark_used_at(tier, 0);
        }

        let unloaded = manager.sweep_at(301_000).await;

        assert_eq!(unloaded, vec![Tier::Heavy]);
        assert_eq!(backend.unloads(), vec!["llama3.1:70b"]);
        assert!(!manager.registry.is_loaded(Tier::Heavy));
        assert!(manager.registry.is_loaded(Tier::Code));
        assert!(manager.registry.is_loaded(Tier::Fast));
    }

    #[tokio::test]
    async fn fast_tier_is_never_unloaded() {
        let backend = Arc::new(ScriptedBackend::default());
        let manager = manager(backend.clone());
        manager.registry.mark_used_at(Tier::Fast, 0);

        assert!(manager.sweep_at(u64::MAX / 2).await.is_empty());
        assert!(backend.unloads().is_empty());
    }

    #[tokio::test]
    async fn failed_unload_is_retried_next_sweep() {
        let backend = Arc::new(ScriptedBackend::default().failing_unload("llama3.1:70b"));
        let manager = manager(backend.clone());
        manager.registry.mark_used_at(Tier::Heavy, 0);

        assert!(manager.sweep_at(400_000).await.is_empty());
        assert!(manager.registry.is_loaded(Tier::Heavy));

        manager.sweep_at(460_000).await;
        assert_eq!(backend.unloads().len(), 2);
    }

    #[tokio::test]
    async fn unloaded_tier_is_not_swept_again() {
        let backend = Arc::new(ScriptedBackend::default());
        let manager = manager(backend.clone());
        manager.registry.mark_used_at(Tier::Heavy, 0);

        assert_eq!(manager.sweep_at(400_000).await, vec![Tier::Heavy]);
        assert!(manager.sweep_at(800_000).await.is_empty());
        assert_eq!(backend.unloads().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn spawned_task_stops_on_cancel() {
        let manager = manager(Arc::new(ScriptedBackend::default()));
        let cancel = CancellationToken::new();

        let handle = manager.spawn(cancel.clone());
        tokio::time::sleep(Duration::from_secs(120)).await;
        cancel.cancel();

        handle.await.unwrap();
    }
}
