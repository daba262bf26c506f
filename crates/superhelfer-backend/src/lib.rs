//! Concrete backends for superhelfer
//!
//! - **Ollama**: the inference backend, over its HTTP API
//! - **GPU memory**: `nvidia-smi` polling and a fixed reading

#![allow(clippy::must_use_candidate, clippy::missing_errors_doc)]

pub mod gpu;
pub mod ollama;

use std::sync::Arc;

use superhelfer_config::{ReporterConfig, TiersConfig};
use superhelfer_routing::{InferenceBackend, MemoryReporter, StaticReporter, Tier};

pub use gpu::NvidiaSmiReporter;
pub use ollama::OllamaBackend;

/// Build the configured memory reporter; `None` disables the switch gate
pub fn reporter_from_config(config: &ReporterConfig) -> Option<Arc<dyn MemoryReporter>> {
    match config {
        ReporterConfig::None => None,
        ReporterConfig::NvidiaSmi { command } => Some(Arc::new(NvidiaSmiReporter::new(command.clone()))),
        ReporterConfig::Static { total_mb, used_mb } => Some(Arc::new(StaticReporter::new(*total_mb, *used_mb))),
    }
}

/// Ask the backend for every tier model and log the missing ones
///
/// Returns the tiers whose model was not found or could not be checked.
pub async fn probe_tiers(backend: &dyn InferenceBackend, tiers: &TiersConfig) -> Vec<Tier> {
    let mut missing = Vec::new();

    for tier in Tier::ALL {
        let model = &tiers.get(tier).model;

        match backend.is_available(model).await {
            Ok(true) => tracing::info!(%tier, %model, backend = backend.name(), "tier model available"),
            Ok(false) => {
                tracing::warn!(%tier, %model, backend = backend.name(), "tier model not found on backend");
                missing.push(tier);
            }
            Err(e) => {
                tracing::warn!(%tier, %model, error = %e, "failed to check tier model availability");
                missing.push(tier);
            }
        }
    }

    missing
}
