#![allow(clippy::must_use_candidate)]

pub mod analyzer;
pub mod backend;
pub mod calibration;
pub mod duration;
mod env;
pub mod lifecycle;
mod loader;
pub mod monitor;
pub mod server;
pub mod session;
pub mod telemetry;
pub mod tiers;

use serde::Deserialize;

pub use analyzer::*;
pub use backend::*;
pub use calibration::*;
pub use lifecycle::*;
pub use monitor::*;
pub use server::*;
pub use session::*;
pub use telemetry::{ExportProtocol, ExporterConfig, LogFormat, TelemetryConfig};
pub use tiers::*;

/// Top-level superhelfer configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// HTTP listener and health endpoint
    #[serde(default)]
    pub server: ServerConfig,
    /// Inference backend connection
    #[serde(default)]
    pub backend: BackendConfig,
    /// Per-tier model configuration
    #[serde(default)]
    pub tiers: TiersConfig,
    /// Query analyzer thresholds and weights
    #[serde(default)]
    pub analyzer: AnalyzerConfig,
    /// GPU memory monitor and switch confirmation
    #[serde(default)]
    pub monitor: MonitorConfig,
    /// Idle-unload sweep
    #[serde(default)]
    pub lifecycle: LifecycleConfig,
    /// Session context retention
    #[serde(default)]
    pub session: SessionConfig,
    /// Offline calibration loop
    #[serde(default)]
    pub calibration: CalibrationConfig,
    /// Logging and OTLP export
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}
