//! Programmatic configuration builder for integration tests

use std::net::SocketAddr;
use std::time::Duration;

use superhelfer_config::{Config, PolicyKind, ReporterConfig};

/// Builder for constructing test configurations
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Minimal defaults pointed at a mock backend
    pub fn new(backend_url: &str) -> Self {
        let mut config = Config::default();
        config.server.listen_address = Some(SocketAddr::from(([127, 0, 0, 1], 0)));
        config.backend.base_url = backend_url.parse().expect("valid URL");
        config.monitor.policy = PolicyKind::Proceed;

        Self { config }
    }

    /// Bound every inference call on the heavy tier
    pub fn with_heavy_timeout(mut self, timeout: Duration) -> Self {
        self.config.tiers.heavy.timeout = timeout;
        self
    }

    /// Fixed memory reading with the given policy deciding risky switches
    pub fn with_memory(mut self, total_mb: u64, used_mb: u64, policy: PolicyKind) -> Self {
        self.config.monitor.reporter = ReporterConfig::Static { total_mb, used_mb };
        self.config.monitor.policy = policy;
        self
    }

    /// Disable health endpoint
    pub fn without_health(mut self) -> Self {
        self.config.server.health.enabled = false;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
