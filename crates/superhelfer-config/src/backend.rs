use std::time::Duration;

use serde::Deserialize;
use url::Url;

/// Ollama connection settings
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BackendConfig {
    #[serde(default = "default_base_url")]
    pub base_url: Url,
    #[serde(default = "default_connect_timeout", deserialize_with = "crate::duration::deserialize")]
    pub connect_timeout: Duration,
    /// Probe every tier model at startup and log missing ones
    #[serde(default = "default_check_availability")]
    pub check_availability: bool,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            connect_timeout: default_connect_timeout(),
            check_availability: default_check_availability(),
        }
    }
}

fn default_base_url() -> Url {
    Url::parse("http://localhost:11434").expect("must be valid URL")
}

const fn default_connect_timeout() -> Duration {
    Duration::from_secs(5)
}

#[allow(clippy::missing_const_for_fn)]
fn default_check_availability() -> bool {
    true
}
