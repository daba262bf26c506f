use std::time::Duration;

use serde::Deserialize;

/// Conversation context kept per session id
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SessionConfig {
    /// Sessions idle for longer than this are dropped
    #[serde(default = "default_ttl", deserialize_with = "crate::duration::deserialize")]
    pub ttl: Duration,
    #[serde(default = "default_sweep_interval", deserialize_with = "crate::duration::deserialize")]
    pub sweep_interval: Duration,
    /// Turns retained per session
    #[serde(default = "default_max_turns")]
    pub max_turns: usize,
    /// Recent turns prepended to the prompt
    #[serde(default = "default_context_turns")]
    pub context_turns: usize,
    /// Queries up to this many tokens may inherit the previous turn's tier
    #[serde(default = "default_follow_up_max_tokens")]
    pub follow_up_max_tokens: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl: default_ttl(),
            sweep_interval: default_sweep_interval(),
            max_turns: default_max_turns(),
            context_turns: default_context_turns(),
            follow_up_max_tokens: default_follow_up_max_tokens(),
        }
    }
}

const fn default_ttl() -> Duration {
    Duration::from_secs(3600)
}

const fn default_sweep_interval() -> Duration {
    Duration::from_secs(60)
}

const fn default_max_turns() -> usize {
    20
}

const fn default_context_turns() -> usize {
    5
}

const fn default_follow_up_max_tokens() -> usize {
    6
}
