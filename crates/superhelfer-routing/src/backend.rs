//! Inference backend seam
//!
//! The router treats a model as an opaque text-completion service with a
//! name, a resource cost and a timeout.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

/// Failure of a single backend call
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InferenceError {
    /// The model did not answer within the tier timeout
    #[error("model {model} timed out after {after:?}")]
    Timeout { model: String, after: Duration },

    /// The backend refused or failed the request
    #[error("model {model} unavailable: {message}")]
    Unavailable { model: String, message: String },
}

impl InferenceError {
    pub fn unavailable(model: &str, message: impl Into<String>) -> Self {
        Self::Unavailable {
            model: model.to_owned(),
            message: message.into(),
        }
    }

    pub fn model(&self) -> &str {
        match self {
            Self::Timeout { model, .. } | Self::Unavailable { model, .. } => model,
        }
    }
}

/// A service that runs models by name
#[async_trait]
pub trait InferenceBackend: Send + Sync {
    /// Backend name for logs
    fn name(&self) -> &str;

    /// Generate a completion for `prompt`
    async fn generate(&self, model: &str, prompt: &str, timeout: Duration) -> Result<String, InferenceError>;

    /// Release the model's resources
    async fn unload(&self, model: &str) -> Result<(), InferenceError>;

    /// Whether the backend knows the model
    async fn is_available(&self, model: &str) -> Result<bool, InferenceError>;
}
