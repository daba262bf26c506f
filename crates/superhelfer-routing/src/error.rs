//! Routing-specific error types

use std::fmt;

use http::StatusCode;
use serde::Serialize;
use superhelfer_core::{HttpError, Tier};
use thiserror::Error;

use crate::FallbackCause;

/// One failed inference attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttemptFailure {
    pub tier: Tier,
    pub model: String,
    pub cause: FallbackCause,
    pub message: String,
}

impl fmt::Display for AttemptFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}): {}", self.tier, self.cause, self.message)
    }
}

/// Errors surfaced to the caller of the router
#[derive(Debug, Error)]
pub enum RoutingError {
    /// Every permitted tier failed
    #[error("all tiers failed: {}", format_attempts(.attempts))]
    Exhausted { attempts: Vec<AttemptFailure> },

    /// The caller cancelled the request
    #[error("request cancelled")]
    Cancelled,
}

fn format_attempts(attempts: &[AttemptFailure]) -> String {
    attempts.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ")
}

impl HttpError for RoutingError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::Exhausted { .. } => StatusCode::BAD_GATEWAY,
            // nginx's "client closed request"
            Self::Cancelled => StatusCode::from_u16(499).unwrap_or(StatusCode::BAD_REQUEST),
        }
    }

    fn error_type(&self) -> &str {
        match self {
            Self::Exhausted { .. } => "inference_exhausted",
            Self::Cancelled => "request_cancelled",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exhausted_lists_every_attempt() {
        let err = RoutingError::Exhausted {
            attempts: vec![
                AttemptFailure {
                    tier: Tier::Heavy,
                    model: "big".to_owned(),
                    cause: FallbackCause::Timeout,
                    message: "timed out".to_owned(),
                },
                AttemptFailure {
                    tier: Tier::Code,
                    model: "coder".to_owned(),
                    cause: FallbackCause::Unavailable,
                    message: "connection refused".to_owned(),
                },
            ],
        };

        assert_eq!(
            err.to_string(),
            "all tiers failed: heavy (timeout): timed out; code (unavailable): connection refused"
        );
        assert_eq!(err.status_code(), StatusCode::BAD_GATEWAY);
        assert_eq!(err.error_type(), "inference_exhausted");
    }
}
