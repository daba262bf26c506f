use axum::Json;
use axum::response::{IntoResponse, Response};
use http::StatusCode;
use superhelfer_core::HttpError;
use superhelfer_routing::RoutingError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Routing(#[from] RoutingError),

    #[error("session not found: {0}")]
    SessionNotFound(String),
}

impl HttpError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::Routing(e) => e.status_code(),
            Self::SessionNotFound(_) => StatusCode::NOT_FOUND,
        }
    }

    fn error_type(&self) -> &str {
        match self {
            Self::Routing(e) => e.error_type(),
            Self::SessionNotFound(_) => "session_not_found",
        }
    }

    fn client_message(&self) -> String {
        match self {
            Self::Routing(e) => e.client_message(),
            Self::SessionNotFound(_) => self.to_string(),
        }
    }
}

/// `OpenAI`-style JSON error body
impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = serde_json::json!({
            "error": {
                "message": self.client_message(),
                "type": self.error_type(),
                "code": serde_json::Value::Null,
            }
        });

        (status, Json(body)).into_response()
    }
}
