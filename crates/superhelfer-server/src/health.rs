use http::StatusCode;

/// Liveness only; the backend is not consulted
pub async fn health_handler() -> (StatusCode, &'static str) {
    (StatusCode::OK, "ok")
}
