use http::StatusCode;

/// Domain error that knows how it should look on the wire
///
/// Feature crates implement this for their error enums; only the server
/// crate turns it into an axum response.
pub trait HttpError: std::error::Error {
    /// Status code returned to the client
    fn status_code(&self) -> StatusCode;

    /// Stable, machine-readable error kind (e.g. `inference_exhausted`)
    fn error_type(&self) -> &str;

    /// Message that may be shown to API consumers
    fn client_message(&self) -> String {
        self.to_string()
    }
}
