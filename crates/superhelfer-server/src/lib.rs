//! HTTP surface for superhelfer

#![allow(clippy::must_use_candidate, clippy::missing_errors_doc)]

mod api;
mod error;
mod health;
mod state;

use std::net::SocketAddr;

use axum::Router;
use superhelfer_config::Config;
use tower_http::trace::TraceLayer;

pub use api::{QueryRequest, QueryResponse, RouteRequest, RouteResponse, StatusResponse};
pub use error::ApiError;
pub use state::AppState;

/// Assembled server with all routes and middleware
pub struct Server {
    router: Router,
    listen_address: SocketAddr,
    state: AppState,
}

impl Server {
    /// Build the server and its Ollama-backed state from configuration
    pub async fn new(config: &Config) -> anyhow::Result<Self> {
        let state = AppState::from_config(config).await?;
        Ok(Self::with_state(config, state))
    }

    /// Build the server around an existing state
    pub fn with_state(config: &Config, state: AppState) -> Self {
        let mut app = Router::new();

        if config.server.health.enabled {
            app = app.route(&config.server.health.path, axum::routing::get(health::health_handler));
        }

        app = app.merge(api::api_router(state.clone()));

        app = app.layer(TraceLayer::new_for_http());

        Self {
            router: app,
            listen_address: config.server.listen_address(),
            state,
        }
    }

    pub const fn listen_address(&self) -> SocketAddr {
        self.listen_address
    }

    /// Shared state, for spawning the background sweeps
    pub const fn state(&self) -> &AppState {
        &self.state
    }

    /// Consume the server and return the inner router
    ///
    /// Useful for testing when the caller manages the listener
    pub fn into_router(self) -> Router {
        self.router
    }

    /// Start serving requests
    ///
    /// Blocks until the cancellation token is triggered.
    pub async fn serve(self, shutdown: tokio_util::sync::CancellationToken) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(self.listen_address).await?;
        let local_addr = listener.local_addr()?;
        tracing::info!(%local_addr, "server listening");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                shutdown.cancelled().await;
                tracing::info!("graceful shutdown initiated");
            })
            .await?;

        Ok(())
    }
}
