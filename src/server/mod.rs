//! HTTP server exposing the catalog use cases
//!
//! A thin axum layer over [`MovieService`]: handlers decode the request, run
//! the blocking use case off the async runtime, and map [`crate::Error`]
//! onto status codes.

pub mod api;

use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::ServerConfig;
use crate::error::{Error, Result};
use crate::service::MovieService;

pub use api::{create_router, ApiResponse, ErrorResponse, HealthResponse};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Catalog orchestrators
    pub service: Arc<MovieService>,

    /// Server start time
    pub start_time: Instant,
}

impl AppState {
    pub fn new(service: Arc<MovieService>) -> Self {
        Self {
            service,
            start_time: Instant::now(),
        }
    }
}

/// HTTP front end for the catalog
pub struct MovieServer {
    config: ServerConfig,
    state: AppState,
}

impl MovieServer {
    /// Create a server around an already initialized service
    pub fn new(config: ServerConfig, service: Arc<MovieService>) -> Self {
        Self {
            config,
            state: AppState::new(service),
        }
    }

    /// Get the application state
    pub fn state(&self) -> AppState {
        self.state.clone()
    }

    /// Build the router with all routes and layers
    pub fn build_router(&self) -> Router {
        let mut router = create_router(self.state.clone());

        if self.config.enable_cors {
            router = router.layer(
                CorsLayer::new()
                    .allow_origin(Any)
                    .allow_methods(Any)
                    .allow_headers(Any),
            );
        }

        router.layer(TraceLayer::new_for_http())
    }

    /// Serve until `shutdown_signal` resolves
    pub async fn start_with_shutdown(
        &self,
        shutdown_signal: impl std::future::Future<Output = ()> + Send + 'static,
    ) -> Result<()> {
        let router = self.build_router();
        let addr = self.config.bind_address();

        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .map_err(|e| Error::storage_with_source(format!("Failed to bind {addr}"), e))?;

        tracing::info!(address = %addr, "Raspberry server listening");

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal)
            .await
            .map_err(|e| Error::storage_with_source("HTTP server error", e))?;

        tracing::info!("Raspberry server shutdown complete");
        Ok(())
    }
}
