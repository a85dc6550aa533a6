use crate::api::{self, AppState};
use crate::config::ServerConfig;
use crate::error::{RagQueryError, Result};
use axum::http::HeaderValue;
use axum::Router;
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// HTTP front end for the query dispatcher
pub struct HttpServer {
    state: AppState,
    config: ServerConfig,
}

impl HttpServer {
    pub fn new(state: AppState, config: ServerConfig) -> Self {
        Self { state, config }
    }

    /// Bind `host:port` and serve until the process is stopped
    pub async fn run(&self) -> Result<()> {
        let addr = self.config.bind_addr();
        let listener = tokio::net::TcpListener::bind(&addr).await.map_err(|e| {
            let message = if e.kind() == std::io::ErrorKind::AddrInUse {
                format!(
                    "Port {} is already in use. Stop the other process or set server.port in config.toml",
                    self.config.port
                )
            } else {
                format!("Failed to bind to {}: {}", addr, e)
            };
            RagQueryError::Io(std::io::Error::new(e.kind(), message))
        })?;

        log::info!("Listening on http://{}", addr);
        log::info!("Query endpoint: http://{}/api/query", addr);
        if self.config.debug {
            log::debug!("Debug mode enabled");
        }

        axum::serve(listener, self.router())
            .await
            .map_err(|e| RagQueryError::Io(std::io::Error::other(format!("HTTP server error: {}", e))))?;

        Ok(())
    }

    /// Application routes wrapped in request tracing and CORS
    pub fn router(&self) -> Router {
        api::routes(self.state.clone()).layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors_layer(&self.config.allowed_origins)),
        )
    }
}

/// Any origin when none are configured, otherwise exactly the configured list
fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let cors = CorsLayer::new().allow_methods(Any).allow_headers(Any);

    if allowed_origins.is_empty() {
        return cors.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                log::warn!("Ignoring invalid allowed origin: {}", origin);
                None
            }
        })
        .collect();
    cors.allow_origin(AllowOrigin::list(origins))
}
