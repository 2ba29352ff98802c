//! OrderCache HTTP server
//!
//! axum router over the read path, the cache and the health checker.
//! Lookups go through [`ReadPath`]; everything else is operational.

pub mod handlers;
pub mod health;
pub mod routes;

use axum::{extract::Extension, Router};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::{
    compression::CompressionLayer, cors::CorsLayer, services::ServeDir, timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::{error, info};

use crate::cache::ShardedCache;
use crate::error::Result;
use crate::read_path::ReadPath;

pub use health::{HealthChecker, HealthStatus, StoreHealth};

/// Server configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// HTTP bind address
    pub bind: String,
    /// HTTP port
    pub port: u16,
    /// Enable permissive CORS
    pub enable_cors: bool,
    /// Request timeout (seconds)
    pub timeout_secs: u64,
    /// Static files served for unmatched paths
    pub web_dir: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".to_string(),
            port: 8081,
            enable_cors: true,
            timeout_secs: 30,
            web_dir: None,
        }
    }
}

impl ServerConfig {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub read_path: ReadPath,
    pub cache: Arc<ShardedCache>,
    pub health: Arc<HealthChecker>,
    pub config: ServerConfig,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("config", &self.config)
            .finish()
    }
}

/// Build the router with all routes and layers
pub fn build_router(state: AppState) -> Router {
    crate::metrics::init_metrics();
    let config = state.config.clone();
    let health = state.health.clone();

    let mut app = Router::new()
        .merge(routes::order_routes())
        .merge(routes::cache_routes())
        .merge(routes::metrics_routes())
        .merge(health::health_router(health));

    if let Some(dir) = &config.web_dir {
        info!(dir = %dir.display(), "Serving static files");
        app = app.fallback_service(ServeDir::new(dir));
    }

    let app = app
        .layer(Extension(Arc::new(state)))
        .layer(TimeoutLayer::new(Duration::from_secs(config.timeout_secs)))
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new());

    if config.enable_cors {
        app.layer(CorsLayer::permissive())
    } else {
        app
    }
}

/// Bind and serve until `shutdown` is cancelled
pub async fn serve(state: AppState, shutdown: CancellationToken) -> Result<()> {
    let addr = state.config.addr();
    let app = build_router(state);

    let listener = TcpListener::bind(&addr).await?;
    info!("Server listening on http://{}", addr);
    info!("Lookup: http://{}/order?uid=<order_uid>", addr);
    info!("Metrics: http://{}/_metrics", addr);
    info!("Health: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .map_err(|e| {
            error!(error = %e, "Server error");
            e.into()
        })
}
