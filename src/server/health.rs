//! Health check endpoints
//!
//! - Liveness: the process answers
//! - Readiness: startup finished and the store answers a ping right now
//! - Startup: initialization has completed

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, instrument, warn};

use crate::cache::ShardedCache;
use crate::metrics::record_store_op;
use crate::storage::DurableStore;

/// Health status
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    /// Overall status ("healthy", "degraded", "starting")
    pub status: String,
    pub ready: bool,
    pub alive: bool,
    pub version: String,
    pub uptime_seconds: u64,
    pub store: StoreHealth,
    pub cache_entries: usize,
}

/// Durable store health as last observed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreHealth {
    pub status: String,
    pub backend: String,
}

/// Health check manager
#[derive(Clone)]
pub struct HealthChecker {
    start_time: std::time::Instant,
    is_ready: Arc<RwLock<bool>>,
    is_startup_complete: Arc<RwLock<bool>>,
    store_health: Arc<RwLock<StoreHealth>>,
    store: Option<Arc<dyn DurableStore>>,
    cache: Arc<ShardedCache>,
}

impl HealthChecker {
    pub fn new(cache: Arc<ShardedCache>) -> Self {
        Self {
            start_time: std::time::Instant::now(),
            is_ready: Arc::new(RwLock::new(false)),
            is_startup_complete: Arc::new(RwLock::new(false)),
            store_health: Arc::new(RwLock::new(StoreHealth {
                status: "starting".to_string(),
                backend: "unknown".to_string(),
            })),
            store: None,
            cache,
        }
    }

    /// Ping `store` on every readiness check
    pub fn with_store(mut self, store: Arc<dyn DurableStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Mark as ready
    pub async fn set_ready(&self) {
        *self.is_ready.write().await = true;
        info!("Health checker: service is READY");
    }

    /// Mark as not ready
    pub async fn set_not_ready(&self) {
        *self.is_ready.write().await = false;
        warn!("Health checker: service is NOT READY");
    }

    /// Mark startup as complete
    pub async fn set_startup_complete(&self) {
        *self.is_startup_complete.write().await = true;
        info!("Health checker: startup COMPLETE");
    }

    pub async fn update_store_health(&self, health: StoreHealth) {
        *self.store_health.write().await = health;
    }

    fn uptime(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    #[instrument(skip(self))]
    pub async fn check_liveness(&self) -> bool {
        true
    }

    /// Ready once startup completed and the store answers its ping
    ///
    /// Without an attached store the last reported store health is used.
    #[instrument(skip(self))]
    pub async fn check_readiness(&self) -> bool {
        if !*self.is_ready.read().await {
            return false;
        }

        if let Some(store) = &self.store {
            let ping = store.ping().await;
            record_store_op("ping", ping.is_ok());
            let status = match ping {
                Ok(()) => "healthy",
                Err(e) => {
                    warn!(error = %e, "Order store ping failed");
                    "unreachable"
                }
            };
            self.store_health.write().await.status = status.to_string();
        }

        self.store_health.read().await.status == "healthy"
    }

    #[instrument(skip(self))]
    pub async fn check_startup(&self) -> bool {
        *self.is_startup_complete.read().await
    }

    /// Get full health status
    pub async fn get_status(&self) -> HealthStatus {
        let ready = self.check_readiness().await;
        let store = self.store_health.read().await.clone();
        let alive = self.check_liveness().await;
        let startup = self.check_startup().await;

        let overall_status = if ready {
            "healthy"
        } else if startup {
            "degraded"
        } else {
            "starting"
        };

        HealthStatus {
            status: overall_status.to_string(),
            ready,
            alive,
            version: crate::VERSION.to_string(),
            uptime_seconds: self.uptime(),
            store,
            cache_entries: self.cache.len(),
        }
    }
}

/// Liveness probe handler
#[instrument(skip(health))]
pub async fn liveness_handler(State(health): State<Arc<HealthChecker>>) -> impl IntoResponse {
    if health.check_liveness().await {
        (StatusCode::OK, Json(serde_json::json!({ "status": "alive" })))
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({ "status": "dead" })),
        )
    }
}

/// Readiness probe handler
#[instrument(skip(health))]
pub async fn readiness_handler(State(health): State<Arc<HealthChecker>>) -> impl IntoResponse {
    if health.check_readiness().await {
        (StatusCode::OK, Json(serde_json::json!({ "status": "ready" })))
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({ "status": "not_ready" })),
        )
    }
}

/// Startup probe handler
#[instrument(skip(health))]
pub async fn startup_handler(State(health): State<Arc<HealthChecker>>) -> impl IntoResponse {
    if health.check_startup().await {
        (StatusCode::OK, Json(serde_json::json!({ "status": "started" })))
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({ "status": "starting" })),
        )
    }
}

/// Detailed health status handler
#[instrument(skip(health))]
pub async fn health_status_handler(State(health): State<Arc<HealthChecker>>) -> impl IntoResponse {
    let status = health.get_status().await;
    let status_code = match status.status.as_str() {
        "healthy" | "degraded" => StatusCode::OK,
        _ => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status_code, Json(status))
}

/// Create health check router
pub fn health_router(health: Arc<HealthChecker>) -> Router {
    Router::new()
        .route("/health/live", get(liveness_handler))
        .route("/health/ready", get(readiness_handler))
        .route("/health/startup", get(startup_handler))
        .route("/health", get(health_status_handler))
        .with_state(health)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    fn healthy_store() -> StoreHealth {
        StoreHealth {
            status: "healthy".to_string(),
            backend: "memory".to_string(),
        }
    }

    #[tokio::test]
    async fn test_liveness_always_true() {
        let checker = HealthChecker::new(Arc::new(ShardedCache::new()));
        assert!(checker.check_liveness().await);
    }

    #[tokio::test]
    async fn test_readiness_requires_ready_and_store() {
        let checker = HealthChecker::new(Arc::new(ShardedCache::new()));
        assert!(!checker.check_readiness().await);

        checker.set_ready().await;
        assert!(!checker.check_readiness().await);

        checker.update_store_health(healthy_store()).await;
        assert!(checker.check_readiness().await);

        checker.set_not_ready().await;
        assert!(!checker.check_readiness().await);
    }

    #[tokio::test]
    async fn test_readiness_pings_attached_store() {
        let store = MemoryStore::new();
        let checker = HealthChecker::new(Arc::new(ShardedCache::new()))
            .with_store(Arc::new(store.clone()));
        checker.set_startup_complete().await;
        checker.set_ready().await;

        assert!(checker.check_readiness().await);

        store.fail_ping(true);
        assert!(!checker.check_readiness().await);
        let status = checker.get_status().await;
        assert_eq!(status.status, "degraded");
        assert_eq!(status.store.status, "unreachable");

        store.fail_ping(false);
        assert!(checker.check_readiness().await);
        assert_eq!(checker.get_status().await.store.status, "healthy");
    }

    #[tokio::test]
    async fn test_health_transitions() {
        let cache = Arc::new(ShardedCache::new());
        let checker = HealthChecker::new(cache.clone());

        assert_eq!(checker.get_status().await.status, "starting");

        checker.set_startup_complete().await;
        assert_eq!(checker.get_status().await.status, "degraded");

        checker.update_store_health(healthy_store()).await;
        checker.set_ready().await;
        cache.set("h-1", crate::model::order::sample_order("h-1"));

        let status = checker.get_status().await;
        assert_eq!(status.status, "healthy");
        assert_eq!(status.cache_entries, 1);
        assert_eq!(status.version, crate::VERSION);
    }
}
