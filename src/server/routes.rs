//! HTTP routes definition

use axum::{
    routing::{delete, get},
    Router,
};

use super::handlers;

/// Order lookups
///
/// - GET /order?uid=...     - lookup (legacy query-string form)
/// - GET /api/orders/:uid   - lookup
pub fn order_routes() -> Router {
    Router::new()
        .route("/order", get(handlers::get_order_by_query))
        .route("/api/orders/:uid", get(handlers::get_order))
}

/// Cache administration
///
/// - GET    /api/cache/stats - hit/miss counters and shard sizes
/// - DELETE /api/cache/:uid  - drop one order from the cache (not the store)
pub fn cache_routes() -> Router {
    Router::new()
        .route("/api/cache/stats", get(handlers::cache_stats))
        .route("/api/cache/:uid", delete(handlers::evict_order))
}

pub fn metrics_routes() -> Router {
    Router::new().route("/_metrics", get(handlers::metrics_endpoint))
}
