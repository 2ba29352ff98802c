//! HTTP route handlers

use axum::{
    extract::{Extension, Path, Query},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, instrument, warn};

use crate::cache::CacheStats;
use crate::error::Error;
use crate::metrics::{export_metrics, CACHE_ENTRIES};
use crate::server::AppState;

/// `/order` query string
#[derive(Debug, Deserialize)]
pub struct OrderQuery {
    #[serde(default)]
    pub uid: Option<String>,
}

/// Error body
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
        .into_response()
}

async fn lookup(state: &AppState, uid: &str) -> Response {
    match state.read_path.lookup(uid).await {
        Ok(Some(order)) => Json(order).into_response(),
        Ok(None) => {
            debug!(order_uid = %uid, "Order not found");
            error_response(StatusCode::NOT_FOUND, "Order not found")
        }
        Err(Error::InvalidArgument(msg)) => error_response(StatusCode::BAD_REQUEST, msg),
        Err(e) => {
            warn!(order_uid = %uid, error = %e, "Lookup failed");
            error_response(StatusCode::SERVICE_UNAVAILABLE, "Order store unavailable")
        }
    }
}

/// GET /order?uid=...
#[instrument(skip(state))]
pub async fn get_order_by_query(
    Extension(state): Extension<Arc<AppState>>,
    Query(query): Query<OrderQuery>,
) -> Response {
    let uid = query.uid.unwrap_or_default();
    if uid.trim().is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "Order UID is required");
    }
    lookup(&state, &uid).await
}

/// GET /api/orders/:uid
#[instrument(skip(state))]
pub async fn get_order(
    Extension(state): Extension<Arc<AppState>>,
    Path(uid): Path<String>,
) -> Response {
    lookup(&state, &uid).await
}

/// GET /api/cache/stats
pub async fn cache_stats(Extension(state): Extension<Arc<AppState>>) -> Json<CacheStats> {
    Json(state.cache.stats())
}

/// DELETE /api/cache/:uid
#[instrument(skip(state))]
pub async fn evict_order(
    Extension(state): Extension<Arc<AppState>>,
    Path(uid): Path<String>,
) -> StatusCode {
    if state.cache.remove(&uid) {
        CACHE_ENTRIES.set(state.cache.len() as i64);
        debug!(order_uid = %uid, "Evicted order from cache");
        StatusCode::NO_CONTENT
    } else {
        StatusCode::NOT_FOUND
    }
}

/// Prometheus metrics endpoint
pub async fn metrics_endpoint() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        export_metrics(),
    )
}
