//! Prometheus metrics
//!
//! Features:
//! - Cache metrics (lookups by result, entry count)
//! - Ingestion metrics (messages by outcome)
//! - Store metrics (operations by kind and status)
//! - Lookup latency by the layer that answered

use lazy_static::lazy_static;
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};
use std::sync::Once;
use tracing::{error, info};

lazy_static! {
    /// Global metrics registry
    pub static ref METRICS_REGISTRY: Registry = Registry::new();

    pub static ref CACHE_LOOKUPS: IntCounterVec = IntCounterVec::new(
        Opts::new("ordercache_cache_lookups_total", "Cache lookups by result"),
        &["result"]
    ).expect("valid metric definition");

    pub static ref CACHE_ENTRIES: IntGauge = IntGauge::new(
        "ordercache_cache_entries",
        "Number of orders held in the cache"
    ).expect("valid metric definition");

    pub static ref INGESTED_MESSAGES: IntCounterVec = IntCounterVec::new(
        Opts::new("ordercache_ingested_messages_total", "Ingested messages by outcome"),
        &["outcome"]
    ).expect("valid metric definition");

    pub static ref STORE_OPERATIONS: IntCounterVec = IntCounterVec::new(
        Opts::new("ordercache_store_operations_total", "Durable store operations"),
        &["operation", "status"]
    ).expect("valid metric definition");

    pub static ref LOOKUP_DURATION: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            "ordercache_lookup_duration_seconds",
            "Lookup duration in seconds"
        ).buckets(vec![0.00001, 0.0001, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0]),
        &["source"]
    ).expect("valid metric definition");

    pub static ref WARMUP_LOADED: IntGauge = IntGauge::new(
        "ordercache_warmup_loaded",
        "Orders loaded into the cache by the last warmup"
    ).expect("valid metric definition");
}

static INIT: Once = Once::new();

/// Register all metrics with the global registry
pub fn init_metrics() {
    INIT.call_once(|| {
        info!("Initializing Prometheus metrics");

        METRICS_REGISTRY.register(Box::new(CACHE_LOOKUPS.clone())).ok();
        METRICS_REGISTRY.register(Box::new(CACHE_ENTRIES.clone())).ok();
        METRICS_REGISTRY.register(Box::new(INGESTED_MESSAGES.clone())).ok();
        METRICS_REGISTRY.register(Box::new(STORE_OPERATIONS.clone())).ok();
        METRICS_REGISTRY.register(Box::new(LOOKUP_DURATION.clone())).ok();
        METRICS_REGISTRY.register(Box::new(WARMUP_LOADED.clone())).ok();
    });
}

/// Record a durable store call
pub fn record_store_op(operation: &str, success: bool) {
    let status = if success { "success" } else { "error" };
    STORE_OPERATIONS
        .with_label_values(&[operation, status])
        .inc();
}

/// Export metrics in Prometheus text format
pub fn export_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = METRICS_REGISTRY.gather();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        error!(error = %e, "Failed to encode metrics");
        return String::from("# Error encoding metrics\n");
    }

    String::from_utf8(buffer).unwrap_or_else(|_| String::from("# Error converting metrics\n"))
}
