//! Startup cache warmup
//!
//! Loads the most recent orders from the durable store into the cache before
//! ingestion and the HTTP surface start. Individual failures are skipped; only
//! failing to enumerate candidates is reported as an error, and callers treat
//! even that as non-fatal.

use crate::cache::ShardedCache;
use crate::error::{Error, Result};
use crate::metrics::{record_store_op, CACHE_ENTRIES, WARMUP_LOADED};
use crate::storage::DurableStore;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Default number of recent orders loaded at startup
pub const DEFAULT_WARMUP_WINDOW: usize = 30;

/// Result of a warmup run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WarmupReport {
    pub candidates: usize,
    pub loaded: usize,
    pub failed: usize,
    pub elapsed: Duration,
}

pub struct WarmupLoader {
    store: Arc<dyn DurableStore>,
    cache: Arc<ShardedCache>,
    window: usize,
}

impl WarmupLoader {
    pub fn new(store: Arc<dyn DurableStore>, cache: Arc<ShardedCache>, window: usize) -> Self {
        Self {
            store,
            cache,
            window,
        }
    }

    pub fn window(&self) -> usize {
        self.window
    }

    /// Populate the cache with up to `window` of the newest orders
    pub async fn load(&self) -> Result<WarmupReport> {
        let start = Instant::now();
        info!(window = self.window, "Warming up order cache");

        let listed = self.store.list_recent_keys(self.window).await;
        record_store_op("list_recent_keys", listed.is_ok());
        let keys = listed.map_err(|e| Error::Warmup(format!("Failed to list recent orders: {}", e)))?;

        let mut loaded = 0;
        let mut failed = 0;
        for key in &keys {
            let fetched = self.store.get(key).await;
            record_store_op("get", fetched.is_ok());
            match fetched {
                Ok(Some(order)) => {
                    self.cache.set(key, order);
                    loaded += 1;
                    debug!(order_uid = %key, "Warmed order");
                }
                Ok(None) => {
                    warn!(order_uid = %key, "Listed order vanished before load, skipping");
                    failed += 1;
                }
                Err(e) => {
                    warn!(order_uid = %key, error = %e, "Failed to load order, skipping");
                    failed += 1;
                }
            }
        }

        CACHE_ENTRIES.set(self.cache.len() as i64);
        WARMUP_LOADED.set(loaded as i64);

        let report = WarmupReport {
            candidates: keys.len(),
            loaded,
            failed,
            elapsed: start.elapsed(),
        };
        info!(
            candidates = report.candidates,
            loaded = report.loaded,
            failed = report.failed,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "Cache warmup complete"
        );
        Ok(report)
    }
}
