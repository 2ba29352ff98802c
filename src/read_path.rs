//! Cache-aside order lookups

use crate::cache::ShardedCache;
use crate::error::{Error, Result};
use crate::metrics::{record_store_op, CACHE_ENTRIES, CACHE_LOOKUPS, LOOKUP_DURATION};
use crate::model::Order;
use crate::storage::DurableStore;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, instrument};

/// Cache first, durable store on a miss
#[derive(Clone)]
pub struct ReadPath {
    cache: Arc<ShardedCache>,
    store: Arc<dyn DurableStore>,
}

impl ReadPath {
    pub fn new(cache: Arc<ShardedCache>, store: Arc<dyn DurableStore>) -> Self {
        Self { cache, store }
    }

    pub fn cache(&self) -> &Arc<ShardedCache> {
        &self.cache
    }

    /// Find an order by key
    ///
    /// `Ok(None)` when neither the cache nor the store has it. A store hit is
    /// written into the cache before returning.
    #[instrument(skip(self))]
    pub async fn lookup(&self, key: &str) -> Result<Option<Order>> {
        if key.is_empty() {
            return Err(Error::InvalidArgument("order uid must not be empty".to_string()));
        }

        let start = Instant::now();
        if let Some(order) = self.cache.get(key) {
            CACHE_LOOKUPS.with_label_values(&["hit"]).inc();
            observe("cache", start);
            return Ok(Some(order));
        }
        CACHE_LOOKUPS.with_label_values(&["miss"]).inc();

        let fetched = self.store.get(key).await;
        record_store_op("get", fetched.is_ok());
        match fetched {
            Ok(Some(order)) => {
                self.cache.set(key, order.clone());
                CACHE_ENTRIES.set(self.cache.len() as i64);
                debug!(order_uid = %key, "Loaded order from store into cache");
                observe("store", start);
                Ok(Some(order))
            }
            Ok(None) => {
                observe("none", start);
                Ok(None)
            }
            Err(e) => {
                error!(order_uid = %key, error = %e, "Store lookup failed");
                observe("none", start);
                Err(match e {
                    e @ Error::Storage(_) => e,
                    other => Error::Storage(other.to_string()),
                })
            }
        }
    }
}

fn observe(source: &str, start: Instant) {
    LOOKUP_DURATION
        .with_label_values(&[source])
        .observe(start.elapsed().as_secs_f64());
}

impl std::fmt::Debug for ReadPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReadPath").field("cache", &self.cache).finish()
    }
}
