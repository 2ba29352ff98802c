//! Decode, validate, persist and cache incoming orders

use super::source::MessageSource;
use crate::cache::ShardedCache;
use crate::error::{Error, Result};
use crate::metrics::{record_store_op, CACHE_ENTRIES, INGESTED_MESSAGES};
use crate::model::{validate, Order};
use crate::storage::DurableStore;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// What happened to a single message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageOutcome {
    /// Persisted (or already present) and written to the cache
    Cached { redelivery: bool },
    /// Not a decodable order document
    Malformed,
    /// Decoded but failed validation
    Invalid,
    /// The durable store rejected the write; cache untouched
    PersistFailed,
}

impl MessageOutcome {
    fn label(&self) -> &'static str {
        match self {
            MessageOutcome::Cached { redelivery: false } => "cached",
            MessageOutcome::Cached { redelivery: true } => "redelivered",
            MessageOutcome::Malformed => "malformed",
            MessageOutcome::Invalid => "invalid",
            MessageOutcome::PersistFailed => "persist_failed",
        }
    }
}

/// Pipeline counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PipelineStats {
    pub received: u64,
    pub cached: u64,
    pub redelivered: u64,
    pub malformed: u64,
    pub invalid: u64,
    pub persist_failed: u64,
}

#[derive(Default)]
struct Counters {
    received: AtomicU64,
    cached: AtomicU64,
    redelivered: AtomicU64,
    malformed: AtomicU64,
    invalid: AtomicU64,
    persist_failed: AtomicU64,
}

/// Write-through ingestion of orders
pub struct IngestionPipeline {
    store: Arc<dyn DurableStore>,
    cache: Arc<ShardedCache>,
    shutdown: CancellationToken,
    counters: Counters,
}

impl IngestionPipeline {
    pub fn new(
        store: Arc<dyn DurableStore>,
        cache: Arc<ShardedCache>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            store,
            cache,
            shutdown,
            counters: Counters::default(),
        }
    }

    /// Snapshot of the counters
    pub fn stats(&self) -> PipelineStats {
        let c = &self.counters;
        PipelineStats {
            received: c.received.load(Ordering::Relaxed),
            cached: c.cached.load(Ordering::Relaxed),
            redelivered: c.redelivered.load(Ordering::Relaxed),
            malformed: c.malformed.load(Ordering::Relaxed),
            invalid: c.invalid.load(Ordering::Relaxed),
            persist_failed: c.persist_failed.load(Ordering::Relaxed),
        }
    }

    /// Consume `source` until it is exhausted or shutdown is signalled
    ///
    /// Cancellation is only observed while waiting for the next message;
    /// a message already received is always carried through.
    pub async fn run<S: MessageSource>(&self, mut source: S) -> Result<PipelineStats> {
        info!("Ingestion pipeline started");

        loop {
            let next = tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => {
                    info!("Shutdown signalled, stopping ingestion");
                    break;
                }
                next = source.next_message() => next,
            };

            match next {
                Ok(Some(payload)) => {
                    self.process(&payload).await;
                }
                Ok(None) => {
                    info!("Message source exhausted");
                    break;
                }
                Err(e) => {
                    error!(error = %e, "Message source failed");
                    return Err(match e {
                        e @ Error::Source(_) => e,
                        other => Error::Source(other.to_string()),
                    });
                }
            }
        }

        let stats = self.stats();
        info!(
            received = stats.received,
            cached = stats.cached,
            redelivered = stats.redelivered,
            malformed = stats.malformed,
            invalid = stats.invalid,
            persist_failed = stats.persist_failed,
            "Ingestion pipeline stopped"
        );
        Ok(stats)
    }

    /// Run one payload through decode, validate, persist and cache
    pub async fn process(&self, payload: &[u8]) -> MessageOutcome {
        self.counters.received.fetch_add(1, Ordering::Relaxed);

        let outcome = match self.handle(payload).await {
            Ok(redelivery) => MessageOutcome::Cached { redelivery },
            Err(Error::Decode(e)) => {
                warn!(error = %e, bytes = payload.len(), "Dropping malformed message");
                MessageOutcome::Malformed
            }
            Err(Error::Validation(violations)) => {
                warn!(fields = ?violations.fields(), "Dropping invalid order: {}", violations);
                MessageOutcome::Invalid
            }
            Err(_) => MessageOutcome::PersistFailed,
        };

        let counter = match outcome {
            MessageOutcome::Cached { redelivery: false } => &self.counters.cached,
            MessageOutcome::Cached { redelivery: true } => &self.counters.redelivered,
            MessageOutcome::Malformed => &self.counters.malformed,
            MessageOutcome::Invalid => &self.counters.invalid,
            MessageOutcome::PersistFailed => &self.counters.persist_failed,
        };
        counter.fetch_add(1, Ordering::Relaxed);
        INGESTED_MESSAGES.with_label_values(&[outcome.label()]).inc();
        outcome
    }

    /// Persist and cache one payload, returning whether it was a re-delivery
    async fn handle(&self, payload: &[u8]) -> Result<bool> {
        let order = admit(payload)?;
        let key = order.key().to_string();

        let put = self.store.put(&order).await;
        record_store_op("put", put.is_ok());
        let outcome = put.map_err(|e| {
            error!(order_uid = %key, error = %e, "Failed to persist order");
            e
        })?;

        if outcome.header_inserted {
            self.cache.set(&key, order);
            CACHE_ENTRIES.set(self.cache.len() as i64);
            debug!(order_uid = %key, items = outcome.items_written, "Order cached");
            return Ok(false);
        }

        // Re-delivery: the store kept its first copy, mirror that one
        let stored = self.store.get(&key).await;
        record_store_op("get", stored.is_ok());
        match stored {
            Ok(Some(stored)) => self.cache.set(&key, stored),
            Ok(None) => {
                warn!(order_uid = %key, "Re-delivered order missing from store, caching message copy");
                self.cache.set(&key, order);
            }
            Err(e) => {
                warn!(order_uid = %key, error = %e, "Failed to read back re-delivered order, caching message copy");
                self.cache.set(&key, order);
            }
        }
        CACHE_ENTRIES.set(self.cache.len() as i64);
        debug!(order_uid = %key, "Re-delivered order refreshed from store");
        Ok(true)
    }
}

/// Decode and validate one payload
fn admit(payload: &[u8]) -> Result<Order> {
    let order = Order::from_json(payload)?;
    validate(&order)?;
    Ok(order)
}

impl std::fmt::Debug for IngestionPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IngestionPipeline")
            .field("stats", &self.stats())
            .finish()
    }
}
