//! In-memory order store
//!
//! Keeps the four order tables in memory. Used by tests and by the binary
//! when no data directory is configured. Failure switches let tests exercise
//! the error paths of the components that consume a [`DurableStore`].

use super::tables::Tables;
use super::{DurableStore, ItemPolicy, PutOutcome};
use crate::error::{Error, Result};
use crate::model::Order;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// Row counts per table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowCounts {
    pub orders: usize,
    pub delivery: usize,
    pub payment: usize,
    pub items: usize,
}

#[derive(Default)]
struct Faults {
    fail_puts: AtomicBool,
    fail_gets: AtomicBool,
    fail_listing: AtomicBool,
    fail_ping: AtomicBool,
    failing_keys: Mutex<HashSet<String>>,
}

/// In-memory order store
#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
    item_policy: ItemPolicy,
    faults: Arc<Faults>,
    get_calls: Arc<AtomicU64>,
}

impl MemoryStore {
    /// Create an empty store with the default item policy
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty store with a specific item policy
    pub fn with_item_policy(item_policy: ItemPolicy) -> Self {
        Self {
            item_policy,
            ..Self::default()
        }
    }

    pub fn item_policy(&self) -> ItemPolicy {
        self.item_policy
    }

    /// Number of stored orders
    pub fn len(&self) -> usize {
        self.tables.lock().order_count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn row_counts(&self) -> RowCounts {
        let tables = self.tables.lock();
        RowCounts {
            orders: tables.order_count(),
            delivery: tables.delivery_count(),
            payment: tables.payment_count(),
            items: tables.total_item_count(),
        }
    }

    /// Item rows stored for one key
    pub fn item_count(&self, key: &str) -> usize {
        self.tables.lock().item_count(key)
    }

    /// How many times `get` has been called
    pub fn get_calls(&self) -> u64 {
        self.get_calls.load(Ordering::Relaxed)
    }

    /// Clear all data
    pub fn clear(&self) {
        *self.tables.lock() = Tables::new();
    }

    /// Make every `put` fail
    pub fn fail_puts(&self, fail: bool) {
        self.faults.fail_puts.store(fail, Ordering::SeqCst);
    }

    /// Make every `get` fail
    pub fn fail_gets(&self, fail: bool) {
        self.faults.fail_gets.store(fail, Ordering::SeqCst);
    }

    /// Make `list_recent_keys` fail
    pub fn fail_listing(&self, fail: bool) {
        self.faults.fail_listing.store(fail, Ordering::SeqCst);
    }

    /// Make `ping` fail
    pub fn fail_ping(&self, fail: bool) {
        self.faults.fail_ping.store(fail, Ordering::SeqCst);
    }

    /// Make `get` fail for one key only
    pub fn fail_key(&self, key: &str) {
        self.faults.failing_keys.lock().insert(key.to_string());
    }

    fn check(flag: &AtomicBool, op: &str) -> Result<()> {
        if flag.load(Ordering::SeqCst) {
            Err(Error::Storage(format!("injected {} failure", op)))
        } else {
            Ok(())
        }
    }
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("item_policy", &self.item_policy)
            .finish()
    }
}

#[async_trait]
impl DurableStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Order>> {
        self.get_calls.fetch_add(1, Ordering::Relaxed);
        Self::check(&self.faults.fail_gets, "get")?;
        if self.faults.failing_keys.lock().contains(key) {
            return Err(Error::Storage(format!("injected get failure for {}", key)));
        }
        self.tables.lock().get(key)
    }

    async fn put(&self, order: &Order) -> Result<PutOutcome> {
        Self::check(&self.faults.fail_puts, "put")?;
        let mut tables = self.tables.lock();
        let mutation = tables.plan_put(order, self.item_policy);
        Ok(tables.apply(mutation))
    }

    async fn list_recent_keys(&self, limit: usize) -> Result<Vec<String>> {
        Self::check(&self.faults.fail_listing, "list")?;
        Ok(self.tables.lock().recent_keys(limit))
    }

    async fn ping(&self) -> Result<()> {
        Self::check(&self.faults.fail_ping, "ping")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::order::sample_order;

    #[tokio::test]
    async fn test_memory_store_basic_ops() -> Result<()> {
        let store = MemoryStore::new();
        let order = sample_order("key1");

        let outcome = store.put(&order).await?;
        assert!(outcome.header_inserted);

        let retrieved = store.get("key1").await?;
        assert_eq!(retrieved, Some(order));
        assert_eq!(store.get("missing").await?, None);
        assert_eq!(store.get_calls(), 2);

        store.clear();
        assert!(store.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_duplicate_put_is_noop() -> Result<()> {
        let store = MemoryStore::new();
        let order = sample_order("dup");

        store.put(&order).await?;
        let outcome = store.put(&order).await?;

        assert!(outcome.is_duplicate());
        assert_eq!(
            store.row_counts(),
            RowCounts {
                orders: 1,
                delivery: 1,
                payment: 1,
                items: 1
            }
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_append_policy_duplicates_items() -> Result<()> {
        let store = MemoryStore::with_item_policy(ItemPolicy::Append);
        let order = sample_order("dup-append");

        store.put(&order).await?;
        store.put(&order).await?;

        assert_eq!(store.item_count("dup-append"), 2);
        assert_eq!(store.row_counts().orders, 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_injected_failures() -> Result<()> {
        let store = MemoryStore::new();
        store.put(&sample_order("f-1")).await?;

        store.fail_puts(true);
        assert!(matches!(
            store.put(&sample_order("f-2")).await,
            Err(Error::Storage(_))
        ));
        store.fail_puts(false);

        store.fail_gets(true);
        assert!(store.get("f-1").await.is_err());
        store.fail_gets(false);

        store.fail_key("f-1");
        assert!(store.get("f-1").await.is_err());

        store.fail_listing(true);
        assert!(store.list_recent_keys(10).await.is_err());

        store.fail_ping(true);
        assert!(store.ping().await.is_err());
        Ok(())
    }

    #[tokio::test]
    async fn test_clones_share_tables() -> Result<()> {
        let store = MemoryStore::new();
        let other = store.clone();

        store.put(&sample_order("shared")).await?;
        assert!(other.get("shared").await?.is_some());
        Ok(())
    }
}
