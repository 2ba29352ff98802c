//! Durable storage layer
//!
//! # Architecture
//!
//! The service persists every order before it becomes visible in the cache.
//! Storage is reached only through the [`DurableStore`] trait:
//!
//! ```text
//! DurableStore
//!   ├─→ get(uid)                → full order or None
//!   ├─→ put(order)              → insert-if-absent per table, items per ItemPolicy
//!   ├─→ list_recent_keys(limit) → newest date_created first
//!   └─→ ping()                  → reachability check at startup
//! ```
//!
//! ## Implementations
//!
//! - [`MemoryStore`]: in-memory tables with fault injection, for tests and
//!   throwaway runs
//! - [`FileStore`]: the same tables rebuilt on open from an append-only,
//!   checksummed log

pub mod file;
pub mod memory;
pub mod tables;

pub use file::FileStore;
pub use memory::{MemoryStore, RowCounts};

use crate::error::Result;
use crate::model::Order;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// How a put treats the item rows of an order whose key is already stored
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemPolicy {
    /// Write items only when the key has no item rows yet (idempotent re-delivery)
    #[default]
    InsertIfAbsent,
    /// Append items on every put, duplicating rows on re-delivery
    Append,
}

/// What a single put actually wrote
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct PutOutcome {
    pub header_inserted: bool,
    pub delivery_inserted: bool,
    pub payment_inserted: bool,
    pub items_written: usize,
}

impl PutOutcome {
    /// True when the put wrote nothing at all
    pub fn is_duplicate(&self) -> bool {
        !self.header_inserted
            && !self.delivery_inserted
            && !self.payment_inserted
            && self.items_written == 0
    }
}

/// Durable order store
#[async_trait]
pub trait DurableStore: Send + Sync {
    /// Fetch a full order (header, delivery, payment and items)
    async fn get(&self, key: &str) -> Result<Option<Order>>;

    /// Persist an order
    ///
    /// Header, delivery and payment rows are inserted only if absent.
    async fn put(&self, order: &Order) -> Result<PutOutcome>;

    /// Keys of the most recently created orders, newest first
    async fn list_recent_keys(&self, limit: usize) -> Result<Vec<String>>;

    /// Check that the store is reachable
    async fn ping(&self) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_outcome_duplicate() {
        assert!(PutOutcome::default().is_duplicate());

        let outcome = PutOutcome {
            items_written: 1,
            ..Default::default()
        };
        assert!(!outcome.is_duplicate());
    }

    #[test]
    fn test_item_policy_serde() {
        let policy: ItemPolicy = serde_json::from_str("\"append\"").unwrap();
        assert_eq!(policy, ItemPolicy::Append);
        assert_eq!(
            serde_json::to_string(&ItemPolicy::InsertIfAbsent).unwrap(),
            "\"insert_if_absent\""
        );
    }
}
