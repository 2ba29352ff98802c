//! In-memory order cache
//!
//! # Architecture
//!
//! ```text
//! ShardedCache
//!   ├─→ Shard 0   RwLock<HashMap<uid, Order>>
//!   ├─→ Shard 1   RwLock<HashMap<uid, Order>>
//!   ├─→ ...
//!   └─→ Shard N-1 RwLock<HashMap<uid, Order>>
//!
//! shard(uid) = xxh3(uid) & (N - 1)
//! ```
//!
//! Each shard is locked independently: readers of one shard never block
//! readers or writers of another. `get_all` walks the shards one by one and
//! therefore returns a snapshot that is consistent per shard only.
//!
//! Entries are never evicted; they leave the cache through `remove` or when
//! the process exits.

pub mod sharded;

pub use sharded::{CacheStats, ShardedCache, DEFAULT_SHARD_COUNT};
