// OrderCache - Rust Implementation
// Order ingestion with a sharded write-through cache

#![warn(rust_2018_idioms)]

pub mod app;
pub mod cache;
pub mod config;
pub mod ingest;
pub mod metrics;
pub mod model;
pub mod read_path;
pub mod server;
pub mod storage;
pub mod warmup;

// Re-exports for convenience
pub use cache::{CacheStats, ShardedCache};
pub use ingest::{IngestionPipeline, MessageSource};
pub use model::{Delivery, Item, Order, Payment};
pub use read_path::ReadPath;
pub use storage::{DurableStore, FileStore, ItemPolicy, MemoryStore, PutOutcome};
pub use warmup::{WarmupLoader, WarmupReport};

/// OrderCache error types
pub mod error {
    use crate::model::ValidationErrors;
    use thiserror::Error;

    #[derive(Error, Debug)]
    pub enum Error {
        #[error("Storage error: {0}")]
        Storage(String),

        #[error("Decode error: {0}")]
        Decode(#[from] serde_json::Error),

        #[error("Validation failed: {0}")]
        Validation(#[from] ValidationErrors),

        #[error("Message source error: {0}")]
        Source(String),

        #[error("Warmup error: {0}")]
        Warmup(String),

        #[error("Configuration error: {0}")]
        Config(String),

        #[error("Invalid argument: {0}")]
        InvalidArgument(String),

        #[error("I/O error: {0}")]
        Io(#[from] std::io::Error),
    }

    pub type Result<T> = std::result::Result<T, Error>;
}

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn test_version_format() {
        assert!(!VERSION.is_empty());
        assert_eq!(VERSION.split('.').count(), 3);
    }

    #[test]
    fn test_error_display() {
        let err = Error::Storage("disk full".to_string());
        assert_eq!(err.to_string(), "Storage error: disk full");

        let err = Error::InvalidArgument("empty uid".to_string());
        assert_eq!(err.to_string(), "Invalid argument: empty uid");
    }
}
