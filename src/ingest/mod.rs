//! Order ingestion
//!
//! # Architecture
//!
//! ```text
//! MessageSource ──bytes──→ IngestionPipeline
//!                            ├─→ decode   (serde_json → Order)
//!                            ├─→ validate (model::validate)
//!                            ├─→ persist  (DurableStore::put)
//!                            └─→ cache    (ShardedCache::set)
//! ```
//!
//! A message that fails any step is logged and dropped; the loop moves on to
//! the next one. Nothing is retried. The cache is only written after the
//! store accepted the order, so every cached order reached through this path
//! is durable.
//!
//! ## Sources
//!
//! - [`ChannelSource`]: in-process `tokio::sync::mpsc` channel
//! - [`LineSource`]: one JSON document per line from a file, stdin or any
//!   other `AsyncBufRead`

pub mod pipeline;
pub mod source;

pub use pipeline::{IngestionPipeline, MessageOutcome, PipelineStats};
pub use source::{ChannelSource, LineSource, MessageSource};
