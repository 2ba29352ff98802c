//! Append-only file store
//!
//! Every put that changes the tables is appended to a single log file as a
//! checksummed frame and fsynced before the in-memory tables are updated.
//! Opening the store replays the log.
//!
//! # Log Format
//!
//! ```text
//! [4-byte length LE][mutation JSON][4-byte crc32 LE]
//! [4-byte length LE][mutation JSON][4-byte crc32 LE]
//! ...
//! ```
//!
//! Recovery: frames are applied in order. A truncated or corrupt final frame
//! (a write interrupted by a crash) is cut off with a warning; a corrupt
//! frame followed by more data is an error.
//!
//! A put whose write or sync fails truncates the log back to its length
//! before the write, so a failed put leaves nothing behind for replay. If
//! that truncate fails too the store is poisoned and refuses further puts.

use super::tables::{Mutation, Tables};
use super::{DurableStore, ItemPolicy, PutOutcome};
use crate::error::{Error, Result};
use crate::model::Order;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

const LOG_FILE_NAME: &str = "orders.log";
const FRAME_OVERHEAD: usize = 8;

struct Inner {
    tables: Tables,
    log: File,
    /// Length of the log up to the last durable frame
    log_len: u64,
    poisoned: bool,
    #[cfg(test)]
    faults: Faults,
}

#[cfg(test)]
#[derive(Default)]
struct Faults {
    /// Write this many bytes of the next frame, then fail
    short_write: Option<usize>,
    /// Write the next frame in full, then fail the sync
    fail_sync: bool,
    fail_rollback: bool,
}

impl Inner {
    fn append(&mut self, frame: &[u8]) -> io::Result<()> {
        #[cfg(test)]
        {
            if let Some(n) = self.faults.short_write.take() {
                self.log.write_all(&frame[..n.min(frame.len())])?;
                return Err(io::Error::new(io::ErrorKind::Other, "short write"));
            }
            if std::mem::take(&mut self.faults.fail_sync) {
                self.log.write_all(frame)?;
                return Err(io::Error::new(io::ErrorKind::Other, "sync failed"));
            }
        }

        self.log.write_all(frame)?;
        self.log.sync_data()
    }

    /// Cut the log back to the last durable frame
    fn rollback(&mut self) -> io::Result<()> {
        #[cfg(test)]
        if self.faults.fail_rollback {
            return Err(io::Error::new(io::ErrorKind::Other, "truncate failed"));
        }

        self.log.set_len(self.log_len)?;
        self.log.sync_all()
    }
}

/// File-backed order store
pub struct FileStore {
    log_path: PathBuf,
    item_policy: ItemPolicy,
    inner: Mutex<Inner>,
}

impl FileStore {
    /// Open (or create) a store in `dir` with the default item policy
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Self> {
        Self::open_with_policy(dir, ItemPolicy::default())
    }

    /// Open (or create) a store in `dir`
    pub fn open_with_policy<P: AsRef<Path>>(dir: P, item_policy: ItemPolicy) -> Result<Self> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)
            .map_err(|e| Error::Storage(format!("Failed to create data dir: {}", e)))?;

        let log_path = dir.join(LOG_FILE_NAME);
        info!(path = ?log_path, "Opening order log");

        let tables = Self::recover(&log_path)?;

        let log = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)
            .map_err(|e| Error::Storage(format!("Failed to open log: {}", e)))?;
        let log_len = log
            .metadata()
            .map_err(|e| Error::Storage(format!("Failed to stat log: {}", e)))?
            .len();

        Ok(Self {
            log_path,
            item_policy,
            inner: Mutex::new(Inner {
                tables,
                log,
                log_len,
                poisoned: false,
                #[cfg(test)]
                faults: Faults::default(),
            }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.log_path
    }

    /// Number of stored orders
    pub fn len(&self) -> usize {
        self.inner.lock().tables.order_count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Item rows stored for one key
    pub fn item_count(&self, key: &str) -> usize {
        self.inner.lock().tables.item_count(key)
    }

    /// True once a failed put could not be rolled back
    pub fn is_poisoned(&self) -> bool {
        self.inner.lock().poisoned
    }

    /// Rebuild the tables from the log, cutting off a torn tail
    fn recover(log_path: &Path) -> Result<Tables> {
        let mut tables = Tables::new();
        if !log_path.exists() {
            info!("No order log found, starting fresh");
            return Ok(tables);
        }

        let bytes = std::fs::read(log_path)
            .map_err(|e| Error::Storage(format!("Failed to read log: {}", e)))?;

        let mut offset = 0usize;
        let mut frames = 0usize;
        while offset < bytes.len() {
            match decode_frame(&bytes[offset..]) {
                FrameRead::Complete(mutation, len) => {
                    tables.apply(mutation);
                    offset += len;
                    frames += 1;
                }
                FrameRead::Truncated => {
                    warn!(
                        offset,
                        dropped = bytes.len() - offset,
                        "Truncated frame at end of order log, discarding"
                    );
                    break;
                }
                FrameRead::Corrupt(len, reason) => {
                    if offset + len >= bytes.len() {
                        warn!(offset, %reason, "Corrupt final frame in order log, discarding");
                        break;
                    }
                    return Err(Error::Storage(format!(
                        "Corrupt frame at offset {}: {}",
                        offset, reason
                    )));
                }
            }
        }

        if offset < bytes.len() {
            let file = OpenOptions::new()
                .write(true)
                .open(log_path)
                .map_err(|e| Error::Storage(format!("Failed to open log: {}", e)))?;
            file.set_len(offset as u64)
                .map_err(|e| Error::Storage(format!("Failed to truncate log: {}", e)))?;
            file.sync_all()
                .map_err(|e| Error::Storage(format!("Failed to sync log: {}", e)))?;
        }

        info!(
            frames,
            orders = tables.order_count(),
            "Order log recovery complete"
        );
        Ok(tables)
    }
}

impl std::fmt::Debug for FileStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileStore")
            .field("log_path", &self.log_path)
            .field("item_policy", &self.item_policy)
            .finish()
    }
}

#[async_trait]
impl DurableStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<Order>> {
        self.inner.lock().tables.get(key)
    }

    async fn put(&self, order: &Order) -> Result<PutOutcome> {
        let mut inner = self.inner.lock();
        if inner.poisoned {
            return Err(Error::Storage(
                "Order log is unusable after a failed rollback".to_string(),
            ));
        }

        let mutation = inner.tables.plan_put(order, self.item_policy);
        if mutation.is_empty() {
            return Ok(PutOutcome::default());
        }

        let frame = encode_frame(&mutation)?;
        if let Err(e) = inner.append(&frame) {
            warn!(order_uid = %order.key(), error = %e, "Failed to append order frame, rolling back");
            if let Err(rollback_err) = inner.rollback() {
                error!(
                    path = ?self.log_path,
                    error = %rollback_err,
                    "Failed to roll back order log, refusing further writes"
                );
                inner.poisoned = true;
            }
            return Err(Error::Storage(format!("Failed to append frame: {}", e)));
        }
        inner.log_len += frame.len() as u64;

        debug!(order_uid = %order.key(), frame_len = frame.len(), "Appended order frame");
        Ok(inner.tables.apply(mutation))
    }

    async fn list_recent_keys(&self, limit: usize) -> Result<Vec<String>> {
        Ok(self.inner.lock().tables.recent_keys(limit))
    }

    async fn ping(&self) -> Result<()> {
        if self.inner.lock().poisoned {
            return Err(Error::Storage("Order log is poisoned".to_string()));
        }
        std::fs::metadata(&self.log_path)
            .map(|_| ())
            .map_err(|e| Error::Storage(format!("Order log unavailable: {}", e)))
    }
}

enum FrameRead {
    Complete(Mutation, usize),
    Truncated,
    Corrupt(usize, String),
}

fn encode_frame(mutation: &Mutation) -> Result<Vec<u8>> {
    let json = serde_json::to_vec(mutation)
        .map_err(|e| Error::Storage(format!("Failed to serialize mutation: {}", e)))?;

    let mut frame = Vec::with_capacity(json.len() + FRAME_OVERHEAD);
    frame.extend_from_slice(&(json.len() as u32).to_le_bytes());
    frame.extend_from_slice(&json);
    frame.extend_from_slice(&crc32fast::hash(&json).to_le_bytes());
    Ok(frame)
}

fn decode_frame(bytes: &[u8]) -> FrameRead {
    if bytes.len() < 4 {
        return FrameRead::Truncated;
    }
    let len = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as usize;
    let total = len + FRAME_OVERHEAD;
    if bytes.len() < total {
        return FrameRead::Truncated;
    }

    let json = &bytes[4..4 + len];
    let stored = u32::from_le_bytes([
        bytes[4 + len],
        bytes[5 + len],
        bytes[6 + len],
        bytes[7 + len],
    ]);
    if stored != crc32fast::hash(json) {
        return FrameRead::Corrupt(total, "checksum mismatch".to_string());
    }

    match serde_json::from_slice(json) {
        Ok(mutation) => FrameRead::Complete(mutation, total),
        Err(e) => FrameRead::Corrupt(total, e.to_string()),
    }
}
