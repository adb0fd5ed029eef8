//! File-backed order persistence.
//!
//! # Layout
//!
//! One pretty-printed JSON record per order:
//!
//! ```text
//! $ORDER_STORAGE_DIR/
//! ├── HO-1718000000000-3fa9c2d1.json
//! ├── HO-1718000012345-0b77e410.json
//! └── ...
//! ```
//!
//! Filenames come from [`OrderId::storage_key`], never from the raw
//! identifier. Writes land in a temporary file in the same directory and are
//! renamed over the record, so a crash never leaves a truncated order.
//!
//! Read-modify-write sequences that must not interleave (payment
//! confirmation, reconciliation) take [`OrderStore::lock`] first.

mod locks;

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use rand::Rng;
use thiserror::Error;
use tracing::{debug, instrument, warn};

use silvertape_core::{Order, OrderId, OrderPatch};

pub use locks::OrderGuard;
use locks::OrderLocks;

const RECORD_EXTENSION: &str = "json";

/// Errors that can occur during order store operations.
#[derive(Debug, Error)]
pub enum OrderStoreError {
    /// Filesystem error (permission denied, disk full, ...).
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A record could not be encoded, or a stored record is corrupt.
    #[error("data corruption: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The order ID contains no filesystem-safe characters.
    #[error("invalid order key: {0:?}")]
    InvalidKey(String),
}

/// Durable order records, one file per order.
///
/// Cheaply cloneable; clones share the per-order lock table.
#[derive(Clone)]
pub struct OrderStore {
    inner: Arc<OrderStoreInner>,
}

struct OrderStoreInner {
    dir: PathBuf,
    locks: OrderLocks,
}

impl OrderStore {
    /// Create a store rooted at `dir`. The directory is created on first write.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            inner: Arc::new(OrderStoreInner {
                dir: dir.into(),
                locks: OrderLocks::new(),
            }),
        }
    }

    /// Directory holding the order records.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.inner.dir
    }

    fn record_path(&self, key: &str) -> PathBuf {
        self.inner.dir.join(format!("{key}.{RECORD_EXTENSION}"))
    }

    /// Persist an order, replacing any existing record with the same ID.
    ///
    /// # Errors
    ///
    /// Returns `OrderStoreError::InvalidKey` if the ID has no safe characters,
    /// or an I/O / serialization error if the write fails.
    #[instrument(skip(self, order), fields(order_id = %order.order_id))]
    pub async fn save(&self, order: &Order) -> Result<(), OrderStoreError> {
        let key = order.order_id.storage_key();
        if key.is_empty() {
            return Err(OrderStoreError::InvalidKey(order.order_id.to_string()));
        }

        tokio::fs::create_dir_all(&self.inner.dir).await?;

        let body = serde_json::to_vec_pretty(order)?;
        let suffix: u64 = rand::rng().random();
        let tmp_path = self.inner.dir.join(format!(".{key}.{suffix:016x}.tmp"));

        if let Err(e) = tokio::fs::write(&tmp_path, &body).await {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(e.into());
        }
        if let Err(e) = tokio::fs::rename(&tmp_path, self.record_path(&key)).await {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(e.into());
        }

        debug!(status = %order.status, "order saved");
        Ok(())
    }

    /// Load an order.
    ///
    /// Returns `Ok(None)` when no record exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the record exists but cannot be read or parsed.
    #[instrument(skip(self))]
    pub async fn get(&self, order_id: &OrderId) -> Result<Option<Order>, OrderStoreError> {
        let key = order_id.storage_key();
        if key.is_empty() {
            return Ok(None);
        }

        match tokio::fs::read(self.record_path(&key)).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Merge `patch` into the stored order, stamp `updatedAt`, and write it back.
    ///
    /// Returns `Ok(None)` when no record exists. Callers that need the read
    /// and the write to be atomic with respect to other requests must hold
    /// [`OrderStore::lock`] for the order.
    ///
    /// # Errors
    ///
    /// Returns an error if reading or writing the record fails.
    #[instrument(skip(self, patch), fields(status = ?patch.status))]
    pub async fn update(
        &self,
        order_id: &OrderId,
        patch: OrderPatch,
    ) -> Result<Option<Order>, OrderStoreError> {
        let Some(mut order) = self.get(order_id).await? else {
            return Ok(None);
        };

        order.apply(patch, Utc::now());
        self.save(&order).await?;
        Ok(Some(order))
    }

    /// Load every readable order record, oldest first.
    ///
    /// Corrupt records are skipped with a warning so one bad file does not
    /// hide the rest.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory exists but cannot be listed.
    #[instrument(skip(self))]
    pub async fn list(&self) -> Result<Vec<Order>, OrderStoreError> {
        let mut entries = match tokio::fs::read_dir(&self.inner.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut orders = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let is_record = path.extension().is_some_and(|ext| ext == RECORD_EXTENSION)
                && !entry.file_name().to_string_lossy().starts_with('.');
            if !is_record {
                continue;
            }

            let bytes = match tokio::fs::read(&path).await {
                Ok(bytes) => bytes,
                // Removed between listing and reading.
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };
            match serde_json::from_slice::<Order>(&bytes) {
                Ok(order) => orders.push(order),
                Err(e) => warn!(path = %path.display(), error = %e, "skipping unreadable order record"),
            }
        }

        orders.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(orders)
    }

    /// Acquire the exclusive lock for one order.
    ///
    /// Held for the whole read-check-write sequence; released on drop.
    pub async fn lock(&self, order_id: &OrderId) -> OrderGuard {
        self.inner.locks.acquire(&order_id.storage_key()).await
    }

    /// Verify the storage directory exists (creating it) and is writable.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the directory cannot be created or is read-only.
    pub async fn check_writable(&self) -> Result<(), OrderStoreError> {
        tokio::fs::create_dir_all(&self.inner.dir).await?;
        let metadata = tokio::fs::metadata(&self.inner.dir).await?;
        if metadata.permissions().readonly() {
            return Err(std::io::Error::new(
                ErrorKind::PermissionDenied,
                "order storage directory is read-only",
            )
            .into());
        }
        Ok(())
    }
}
