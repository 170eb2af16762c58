//! The on-disk tier.
//!
//! Every operation here is synchronous `std::fs` I/O, which keeps the
//! cache's synchronous `get`/`set` path usable from any context,
//! including inside an already-running async executor (a blocking
//! `tokio::fs` call there would panic). The async fetch path tolerates
//! the same short blocking calls; disk I/O for a single entry is not
//! expensive enough to warrant `spawn_blocking`.

use crate::error::Result;
use crate::file_store::FileStore;
use crate::freshness::Freshness;
use crate::key::{sanitize, CacheKey};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

pub(crate) struct DiskTier {
    store: FileStore,
    total_cost: AtomicU64,
    limit: u64,
}

impl DiskTier {
    pub fn new(root: impl Into<PathBuf>, limit: u64) -> Result<Self> {
        let store = FileStore::new(root)?;
        let total: u64 = store.enumerate()?.iter().map(|f| f.size).sum();
        Ok(Self {
            store,
            total_cost: AtomicU64::new(total),
            limit,
        })
    }

    pub fn total_cost(&self) -> u64 {
        self.total_cost.load(Ordering::Relaxed)
    }

    fn path_for<K: CacheKey>(&self, key: &K, extension: &str) -> PathBuf {
        let name = sanitize(&key.printable());
        self.store.root().join(format!("{name}.{extension}"))
    }

    pub fn get<K: CacheKey>(
        &self,
        key: &K,
        extension: &str,
        freshness: &Freshness,
    ) -> Result<Option<(Bytes, DateTime<Utc>)>> {
        let path = self.path_for(key, extension);
        let info = match self.store.stat(&path)? {
            Some(info) => info,
            None => return Ok(None),
        };
        if !freshness.passes(info.created_at) {
            return Ok(None);
        }
        let bytes = self.store.read(&path)?;
        self.store.touch_atime(&path)?;
        Ok(Some((bytes, info.created_at)))
    }

    pub fn put<K: CacheKey>(&self, key: &K, extension: &str, bytes: &[u8]) -> Result<()> {
        let path = self.path_for(key, extension);
        if let Some(existing) = self.store.stat(&path)? {
            self.total_cost.fetch_sub(existing.size, Ordering::Relaxed);
        }
        self.store.write(&path, bytes)?;
        self.total_cost
            .fetch_add(bytes.len() as u64, Ordering::Relaxed);
        if self.total_cost.load(Ordering::Relaxed) > self.limit {
            self.purge_to((self.limit * 3) / 4)?;
        }
        Ok(())
    }

    pub fn remove<K: CacheKey>(&self, key: &K, extension: &str) -> Result<()> {
        let path = self.path_for(key, extension);
        if let Some(info) = self.store.stat(&path)? {
            self.store.delete(&path)?;
            self.total_cost.fetch_sub(info.size, Ordering::Relaxed);
        }
        Ok(())
    }

    pub fn clear(&self) -> Result<()> {
        self.store.clear()?;
        self.total_cost.store(0, Ordering::Relaxed);
        Ok(())
    }

    fn purge_to(&self, target: u64) -> Result<()> {
        let mut files = self.store.enumerate()?;
        files.sort_by_key(|f| f.accessed_at);

        let mut total = self.total_cost.load(Ordering::Relaxed);
        for file in files {
            if total <= target {
                break;
            }
            self.store.delete(&file.path)?;
            total = total.saturating_sub(file.size);
            self.total_cost.store(total, Ordering::Relaxed);
        }
        Ok(())
    }
}
