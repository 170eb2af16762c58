//! The in-memory tier.
//!
//! A sharded LRU earns its keep when many tenants hammer one shared
//! cache. Each [`crate::Cache`] owns exactly one memory tier, so
//! sharding would be an abstraction with nothing to shard: a single
//! `RwLock<IndexMap<..>>` plus an `AtomicU64` running total is enough.

use crate::entry::MemoryEntry;
use crate::freshness::Freshness;
use crate::key::CacheKey;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};

pub(crate) struct MemoryTier<P> {
    entries: RwLock<IndexMap<String, MemoryEntry<P>>>,
    total_cost: AtomicU64,
    limit: u64,
}

impl<P: Clone> MemoryTier<P> {
    pub fn new(limit: u64) -> Self {
        Self {
            entries: RwLock::new(IndexMap::new()),
            total_cost: AtomicU64::new(0),
            limit,
        }
    }

    pub fn total_cost(&self) -> u64 {
        self.total_cost.load(Ordering::Relaxed)
    }

    pub fn get<K: CacheKey>(&self, key: &K, freshness: &Freshness) -> Option<P> {
        let printable = key.printable();
        let mut entries = self.entries.write();
        let entry = entries.get_mut(&printable)?;
        if !freshness.passes(entry.cached_at) {
            return None;
        }
        entry.accessed_at = Utc::now();
        Some(entry.payload.clone())
    }

    pub fn put<K: CacheKey>(&self, key: &K, payload: P, cost: u64, cached_at: DateTime<Utc>) {
        let printable = key.printable();
        let mut entries = self.entries.write();
        if let Some(old) = entries.swap_remove(&printable) {
            self.total_cost.fetch_sub(old.cost, Ordering::Relaxed);
        }
        entries.insert(
            printable,
            MemoryEntry {
                payload,
                cost,
                cached_at,
                accessed_at: cached_at,
            },
        );
        self.total_cost.fetch_add(cost, Ordering::Relaxed);
        if self.total_cost.load(Ordering::Relaxed) > self.limit {
            self.purge_to_locked(&mut entries, (self.limit * 3) / 4);
        }
    }

    pub fn remove<K: CacheKey>(&self, key: &K) {
        let printable = key.printable();
        let mut entries = self.entries.write();
        if let Some(old) = entries.swap_remove(&printable) {
            self.total_cost.fetch_sub(old.cost, Ordering::Relaxed);
        }
    }

    pub fn clear(&self) {
        let mut entries = self.entries.write();
        entries.clear();
        self.total_cost.store(0, Ordering::Relaxed);
    }

    /// Evicts least-recently-accessed entries until `target` is reached.
    fn purge_to_locked(&self, entries: &mut IndexMap<String, MemoryEntry<P>>, target: u64) {
        let mut order: Vec<(String, DateTime<Utc>)> = entries
            .iter()
            .map(|(k, v)| (k.clone(), v.accessed_at))
            .collect();
        order.sort_by_key(|(_, accessed_at)| *accessed_at);

        let mut total = self.total_cost.load(Ordering::Relaxed);
        for (key, _) in order {
            if total <= target {
                break;
            }
            if let Some(removed) = entries.swap_remove(&key) {
                total = total.saturating_sub(removed.cost);
                self.total_cost.store(total, Ordering::Relaxed);
            }
        }
    }
}
