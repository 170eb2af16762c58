//! The remote tier's storage contract.
//!
//! `ObjectStore` is an external boundary: production implementations
//! talk to whatever record store a deployment already has. This crate
//! only ships [`InMemoryObjectStore`], useful for tests and for
//! exercising the remote tier without network dependencies.

use crate::error::{Error, Result};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// A record as stored by the remote tier. `inline` carries small
/// payloads directly; `asset` carries payloads that exceeded the
/// configured inline threshold. Exactly one should be set.
#[derive(Debug, Clone)]
pub struct RemoteRecord {
    pub id: String,
    pub inline: Option<Bytes>,
    pub asset: Option<Bytes>,
    pub modified_at: DateTime<Utc>,
}

impl RemoteRecord {
    pub fn bytes(&self) -> Option<&Bytes> {
        self.inline.as_ref().or(self.asset.as_ref())
    }
}

#[async_trait]
pub trait ObjectStore: Send + Sync + 'static {
    /// Fetches a record by id. Returns `Error::RemoteUnknownRecord`
    /// when no such record exists.
    async fn fetch(&self, id: &str) -> Result<RemoteRecord>;

    /// Creates or replaces a record.
    async fn upsert(&self, record: RemoteRecord) -> Result<()>;

    /// Deletes a record. Returns `Error::RemoteUnknownRecord` when no
    /// such record exists.
    async fn delete(&self, id: &str) -> Result<()>;

    /// Lists every record id belonging to `record_type`, for bulk clear.
    async fn query_ids(&self, record_type: &str) -> Result<Vec<String>>;
}

/// In-memory test double for [`ObjectStore`].
pub struct InMemoryObjectStore {
    records: parking_lot::Mutex<HashMap<String, RemoteRecord>>,
}

impl InMemoryObjectStore {
    pub fn new() -> Self {
        Self {
            records: parking_lot::Mutex::new(HashMap::new()),
        }
    }

    /// Directly inserts a record, bypassing `upsert`. Useful for
    /// seeding test fixtures.
    pub fn seed(&self, record: RemoteRecord) {
        self.records.lock().insert(record.id.clone(), record);
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for InMemoryObjectStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ObjectStore for InMemoryObjectStore {
    async fn fetch(&self, id: &str) -> Result<RemoteRecord> {
        self.records
            .lock()
            .get(id)
            .cloned()
            .ok_or(Error::RemoteUnknownRecord)
    }

    async fn upsert(&self, record: RemoteRecord) -> Result<()> {
        self.records.lock().insert(record.id.clone(), record);
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<()> {
        if self.records.lock().remove(id).is_none() {
            return Err(Error::RemoteUnknownRecord);
        }
        Ok(())
    }

    async fn query_ids(&self, record_type: &str) -> Result<Vec<String>> {
        let prefix = format!("{record_type}:");
        Ok(self
            .records
            .lock()
            .keys()
            .filter(|id| id.starts_with(&prefix))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, bytes: &[u8]) -> RemoteRecord {
        RemoteRecord {
            id: id.to_string(),
            inline: Some(Bytes::copy_from_slice(bytes)),
            asset: None,
            modified_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn fetch_missing_record_is_unknown() {
        let store = InMemoryObjectStore::new();
        let err = store.fetch("missing").await.unwrap_err();
        assert!(matches!(err, Error::RemoteUnknownRecord));
    }

    #[tokio::test]
    async fn upsert_then_fetch_round_trips() {
        let store = InMemoryObjectStore::new();
        store.upsert(record("avatars:1", b"data")).await.unwrap();
        let fetched = store.fetch("avatars:1").await.unwrap();
        assert_eq!(fetched.bytes().unwrap().as_ref(), b"data");
    }

    #[tokio::test]
    async fn query_ids_filters_by_prefix() {
        let store = InMemoryObjectStore::new();
        store.seed(record("avatars:1", b"a"));
        store.seed(record("avatars:2", b"b"));
        store.seed(record("thumbnails:1", b"c"));
        let mut ids = store.query_ids("avatars").await.unwrap();
        ids.sort();
        assert_eq!(ids, vec!["avatars:1".to_string(), "avatars:2".to_string()]);
    }
}
