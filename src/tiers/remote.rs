//! The remote tier.
//!
//! Writes and deletes against the remote object store never block the
//! caller that triggered them -- they are fired into the background
//! and any failure is handed to the error reporter instead of
//! propagated. Reads are the exception: a caller that explicitly asks
//! for the remote tier (via `get_async` falling through memory and
//! disk) waits for the result.

use crate::config::RemoteConfig;
use crate::error::{Error, Result};
use crate::freshness::Freshness;
use crate::key::CacheKey;
use crate::object_store::RemoteRecord;
use crate::reporter::ErrorReporter;
use bytes::Bytes;
use chrono::{DateTime, Utc};

pub(crate) struct RemoteTier {
    config: Option<RemoteConfig>,
}

impl RemoteTier {
    pub fn new(config: Option<RemoteConfig>) -> Self {
        Self { config }
    }

    pub fn is_enabled(&self) -> bool {
        self.config.is_some()
    }

    fn record_id<K: CacheKey>(&self, config: &RemoteConfig, key: &K) -> String {
        format!("{}:{}", config.record_type, key.printable())
    }

    pub async fn get<K: CacheKey>(
        &self,
        key: &K,
        freshness: &Freshness,
    ) -> Result<Option<(Bytes, DateTime<Utc>)>> {
        let Some(config) = &self.config else {
            return Ok(None);
        };
        let id = self.record_id(config, key);
        let record = match config.store.fetch(&id).await {
            Ok(record) => record,
            Err(Error::RemoteUnknownRecord) => return Ok(None),
            Err(e) => return Err(e),
        };
        if !freshness.passes(record.modified_at) {
            return Ok(None);
        }
        Ok(record.bytes().map(|bytes| (bytes.clone(), record.modified_at)))
    }

    pub async fn put<K: CacheKey>(&self, key: &K, bytes: Bytes, reporter: &ErrorReporter) {
        let Some(config) = &self.config else {
            return;
        };
        let id = self.record_id(config, key);
        let (inline, asset) = if (bytes.len() as u64) >= config.asset_limit {
            (None, Some(bytes))
        } else {
            (Some(bytes), None)
        };
        let record = RemoteRecord {
            id: id.clone(),
            inline,
            asset,
            modified_at: Utc::now(),
        };
        if let Err(e) = config.store.upsert(record).await {
            reporter(&e, &format!("remote put failed for {id}"));
        }
    }

    pub async fn remove<K: CacheKey>(&self, key: &K, reporter: &ErrorReporter) {
        let Some(config) = &self.config else {
            return;
        };
        let id = self.record_id(config, key);
        if let Err(e) = config.store.delete(&id).await {
            if !matches!(e, Error::RemoteUnknownRecord) {
                reporter(&e, &format!("remote delete failed for {id}"));
            }
        }
    }

    pub async fn clear(&self, reporter: &ErrorReporter) -> Result<()> {
        let Some(config) = &self.config else {
            return Ok(());
        };
        let ids = config.store.query_ids(&config.record_type).await?;
        for id in ids {
            if let Err(e) = config.store.delete(&id).await {
                reporter(&e, &format!("remote clear delete failed for {id}"));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object_store::{InMemoryObjectStore, ObjectStore};
    use crate::reporter::default_reporter;
    use std::sync::Arc;

    fn config(store: Arc<dyn ObjectStore>) -> RemoteConfig {
        RemoteConfig::new(store, "avatars").with_asset_limit(1024)
    }

    #[tokio::test]
    async fn disabled_tier_is_always_a_miss() {
        let tier = RemoteTier::new(None);
        assert!(!tier.is_enabled());
        let result = tier.get(&"a".to_string(), &Freshness::ALWAYS).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn put_then_get_round_trips() {
        let store = Arc::new(InMemoryObjectStore::new());
        let tier = RemoteTier::new(Some(config(Arc::clone(&store) as Arc<dyn ObjectStore>)));
        let reporter = default_reporter();
        tier.put(&"user-1".to_string(), Bytes::from_static(b"hi"), &reporter).await;
        let (bytes, _) = tier.get(&"user-1".to_string(), &Freshness::ALWAYS).await.unwrap().unwrap();
        assert_eq!(bytes.as_ref(), b"hi");
    }

    #[tokio::test]
    async fn large_payloads_go_to_asset() {
        let store = Arc::new(InMemoryObjectStore::new());
        let tier = RemoteTier::new(Some(
            RemoteConfig::new(Arc::clone(&store) as Arc<dyn ObjectStore>, "avatars").with_asset_limit(4),
        ));
        let reporter = default_reporter();
        tier.put(&"user-1".to_string(), Bytes::from_static(b"too-large"), &reporter).await;
        let record = store.fetch("avatars:user-1").await.unwrap();
        assert!(record.inline.is_none());
        assert!(record.asset.is_some());
    }

    #[tokio::test]
    async fn remove_missing_record_does_not_report() {
        let store = Arc::new(InMemoryObjectStore::new());
        let tier = RemoteTier::new(Some(config(Arc::clone(&store) as Arc<dyn ObjectStore>)));
        let reported = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let flag = Arc::clone(&reported);
        let reporter: ErrorReporter = Arc::new(move |_, _| {
            flag.store(true, std::sync::atomic::Ordering::SeqCst);
        });
        tier.remove(&"missing".to_string(), &reporter).await;
        assert!(!reported.load(std::sync::atomic::Ordering::SeqCst));
    }
}
