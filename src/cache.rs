//! The typed multi-tier cache.
//!
//! `Cache<K, P, C>` is a cheap-to-clone handle (an `Arc` around the
//! shared state) over three tiers: an in-memory LRU, an optional disk
//! tier, and an optional remote object-store tier. Reads check the
//! tiers in order and promote hits upward; writes fan out to every
//! enabled tier. The asynchronous path additionally supports a
//! user-supplied fetch callback and coalesces concurrent misses on
//! the same key into a single in-flight fetch.

use crate::codec::Codec;
use crate::config::CacheConfig;
use crate::error::{Error, Result};
use crate::freshness::Freshness;
use crate::inflight::InflightRegistry;
use crate::key::CacheKey;
use crate::reporter::{default_reporter, ErrorReporter};
use crate::tiers::disk::DiskTier;
use crate::tiers::memory::MemoryTier;
use crate::tiers::remote::RemoteTier;
use bytes::Bytes;
use chrono::Utc;
use parking_lot::RwLock;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// A boxed, owned future returned by a [`FetchCallback`].
pub type FetchFuture<P> =
    Pin<Box<dyn Future<Output = std::result::Result<Option<P>, anyhow::Error>> + Send>>;

/// A user-supplied fallback consulted by [`Cache::get_async`] when a
/// key misses every tier. Registered with [`Cache::set_fetch`].
pub type FetchCallback<K, P> = Arc<dyn Fn(K) -> FetchFuture<P> + Send + Sync>;

struct CacheInner<K, P, C>
where
    K: CacheKey,
    P: Clone + Send + Sync + 'static,
    C: Codec<Value = P>,
{
    codec: C,
    memory: MemoryTier<P>,
    disk: Option<DiskTier>,
    remote: Arc<RemoteTier>,
    inflight: Arc<InflightRegistry<P>>,
    reporter: RwLock<ErrorReporter>,
    fetch: RwLock<Option<FetchCallback<K, P>>>,
}

impl<K, P, C> CacheInner<K, P, C>
where
    K: CacheKey,
    P: Clone + Send + Sync + 'static,
    C: Codec<Value = P>,
{
    fn report(&self, error: &Error, context: &str) {
        (self.reporter.read())(error, context);
    }

    fn in_memory_cost(&self) -> u64 {
        self.memory.total_cost()
    }

    fn on_disk_cost(&self) -> u64 {
        self.disk.as_ref().map(|disk| disk.total_cost()).unwrap_or(0)
    }

    fn get(&self, key: &K, freshness: Freshness) -> Option<P> {
        if let Some(payload) = self.memory.get(key, &freshness) {
            return Some(payload);
        }
        let disk = self.disk.as_ref()?;
        match disk.get(key, self.codec.extension(), &freshness) {
            Ok(Some((bytes, cached_at))) => match self.codec.decode(&bytes) {
                Ok(payload) => {
                    let cost = self.codec.cost(&payload);
                    self.memory.put(key, payload.clone(), cost, cached_at);
                    Some(payload)
                }
                Err(e) => {
                    self.report(&e, &format!("decode failed for key {}", key.printable()));
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                self.report(&e, &format!("disk read failed for key {}", key.printable()));
                None
            }
        }
    }

    fn set(&self, key: &K, payload: Option<P>) {
        match payload {
            None => {
                self.memory.remove(key);
                if let Some(disk) = &self.disk {
                    if let Err(e) = disk.remove(key, self.codec.extension()) {
                        self.report(&e, &format!("disk remove failed for key {}", key.printable()));
                    }
                }
                self.spawn_remote_remove(key.clone());
            }
            Some(payload) => {
                let cost = self.codec.cost(&payload);
                let now = Utc::now();
                self.memory.put(key, payload.clone(), cost, now);
                match self.codec.encode(&payload) {
                    Ok(bytes) => {
                        if let Some(disk) = &self.disk {
                            if let Err(e) = disk.put(key, self.codec.extension(), &bytes) {
                                self.report(&e, &format!("disk write failed for key {}", key.printable()));
                            }
                        }
                        self.spawn_remote_put(key.clone(), bytes);
                    }
                    Err(e) => {
                        self.report(&e, &format!("encode failed for key {}", key.printable()));
                    }
                }
            }
        }
    }

    fn clear(&self, memory: bool, disk: bool) {
        if memory {
            self.memory.clear();
            self.inflight.cancel_all();
        }
        if disk {
            if let Some(disk_tier) = &self.disk {
                if let Err(e) = disk_tier.clear() {
                    self.report(&e, "disk clear failed");
                }
            }
        }
    }

    async fn clear_async(&self, memory: bool, disk: bool, remote: bool) -> Result<()> {
        self.clear(memory, disk);
        if remote {
            let reporter = self.reporter.read().clone();
            self.remote.clear(&reporter).await?;
        }
        Ok(())
    }

    fn spawn_remote_put(&self, key: K, bytes: Bytes) {
        let remote = Arc::clone(&self.remote);
        let reporter = self.reporter.read().clone();
        tokio::spawn(async move {
            remote.put(&key, bytes, &reporter).await;
        });
    }

    fn spawn_remote_remove(&self, key: K) {
        let remote = Arc::clone(&self.remote);
        let reporter = self.reporter.read().clone();
        tokio::spawn(async move {
            remote.remove(&key, &reporter).await;
        });
    }

    /// The body of the coalesced fetch task: try the remote tier,
    /// then the user fetch callback, populating memory and disk on
    /// success.
    async fn run_fetch(self: Arc<Self>, key: K, freshness: Freshness) -> Result<Option<P>> {
        if self.remote.is_enabled() {
            match self.remote.get(&key, &freshness).await {
                Ok(Some((bytes, cached_at))) => match self.codec.decode(&bytes) {
                    Ok(payload) => {
                        let cost = self.codec.cost(&payload);
                        self.memory.put(&key, payload.clone(), cost, cached_at);
                        if let Some(disk) = &self.disk {
                            if let Err(e) = disk.put(&key, self.codec.extension(), &bytes) {
                                self.report(&e, &format!("disk write failed for key {}", key.printable()));
                            }
                        }
                        return Ok(Some(payload));
                    }
                    Err(e) => {
                        self.report(&e, &format!("remote decode failed for key {}", key.printable()));
                    }
                },
                Ok(None) => {}
                Err(e) => return Err(e),
            }
        }

        let fetch = self.fetch.read().clone();
        let Some(fetch) = fetch else {
            return Ok(None);
        };

        match fetch(key.clone()).await {
            Ok(Some(payload)) => {
                let cost = self.codec.cost(&payload);
                let now = Utc::now();
                self.memory.put(&key, payload.clone(), cost, now);
                match self.codec.encode(&payload) {
                    Ok(bytes) => {
                        if let Some(disk) = &self.disk {
                            if let Err(e) = disk.put(&key, self.codec.extension(), &bytes) {
                                self.report(&e, &format!("disk write failed for key {}", key.printable()));
                            }
                        }
                        self.spawn_remote_put(key, bytes);
                    }
                    Err(e) => {
                        self.report(&e, &format!("encode failed for key {}", key.printable()));
                    }
                }
                Ok(Some(payload))
            }
            Ok(None) => Ok(None),
            Err(e) => Err(Error::FetchFailed(e.to_string())),
        }
    }

    async fn get_async(self: Arc<Self>, key: &K, freshness: Freshness) -> Result<Option<P>> {
        if let Some(payload) = self.get(key, freshness) {
            return Ok(Some(payload));
        }

        let has_fetch = self.fetch.read().is_some();
        if !self.remote.is_enabled() && !has_fetch {
            return Ok(None);
        }

        let printable = key.printable();
        let owned_key = key.clone();
        let inflight = Arc::clone(&self.inflight);
        let task_self = Arc::clone(&self);
        inflight
            .get_or_start(printable, move || task_self.run_fetch(owned_key, freshness))
            .await
    }
}

/// A typed, multi-tier content cache.
///
/// Cloning a `Cache` is cheap -- it shares the same underlying tiers
/// and in-flight registry, the same way `Arc` does.
pub struct Cache<K, P, C>
where
    K: CacheKey,
    P: Clone + Send + Sync + 'static,
    C: Codec<Value = P>,
{
    inner: Arc<CacheInner<K, P, C>>,
}

impl<K, P, C> Clone for Cache<K, P, C>
where
    K: CacheKey,
    P: Clone + Send + Sync + 'static,
    C: Codec<Value = P>,
{
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<K, P, C> Cache<K, P, C>
where
    K: CacheKey,
    P: Clone + Send + Sync + 'static,
    C: Codec<Value = P>,
{
    /// Builds a cache from a codec and a configuration. The disk tier
    /// is rebuilt from whatever is already on disk under
    /// `config.location`, if set.
    pub fn new(codec: C, config: CacheConfig) -> Result<Self> {
        if config.in_memory_limit == 0 {
            return Err(Error::Configuration(
                "in_memory_limit must be non-zero".to_string(),
            ));
        }
        let disk = match &config.location {
            Some(path) => {
                if config.on_disk_limit == 0 {
                    return Err(Error::Configuration(
                        "on_disk_limit must be non-zero when a disk location is set".to_string(),
                    ));
                }
                Some(DiskTier::new(path.clone(), config.on_disk_limit)?)
            }
            None => None,
        };

        Ok(Self {
            inner: Arc::new(CacheInner {
                codec,
                memory: MemoryTier::new(config.in_memory_limit),
                disk,
                remote: Arc::new(RemoteTier::new(config.remote)),
                inflight: InflightRegistry::new(),
                reporter: RwLock::new(default_reporter()),
                fetch: RwLock::new(None),
            }),
        })
    }

    /// Replaces the error reporter used for faults that are not
    /// propagated to the caller (LRU purges, background remote
    /// writes, decode failures on a fallthrough read).
    pub fn set_error_reporter(&self, reporter: ErrorReporter) {
        *self.inner.reporter.write() = reporter;
    }

    /// Registers the fallback consulted by [`Cache::get_async`] on a
    /// full miss.
    pub fn set_fetch(&self, fetch: FetchCallback<K, P>) {
        *self.inner.fetch.write() = Some(fetch);
    }

    /// Current cost charged against the memory tier's budget.
    pub fn in_memory_cost(&self) -> u64 {
        self.inner.in_memory_cost()
    }

    /// Current bytes charged against the disk tier's budget. Zero
    /// when no disk tier is configured.
    pub fn on_disk_cost(&self) -> u64 {
        self.inner.on_disk_cost()
    }

    /// Number of fetches currently in flight.
    pub fn inflight_count(&self) -> usize {
        self.inner.inflight.len()
    }

    /// Synchronous read: checks memory, then disk, promoting a disk
    /// hit into memory. Never touches the remote tier or the fetch
    /// callback. Local I/O failures are reported, not returned.
    pub fn get(&self, key: &K, freshness: Freshness) -> Option<P> {
        self.inner.get(key, freshness)
    }

    /// Synchronous write: `None` deletes the key from every tier;
    /// `Some` writes it to memory and disk and fires a background
    /// remote write.
    pub fn set(&self, key: &K, payload: Option<P>) {
        self.inner.set(key, payload)
    }

    /// Asynchronous read: falls through memory, disk, the remote
    /// tier, and finally the registered fetch callback, coalescing
    /// concurrent misses on the same key.
    pub async fn get_async(&self, key: &K, freshness: Freshness) -> Result<Option<P>> {
        self.inner.clone().get_async(key, freshness).await
    }

    /// Clears the memory and/or disk tiers synchronously. Clearing
    /// the memory tier also cancels every in-flight fetch, so a fetch
    /// started before the clear cannot silently repopulate it after.
    pub fn clear(&self, memory: bool, disk: bool) {
        self.inner.clear(memory, disk)
    }

    /// As [`Cache::clear`], additionally clearing every remote record
    /// under this cache's record type.
    pub async fn clear_async(&self, memory: bool, disk: bool, remote: bool) -> Result<()> {
        self.inner.clear_async(memory, disk, remote).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::BytesCodec;
    use crate::object_store::InMemoryObjectStore;
    use crate::object_store::RemoteRecord;
    use crate::reporter::ErrorReporter;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tempfile::TempDir;

    fn memory_only_cache() -> Cache<String, Bytes, BytesCodec> {
        Cache::new(
            BytesCodec,
            CacheConfig {
                location: None,
                in_memory_limit: 1024,
                on_disk_limit: 0,
                remote: None,
            },
        )
        .unwrap()
    }

    #[tokio::test]
    async fn get_set_round_trips_through_memory() {
        let cache = memory_only_cache();
        let key = "a".to_string();
        cache.set(&key, Some(Bytes::from_static(b"hello")));
        assert_eq!(cache.get(&key, Freshness::ALWAYS), Some(Bytes::from_static(b"hello")));
    }

    #[tokio::test]
    async fn set_none_deletes() {
        let cache = memory_only_cache();
        let key = "a".to_string();
        cache.set(&key, Some(Bytes::from_static(b"hello")));
        cache.set(&key, None);
        assert_eq!(cache.get(&key, Freshness::ALWAYS), None);
    }

    #[tokio::test]
    async fn disk_hit_promotes_into_memory() {
        let dir = TempDir::new().unwrap();
        let cache: Cache<String, Bytes, BytesCodec> = Cache::new(
            BytesCodec,
            CacheConfig {
                location: Some(dir.path().to_path_buf()),
                in_memory_limit: 1024,
                on_disk_limit: 1024,
                remote: None,
            },
        )
        .unwrap();

        let key = "a".to_string();
        cache.set(&key, Some(Bytes::from_static(b"hello")));
        cache.clear(true, false);
        assert_eq!(cache.in_memory_cost(), 0);

        let value = cache.get(&key, Freshness::ALWAYS);
        assert_eq!(value, Some(Bytes::from_static(b"hello")));
        assert_eq!(cache.in_memory_cost(), 5);
    }

    #[tokio::test]
    async fn get_async_falls_back_to_fetch_callback() {
        let cache = memory_only_cache();
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_for_fetch = Arc::clone(&calls);
        cache.set_fetch(Arc::new(move |key: String| {
            let calls = Arc::clone(&calls_for_fetch);
            Box::pin(async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(Some(Bytes::from(format!("fetched:{key}"))))
            })
        }));

        let result = cache.get_async(&"a".to_string(), Freshness::ALWAYS).await.unwrap();
        assert_eq!(result, Some(Bytes::from_static(b"fetched:a")));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        // Now served from memory without calling fetch again.
        let result = cache.get_async(&"a".to_string(), Freshness::ALWAYS).await.unwrap();
        assert_eq!(result, Some(Bytes::from_static(b"fetched:a")));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn concurrent_get_async_coalesces_fetch() {
        let cache = memory_only_cache();
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_for_fetch = Arc::clone(&calls);
        cache.set_fetch(Arc::new(move |_key: String| {
            let calls = Arc::clone(&calls_for_fetch);
            Box::pin(async move {
                calls.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(50)).await;
                Ok(Some(Bytes::from_static(b"value")))
            })
        }));

        let key = "a".to_string();
        let (r1, r2) = tokio::join!(
            cache.get_async(&key, Freshness::ALWAYS),
            cache.get_async(&key, Freshness::ALWAYS)
        );
        assert_eq!(r1.unwrap(), Some(Bytes::from_static(b"value")));
        assert_eq!(r2.unwrap(), Some(Bytes::from_static(b"value")));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn get_async_reads_through_remote_tier() {
        let store = Arc::new(InMemoryObjectStore::new());
        store.seed(RemoteRecord {
            id: "avatars:a".to_string(),
            inline: Some(Bytes::from_static(b"from-remote")),
            asset: None,
            modified_at: Utc::now(),
        });

        let cache: Cache<String, Bytes, BytesCodec> = Cache::new(
            BytesCodec,
            CacheConfig {
                location: None,
                in_memory_limit: 1024,
                on_disk_limit: 0,
                remote: Some(crate::config::RemoteConfig::new(
                    Arc::clone(&store) as Arc<dyn crate::object_store::ObjectStore>,
                    "avatars",
                )),
            },
        )
        .unwrap();

        let result = cache.get_async(&"a".to_string(), Freshness::ALWAYS).await.unwrap();
        assert_eq!(result, Some(Bytes::from_static(b"from-remote")));
    }

    #[tokio::test]
    async fn fetch_failure_is_propagated() {
        let cache = memory_only_cache();
        cache.set_fetch(Arc::new(|_key: String| {
            Box::pin(async move { Err(anyhow::anyhow!("upstream unavailable")) })
        }));
        let err = cache
            .get_async(&"a".to_string(), Freshness::ALWAYS)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::FetchFailed(_)));
    }

    #[tokio::test]
    async fn clear_memory_cancels_inflight_and_empties_memory() {
        let cache = memory_only_cache();
        cache.set(&"a".to_string(), Some(Bytes::from_static(b"hi")));
        cache.clear(true, false);
        assert_eq!(cache.in_memory_cost(), 0);
        assert_eq!(cache.get(&"a".to_string(), Freshness::ALWAYS), None);
    }

    #[test]
    fn error_reporter_receives_decode_failures() {
        use crate::codec::StringCodec;

        let dir = TempDir::new().unwrap();
        let cache: Cache<String, String, StringCodec> = Cache::new(
            StringCodec,
            CacheConfig {
                location: Some(dir.path().to_path_buf()),
                in_memory_limit: 1024,
                on_disk_limit: 1024,
                remote: None,
            },
        )
        .unwrap();

        let reported = Arc::new(AtomicUsize::new(0));
        let flag = Arc::clone(&reported);
        let reporter: ErrorReporter = Arc::new(move |_, _| {
            flag.fetch_add(1, Ordering::SeqCst);
        });
        cache.set_error_reporter(reporter);

        // Write invalid UTF-8 straight to the backing file, bypassing
        // the codec, so the next read trips a decode failure.
        let path = dir.path().join("corrupt.txt");
        std::fs::write(&path, [0xff, 0xfe]).unwrap();

        assert_eq!(cache.get(&"corrupt".to_string(), Freshness::ALWAYS), None);
        assert_eq!(reported.load(Ordering::SeqCst), 1);
    }
}
