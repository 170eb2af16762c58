//! Single-flight fetch coalescing.
//!
//! Concurrent misses on the same key must not trigger concurrent
//! fetches: the first caller starts the fetch task, every other caller
//! joins its [`futures::future::Shared`] clone and receives the same
//! outcome. A generation counter guards cleanup: if the registry is
//! cleared (cancelling every in-flight task) while a just-aborted
//! task's cleanup closure is still in flight, it must not delete a
//! fresh entry that raced in under the same key.

use crate::error::Error;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::future::{BoxFuture, FutureExt, Shared};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::task::{AbortHandle, JoinHandle};

type FetchOutput<P> = Result<Option<P>, Error>;
type SharedFetch<P> = Shared<BoxFuture<'static, FetchOutput<P>>>;

struct InflightEntry<P> {
    shared: SharedFetch<P>,
    abort_handle: AbortHandle,
    generation: u64,
}

pub(crate) struct InflightRegistry<P> {
    entries: DashMap<String, InflightEntry<P>>,
    next_generation: AtomicU64,
}

impl<P: Clone + Send + Sync + 'static> InflightRegistry<P> {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            entries: DashMap::new(),
            next_generation: AtomicU64::new(0),
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Joins an existing fetch for `key`, or starts a new one by
    /// spawning `task_factory()`. Every concurrent caller for the same
    /// key observes the same result.
    pub async fn get_or_start<F, Fut>(self: &Arc<Self>, key: String, task_factory: F) -> FetchOutput<P>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = FetchOutput<P>> + Send + 'static,
    {
        // The entry slot must be claimed before anything is spawned: if
        // two callers both raced past a `get` miss and both spawned a
        // task, the loser's task would already be running (possibly to
        // completion, on another worker thread) by the time it learns
        // it lost and aborts itself. Resolving the slot first means a
        // losing caller never spawns a task at all.
        let shared = match self.entries.entry(key.clone()) {
            Entry::Occupied(occupied) => occupied.get().shared.clone(),
            Entry::Vacant(vacant) => {
                let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
                let handle: JoinHandle<FetchOutput<P>> = tokio::spawn(task_factory());
                let abort_handle = handle.abort_handle();

                let registry = Arc::clone(self);
                let cleanup_key = key;
                let shared: SharedFetch<P> = async move {
                    let outcome = match handle.await {
                        Ok(result) => result,
                        Err(join_err) if join_err.is_cancelled() => Err(Error::Cancelled),
                        Err(join_err) => Err(Error::Internal(join_err.to_string())),
                    };
                    registry
                        .entries
                        .remove_if(&cleanup_key, |_, entry| entry.generation == generation);
                    outcome
                }
                .boxed()
                .shared();

                vacant.insert(InflightEntry {
                    shared: shared.clone(),
                    abort_handle,
                    generation,
                });
                shared
            }
        };
        shared.await
    }

    /// Aborts every in-flight task and drops its bookkeeping. Used by
    /// `Cache::clear` on the memory tier, since a purged memory entry
    /// should not be silently repopulated by a fetch that started
    /// before the clear.
    pub fn cancel_all(&self) {
        for entry in self.entries.iter() {
            entry.abort_handle.abort();
        }
        self.entries.clear();
    }
}
