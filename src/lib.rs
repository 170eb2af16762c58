//! A typed, multi-tier content cache.
//!
//! Payloads move through three tiers on their way from a slow source
//! to a fast one: an in-memory LRU, an optional on-disk tier, and an
//! optional remote object-store tier. Reads check tiers in order and
//! promote hits upward; writes fan out to every enabled tier.
//!
//! # Modules
//!
//! - [`cache`]: the main `Cache<K, P, C>` handle
//! - [`codec`]: payload serialization contracts
//! - [`key`]: the `CacheKey` trait
//! - [`freshness`]: freshness predicates for reads
//! - [`object_store`]: the remote tier's storage contract
//! - [`config`]: construction parameters
//! - [`error`]: error types and handling

pub mod cache;
pub mod codec;
pub mod config;
pub mod error;
pub mod freshness;
pub mod key;
pub mod object_store;

mod entry;
mod file_store;
mod inflight;
mod reporter;
mod tiers;

pub use cache::{Cache, FetchCallback, FetchFuture};
pub use codec::{BytesCodec, Codec, JsonCodec, StringCodec};
pub use config::{CacheConfig, RemoteConfig};
pub use error::{Error, Result};
pub use freshness::Freshness;
pub use key::CacheKey;
pub use object_store::{InMemoryObjectStore, ObjectStore, RemoteRecord};
pub use reporter::ErrorReporter;

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name.
pub const NAME: &str = env!("CARGO_PKG_NAME");
