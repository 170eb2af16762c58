//! Cache configuration surface.

use crate::object_store::ObjectStore;
use std::path::PathBuf;
use std::sync::Arc;

/// Top-level construction parameters for a [`crate::Cache`].
pub struct CacheConfig {
    /// Root directory for the disk tier. `None` disables the disk tier.
    pub location: Option<PathBuf>,
    /// Total cost budget for the memory tier.
    pub in_memory_limit: u64,
    /// Total byte budget for the disk tier. Ignored when `location` is `None`.
    pub on_disk_limit: u64,
    /// Remote object store backing, if any.
    pub remote: Option<RemoteConfig>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            location: None,
            in_memory_limit: 100 * 1024 * 1024,
            on_disk_limit: 1024 * 1024 * 1024,
            remote: None,
        }
    }
}

/// Remote tier configuration: the object store to use, the logical
/// record type this cache stores under, and the threshold above which
/// a payload is written as the record's asset rather than inlined.
#[derive(Clone)]
pub struct RemoteConfig {
    pub store: Arc<dyn ObjectStore>,
    pub record_type: String,
    pub asset_limit: u64,
}

impl RemoteConfig {
    pub fn new(store: Arc<dyn ObjectStore>, record_type: impl Into<String>) -> Self {
        Self {
            store,
            record_type: record_type.into(),
            asset_limit: 64 * 1024,
        }
    }

    pub fn with_asset_limit(mut self, asset_limit: u64) -> Self {
        self.asset_limit = asset_limit;
        self
    }
}
