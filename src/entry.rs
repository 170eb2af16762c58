//! Memory tier entry record.

use chrono::{DateTime, Utc};

#[derive(Debug, Clone)]
pub(crate) struct MemoryEntry<P> {
    pub payload: P,
    pub cost: u64,
    pub cached_at: DateTime<Utc>,
    pub accessed_at: DateTime<Utc>,
}
