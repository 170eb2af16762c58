//! Error reporting hook.
//!
//! Local I/O and remote faults encountered off the caller's critical
//! path (LRU purges, background remote writes, decode failures on a
//! read that can fall through to a lower tier) are never propagated as
//! `Err` -- they are handed to a reporter instead. The default
//! reporter logs through `tracing`; callers that want metrics or
//! alerting wire their own with [`crate::Cache::set_error_reporter`].

use crate::error::Error;
use std::sync::Arc;

pub type ErrorReporter = Arc<dyn Fn(&Error, &str) + Send + Sync>;

pub(crate) fn default_reporter() -> ErrorReporter {
    Arc::new(|err, context| {
        tracing::warn!(error = %err, context, "cache error reported");
    })
}
