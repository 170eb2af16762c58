//! Freshness predicates.
//!
//! A [`Freshness`] value decides whether a cached entry is usable
//! without re-fetching. Both bounds are optional and compose: an
//! entry must satisfy every bound that is set.

use chrono::{DateTime, Utc};
use std::time::Duration;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Freshness {
    pub max_age: Option<Duration>,
    pub newer_than: Option<DateTime<Utc>>,
}

impl Freshness {
    /// No freshness requirement -- any cached entry is accepted.
    pub const ALWAYS: Freshness = Freshness {
        max_age: None,
        newer_than: None,
    };

    pub fn max_age(max_age: Duration) -> Self {
        Self {
            max_age: Some(max_age),
            newer_than: None,
        }
    }

    pub fn newer_than(instant: DateTime<Utc>) -> Self {
        Self {
            max_age: None,
            newer_than: Some(instant),
        }
    }

    /// `Duration::ZERO` always fails, regardless of how recently the
    /// entry was cached -- it means "never accept a cached copy".
    pub(crate) fn passes(&self, cached_at: DateTime<Utc>) -> bool {
        if let Some(newer_than) = self.newer_than {
            if cached_at < newer_than {
                return false;
            }
        }
        if let Some(max_age) = self.max_age {
            if max_age.is_zero() {
                return false;
            }
            if let Ok(max_age) = chrono::Duration::from_std(max_age) {
                let elapsed = (Utc::now() - cached_at).abs();
                if elapsed > max_age {
                    return false;
                }
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;

    #[test]
    fn always_passes_anything() {
        let ancient = Utc::now() - ChronoDuration::days(3650);
        assert!(Freshness::ALWAYS.passes(ancient));
    }

    #[test]
    fn zero_max_age_never_passes() {
        let fresh = Freshness::max_age(Duration::ZERO);
        assert!(!fresh.passes(Utc::now()));
    }

    #[test]
    fn max_age_rejects_stale_entries() {
        let fresh = Freshness::max_age(Duration::from_millis(50));
        let cached_at = Utc::now() - ChronoDuration::milliseconds(200);
        assert!(!fresh.passes(cached_at));
    }

    #[test]
    fn max_age_accepts_recent_entries() {
        let fresh = Freshness::max_age(Duration::from_secs(60));
        assert!(fresh.passes(Utc::now()));
    }

    #[test]
    fn newer_than_rejects_older_entries() {
        let threshold = Utc::now();
        let cached_at = threshold - ChronoDuration::seconds(1);
        let fresh = Freshness::newer_than(threshold);
        assert!(!fresh.passes(cached_at));
    }
}
