use crate::app::config::CacheConfig;
use crate::core::clock;
use crate::core::models::advertisement::CachedAdvertisement;
use chrono::{DateTime, TimeDelta, Utc};

/// Decides which cached entries may be handed out right now.
/// An entry is eligible while it is younger than the cache
/// duration, has usage left, and is inside its business validity
#[derive(Debug, Clone, Copy)]
pub struct ValidityFilter {
    cache_duration: TimeDelta,
    max_usage_count: u32,
}

impl ValidityFilter {
    pub fn new(cache_duration: TimeDelta, max_usage_count: u32) -> Self {
        ValidityFilter {
            cache_duration,
            max_usage_count,
        }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(clock::delta(config.cache_duration), config.max_usage_count)
    }

    pub fn is_eligible(&self, entry: &CachedAdvertisement, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(entry.fetched_at) < self.cache_duration
            && entry.usage_count < self.max_usage_count
            && entry.valid_until() > now
    }

    /// The eligible subset of `entries`, in store order
    pub fn eligible<'a>(
        &self,
        entries: &'a [CachedAdvertisement],
        now: DateTime<Utc>,
    ) -> Vec<&'a CachedAdvertisement> {
        entries
            .iter()
            .filter(|e| self.is_eligible(e, now))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ads::store::tests::{cached, epoch};

    fn filter() -> ValidityFilter {
        ValidityFilter::new(TimeDelta::minutes(5), 3)
    }

    #[test]
    fn test_fresh_entry_is_eligible() {
        let entry = cached("a", epoch());
        assert!(filter().is_eligible(&entry, epoch()));
        assert!(filter().is_eligible(&entry, epoch() + TimeDelta::seconds(299)));
    }

    #[test]
    fn test_cache_age_expiry_is_exclusive() {
        let entry = cached("a", epoch());
        assert!(!filter().is_eligible(&entry, epoch() + TimeDelta::minutes(5)));
        assert!(!filter().is_eligible(&entry, epoch() + TimeDelta::minutes(6)));
    }

    #[test]
    fn test_usage_exhaustion() {
        let mut entry = cached("a", epoch());
        entry.usage_count = 2;
        assert!(filter().is_eligible(&entry, epoch()));

        entry.usage_count = 3;
        assert!(!filter().is_eligible(&entry, epoch()));
    }

    #[test]
    fn test_business_expiry_wins_over_freshness() {
        let mut entry = cached("a", epoch());
        entry.ad.valid_until = epoch() - TimeDelta::seconds(1);
        assert!(!filter().is_eligible(&entry, epoch()));

        entry.ad.valid_until = epoch();
        assert!(!filter().is_eligible(&entry, epoch()));
    }

    #[test]
    fn test_eligible_subset_keeps_order() {
        let mut used = cached("used", epoch());
        used.usage_count = 3;
        let entries = vec![
            cached("a", epoch()),
            used,
            cached("stale", epoch() - TimeDelta::minutes(10)),
            cached("b", epoch()),
        ];

        let ids: Vec<&str> = filter()
            .eligible(&entries, epoch())
            .iter()
            .map(|e| e.id())
            .collect();

        assert_eq!(ids, vec!["a", "b"]);
    }
}
