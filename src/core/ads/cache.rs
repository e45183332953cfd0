use crate::app::config::CacheConfig;
use crate::core::ads::coordinator::FetchCoordinator;
use crate::core::ads::selection::SelectionPolicy;
use crate::core::ads::source::AdSource;
use crate::core::ads::store::CacheStore;
use crate::core::ads::validity::ValidityFilter;
use crate::core::clock::{self, Clock};
use crate::core::models::advertisement::CachedAdvertisement;
use crate::core::observability::metrics;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

/// Point in time view of the cache, for operators
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CacheStats {
    pub cached: usize,
    pub eligible: usize,
    pub loading: bool,
    pub last_fetch: Option<DateTime<Utc>>,
}

/// Rotating advertisement cache shared by every consumer of the
/// process. Never fails towards callers: a failed fetch shows up
/// as no advertisement or a short list
pub struct AdvertisementCache {
    store: Mutex<CacheStore>,
    coordinator: FetchCoordinator,
    validity: ValidityFilter,
    selection: SelectionPolicy,
    clock: Arc<dyn Clock>,
}

impl AdvertisementCache {
    pub fn new(config: &CacheConfig, source: Arc<dyn AdSource>, clock: Arc<dyn Clock>) -> Self {
        AdvertisementCache {
            store: Mutex::new(CacheStore::new(config.max_size)),
            coordinator: FetchCoordinator::new(
                source,
                clock.clone(),
                clock::delta(config.min_fetch_interval),
            ),
            validity: ValidityFilter::from_config(config),
            selection: SelectionPolicy::new(config.candidate_pool),
            clock,
        }
    }

    /// One advertisement favouring the least used ones, fetching
    /// when nothing is eligible and the throttle allows it
    pub async fn random_advertisement(&self) -> Option<CachedAdvertisement> {
        if let Some(ad) = self.take_one() {
            return Some(ad);
        }

        // failures are already logged by the coordinator
        if self.coordinator.fetch_if_permitted(&self.store).await.is_none() {
            debug!("No eligible advertisement and fetch throttled");
            return None;
        }

        self.take_one()
    }

    /// Up to `count` distinct advertisements. Fewer come back when
    /// the cache cannot cover the request even after a fetch
    pub async fn multiple_advertisements(&self, count: usize) -> Vec<CachedAdvertisement> {
        if count == 0 {
            return Vec::new();
        }

        if self.eligible_count() < count {
            // failures are already logged by the coordinator, serve what is cached
            if let Some(Err(e)) = self.coordinator.fetch_if_permitted(&self.store).await {
                debug!("Serving {} advertisements from cache after failed fetch: {}", count, e);
            }
        }

        self.take_many(count)
    }

    /// Drops every cached entry and fetches a new batch,
    /// ignoring the fetch throttle
    pub async fn force_refresh(&self) -> Vec<CachedAdvertisement> {
        self.coordinator
            .refresh(&self.store)
            .await
            .unwrap_or_default()
    }

    pub fn stats(&self) -> CacheStats {
        let now = self.clock.now();
        let (cached, eligible) = {
            let store = self.store.lock();
            (store.len(), self.validity.eligible(store.entries(), now).len())
        };

        CacheStats {
            cached,
            eligible,
            loading: self.coordinator.is_loading(),
            last_fetch: self.coordinator.last_fetch(),
        }
    }

    fn eligible_count(&self) -> usize {
        let store = self.store.lock();
        self.validity
            .eligible(store.entries(), self.clock.now())
            .len()
    }

    fn take_one(&self) -> Option<CachedAdvertisement> {
        let mut store = self.store.lock();

        let id = {
            let eligible = self.validity.eligible(store.entries(), self.clock.now());
            self.selection.select_one(&eligible, &mut rand::rng())?
        };

        let served = Self::mark_served(&mut store, &[id]);
        metrics::record_served("random", served.len());

        served.into_iter().next()
    }

    fn take_many(&self, count: usize) -> Vec<CachedAdvertisement> {
        let mut store = self.store.lock();

        let ids = {
            let eligible = self.validity.eligible(store.entries(), self.clock.now());
            self.selection
                .select_many(&eligible, count, &mut rand::rng())
        };

        let served = Self::mark_served(&mut store, &ids);
        metrics::record_served("multiple", served.len());

        served
    }

    /// Counts one use per selected id and returns the updated entries
    fn mark_served(store: &mut CacheStore, ids: &[String]) -> Vec<CachedAdvertisement> {
        ids.iter()
            .filter_map(|id| {
                store.increment_usage(id);
                store.get(id).cloned()
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ads::coordinator::tests::{ScriptedSource, poll_once};
    use crate::core::ads::source::FetchError;
    use crate::core::ads::store::tests::{ad, cached, epoch};
    use crate::core::clock::ManualClock;
    use crate::core::models::advertisement::Advertisement;
    use chrono::TimeDelta;
    use std::collections::{HashMap, HashSet};
    use tokio::sync::Notify;

    fn cache_with(
        source: Arc<ScriptedSource>,
        clock: Arc<ManualClock>,
    ) -> AdvertisementCache {
        AdvertisementCache::new(&CacheConfig::default(), source, clock)
    }

    fn batch(ids: &[&str]) -> Result<Vec<Advertisement>, FetchError> {
        Ok(ids.iter().map(|id| ad(id)).collect())
    }

    #[tokio::test]
    async fn test_empty_cache_fetches_then_serves() {
        let source = ScriptedSource::with_bulk(vec![batch(&["a", "b", "c"])]);
        let clock = Arc::new(ManualClock::new(epoch()));
        let cache = cache_with(source.clone(), clock);

        let served = cache.random_advertisement().await.unwrap();

        assert!(["a", "b", "c"].contains(&served.id()));
        assert_eq!(served.usage_count, 1);
        assert_eq!(source.bulk_calls(), 1);
        assert_eq!(cache.stats().cached, 3);
    }

    #[tokio::test]
    async fn test_usage_exhaustion_keeps_entry_in_store() {
        let source = ScriptedSource::with_bulk(vec![batch(&["a"])]);
        let clock = Arc::new(ManualClock::new(epoch()));
        let cache = cache_with(source.clone(), clock.clone());

        for expected in 1..=3 {
            let served = cache.random_advertisement().await.unwrap();
            assert_eq!(served.id(), "a");
            assert_eq!(served.usage_count, expected);
        }

        // exhausted and the throttle blocks a refetch
        clock.advance(TimeDelta::seconds(5));
        assert!(cache.random_advertisement().await.is_none());

        let stats = cache.stats();
        assert_eq!(stats.cached, 1);
        assert_eq!(stats.eligible, 0);
        assert_eq!(source.bulk_calls(), 1);
    }

    #[tokio::test]
    async fn test_throttle_allows_one_fetch() {
        let source = ScriptedSource::with_bulk(vec![]);
        let clock = Arc::new(ManualClock::new(epoch()));
        let cache = cache_with(source.clone(), clock.clone());

        assert!(cache.random_advertisement().await.is_none());
        clock.advance(TimeDelta::seconds(29));
        assert!(cache.random_advertisement().await.is_none());

        assert_eq!(source.bulk_calls(), 1);
    }

    #[tokio::test]
    async fn test_network_failure_degrades_to_none() {
        let source = ScriptedSource::with_bulk(vec![Err(FetchError::Transport(
            "dns error".into(),
        ))]);
        let clock = Arc::new(ManualClock::new(epoch()));
        let cache = cache_with(source.clone(), clock);

        assert!(cache.random_advertisement().await.is_none());
        assert!(cache.multiple_advertisements(3).await.is_empty());
        assert!(!cache.stats().loading);
    }

    #[tokio::test]
    async fn test_multiple_serves_cached_entries_after_failed_fetch() {
        let source = ScriptedSource::with_bulk(vec![Err(FetchError::Status(502))]);
        let clock = Arc::new(ManualClock::new(epoch()));
        let cache = cache_with(source.clone(), clock);

        cache.store.lock().insert(cached("a", epoch()));

        let served = cache.multiple_advertisements(3).await;

        assert_eq!(served.len(), 1);
        assert_eq!(served[0].id(), "a");
        assert_eq!(source.bulk_calls(), 1);
        assert_eq!(source.single_calls(), 1);
        assert!(!cache.stats().loading);
    }

    #[tokio::test]
    async fn test_two_entry_scenario_increments_once_per_call() {
        let source = ScriptedSource::with_bulk(vec![]);
        let clock = Arc::new(ManualClock::new(epoch()));
        let cache = cache_with(source.clone(), clock);

        {
            let mut store = cache.store.lock();
            store.insert(cached("A", epoch()));
            let mut b = cached("B", epoch());
            b.usage_count = 2;
            store.insert(b);
        }

        let mut before: HashMap<String, u32> = HashMap::from([("A".into(), 0), ("B".into(), 2)]);

        for _ in 0..3 {
            let served = cache.random_advertisement().await.unwrap();
            assert!(served.id() == "A" || served.id() == "B");

            let prev = before.get_mut(served.id()).unwrap();
            assert_eq!(served.usage_count, *prev + 1);
            *prev += 1;
        }

        assert_eq!(source.bulk_calls(), 0);
    }

    #[tokio::test]
    async fn test_multiple_returns_short_list() {
        let source = ScriptedSource::with_bulk(vec![]);
        let clock = Arc::new(ManualClock::new(epoch()));
        let cache = cache_with(source.clone(), clock);

        {
            let mut store = cache.store.lock();
            store.insert(cached("a", epoch()));
            store.insert(cached("b", epoch()));
        }

        let served = cache.multiple_advertisements(5).await;
        let ids: HashSet<&str> = served.iter().map(|e| e.id()).collect();

        assert_eq!(served.len(), 2);
        assert_eq!(ids, HashSet::from(["a", "b"]));
        assert!(served.iter().all(|e| e.usage_count == 1));
        // short eligible set triggers a fetch attempt
        assert_eq!(source.bulk_calls(), 1);
    }

    #[tokio::test]
    async fn test_multiple_skips_fetch_when_covered() {
        let source = ScriptedSource::with_bulk(vec![]);
        let clock = Arc::new(ManualClock::new(epoch()));
        let cache = cache_with(source.clone(), clock);

        {
            let mut store = cache.store.lock();
            for id in ["a", "b", "c"] {
                store.insert(cached(id, epoch()));
            }
        }

        assert_eq!(cache.multiple_advertisements(2).await.len(), 2);
        assert!(cache.multiple_advertisements(0).await.is_empty());
        assert_eq!(source.bulk_calls(), 0);
    }

    #[tokio::test]
    async fn test_business_expired_entry_never_served() {
        let source = ScriptedSource::with_bulk(vec![]);
        let clock = Arc::new(ManualClock::new(epoch()));
        let cache = cache_with(source.clone(), clock);

        {
            let mut entry = cached("old", epoch());
            entry.ad.valid_until = epoch() - TimeDelta::days(1);
            cache.store.lock().insert(entry);
        }

        assert!(cache.random_advertisement().await.is_none());
        assert_eq!(cache.stats().cached, 1);
    }

    #[tokio::test]
    async fn test_stale_entries_trigger_refetch() {
        let source = ScriptedSource::with_bulk(vec![batch(&["a"]), batch(&["b"])]);
        let clock = Arc::new(ManualClock::new(epoch()));
        let cache = cache_with(source.clone(), clock.clone());

        assert_eq!(cache.random_advertisement().await.unwrap().id(), "a");

        clock.advance(TimeDelta::minutes(6));

        assert_eq!(cache.random_advertisement().await.unwrap().id(), "b");
        assert_eq!(source.bulk_calls(), 2);
    }

    #[tokio::test]
    async fn test_force_refresh_bypasses_throttle() {
        let source = ScriptedSource::with_bulk(vec![batch(&["a", "b"]), batch(&["c"])]);
        let clock = Arc::new(ManualClock::new(epoch()));
        let cache = cache_with(source.clone(), clock);

        assert!(cache.random_advertisement().await.is_some());

        let refreshed = cache.force_refresh().await;

        assert_eq!(refreshed.len(), 1);
        assert_eq!(refreshed[0].id(), "c");
        assert_eq!(refreshed[0].usage_count, 0);
        assert_eq!(cache.stats().cached, 1);
        assert_eq!(source.bulk_calls(), 2);
    }

    #[tokio::test]
    async fn test_force_refresh_failure_leaves_cache_empty() {
        let source = ScriptedSource::with_bulk(vec![batch(&["a"]), Err(FetchError::Rejected)]);
        let clock = Arc::new(ManualClock::new(epoch()));
        let cache = cache_with(source.clone(), clock);

        assert!(cache.random_advertisement().await.is_some());
        assert!(cache.force_refresh().await.is_empty());
        assert_eq!(cache.stats().cached, 0);
    }

    #[tokio::test]
    async fn test_refresh_during_fetch_reports_loading_and_ignores_older_batch() {
        let gate = Arc::new(Notify::new());
        let source = Arc::new(ScriptedSource {
            bulk: Mutex::new(vec![batch(&["fresh"]), batch(&["stale"])].into()),
            gate: Mutex::new(Some(gate.clone())),
            ..Default::default()
        });
        let clock = Arc::new(ManualClock::new(epoch()));
        let cache = cache_with(source.clone(), clock);

        let pending = cache.random_advertisement();
        tokio::pin!(pending);
        assert!(poll_once(pending.as_mut()).await);

        let refreshed = cache.force_refresh().await;
        assert_eq!(refreshed.len(), 1);
        assert_eq!(refreshed[0].id(), "fresh");
        assert!(cache.stats().loading);

        gate.notify_one();
        let served = pending.await.unwrap();

        assert_eq!(served.id(), "fresh");
        let stats = cache.stats();
        assert_eq!(stats.cached, 1);
        assert!(!stats.loading);
        assert_eq!(source.bulk_calls(), 2);
    }
}
