use crate::child_span_info;
use crate::core::ads::source::{AdSource, FetchError};
use crate::core::ads::store::CacheStore;
use crate::core::clock::Clock;
use crate::core::models::advertisement::{Advertisement, CachedAdvertisement};
use crate::core::observability::metrics;
use chrono::{DateTime, TimeDelta, Utc};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{Instrument, Span, debug, info, warn};

#[derive(Debug, Default)]
struct FetchState {
    /// Fetches currently running, a forced refresh may overlap a throttled fetch
    in_flight: usize,
    last_fetch: Option<DateTime<Utc>>,
}

impl FetchState {
    fn permits(&self, now: DateTime<Utc>, min_interval: TimeDelta) -> bool {
        if self.in_flight > 0 {
            return false;
        }

        match self.last_fetch {
            Some(last) => now.signed_duration_since(last) > min_interval,
            None => true,
        }
    }

    fn start(&mut self, now: DateTime<Utc>) {
        self.in_flight += 1;
        self.last_fetch = Some(now);
    }
}

/// Counts a fetch as in flight until dropped, so a failed or
/// abandoned fetch never leaves the coordinator stuck
struct LoadingGuard<'a> {
    state: &'a Mutex<FetchState>,
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        let mut state = self.state.lock();
        state.in_flight = state.in_flight.saturating_sub(1);
    }
}

/// Gates and performs fetches from the advertisement source,
/// merging each fetched batch into the cache store
pub struct FetchCoordinator {
    source: Arc<dyn AdSource>,
    clock: Arc<dyn Clock>,
    min_interval: TimeDelta,
    state: Mutex<FetchState>,
}

impl FetchCoordinator {
    pub fn new(source: Arc<dyn AdSource>, clock: Arc<dyn Clock>, min_interval: TimeDelta) -> Self {
        FetchCoordinator {
            source,
            clock,
            min_interval,
            state: Mutex::new(FetchState::default()),
        }
    }

    /// True when no fetch is in flight and the minimum interval
    /// since the last fetch started has passed
    pub fn should_fetch(&self) -> bool {
        self.state.lock().permits(self.clock.now(), self.min_interval)
    }

    pub fn is_loading(&self) -> bool {
        self.state.lock().in_flight > 0
    }

    pub fn last_fetch(&self) -> Option<DateTime<Utc>> {
        self.state.lock().last_fetch
    }

    /// Checks the throttle and marks the fetch as started under one lock
    fn try_begin(&self) -> Option<LoadingGuard<'_>> {
        let mut state = self.state.lock();
        let now = self.clock.now();

        if !state.permits(now, self.min_interval) {
            return None;
        }

        state.start(now);

        Some(LoadingGuard { state: &self.state })
    }

    fn begin(&self) -> LoadingGuard<'_> {
        self.state.lock().start(self.clock.now());

        LoadingGuard { state: &self.state }
    }

    /// Fetches only if the throttle allows it. `None` means no
    /// fetch was attempted
    pub async fn fetch_if_permitted(
        &self,
        store: &Mutex<CacheStore>,
    ) -> Option<Result<Vec<CachedAdvertisement>, FetchError>> {
        let guard = match self.try_begin() {
            Some(guard) => guard,
            None => {
                debug!("Advertisement fetch throttled");
                return None;
            }
        };

        let generation = store.lock().generation();
        Some(self.run(guard, store, generation, false).await)
    }

    /// Clears the store and fetches regardless of the throttle.
    /// Batches from fetches started before the clear are discarded
    pub async fn refresh(
        &self,
        store: &Mutex<CacheStore>,
    ) -> Result<Vec<CachedAdvertisement>, FetchError> {
        let guard = self.begin();

        let generation = {
            let mut store = store.lock();
            store.clear();
            store.generation()
        };

        self.run(guard, store, generation, true).await
    }

    async fn run(
        &self,
        _guard: LoadingGuard<'_>,
        store: &Mutex<CacheStore>,
        generation: u64,
        forced: bool,
    ) -> Result<Vec<CachedAdvertisement>, FetchError> {
        let span = child_span_info!(
            "ad_fetch",
            forced = forced,
            fallback = tracing::field::Empty,
            fetched = tracing::field::Empty,
        );

        async move {
            let (outcome, fallback) = self.request().await;
            Span::current().record("fallback", fallback);

            match outcome {
                Ok(ads) => {
                    let now = self.clock.now();
                    let batch: Vec<CachedAdvertisement> = ads
                        .into_iter()
                        .map(|ad| CachedAdvertisement::new(ad, now))
                        .collect();

                    // whole batch lands before any selection can observe the store
                    {
                        let mut store = store.lock();
                        if store.generation() != generation {
                            metrics::record_fetch("stale", forced, fallback);
                            info!(
                                "Discarding {} advertisements fetched before a cache refresh",
                                batch.len()
                            );

                            return Ok(Vec::new());
                        }

                        for entry in &batch {
                            store.insert(entry.clone());
                        }
                    }

                    Span::current().record("fetched", batch.len());
                    metrics::record_fetch("ok", forced, fallback);
                    info!("Fetched {} advertisements into cache", batch.len());

                    Ok(batch)
                }
                Err(e) => {
                    metrics::record_fetch(e.as_ref(), forced, fallback);
                    warn!("Advertisement fetch failed: {}", e);

                    Err(e)
                }
            }
        }
        .instrument(span)
        .await
    }

    /// Bulk fetch, falling back once to the single route when the bulk
    /// route answers with a non success status
    async fn request(&self) -> (Result<Vec<Advertisement>, FetchError>, bool) {
        match self.source.fetch_bulk().await {
            Err(FetchError::Status(code)) => {
                debug!("Bulk advertisement route returned {}, trying single route", code);
                (self.source.fetch_single().await.map(|ad| vec![ad]), true)
            }
            other => (other, false),
        }
    }
}
