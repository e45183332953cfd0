use crate::core::models::advertisement::CachedAdvertisement;
use tracing::trace;

/// Bounded working set of cached advertisements, at most
/// one entry per advertisement id
#[derive(Debug)]
pub struct CacheStore {
    entries: Vec<CachedAdvertisement>,
    max_size: usize,
    /// Bumped by every clear, lets fetches started before a
    /// clear recognise that their batch is stale
    generation: u64,
}

impl CacheStore {
    pub fn new(max_size: usize) -> Self {
        CacheStore {
            entries: Vec::with_capacity(max_size + 1),
            max_size,
            generation: 0,
        }
    }

    /// Inserts an entry, replacing any entry with the same id. If the
    /// store grows past its bound the oldest fetched entries are evicted
    pub fn insert(&mut self, entry: CachedAdvertisement) {
        self.entries.retain(|e| e.id() != entry.id());
        self.entries.push(entry);

        if self.entries.len() > self.max_size {
            // stable sort, equal fetch times keep insertion order
            self.entries.sort_by_key(|e| e.fetched_at);

            let overflow = self.entries.len() - self.max_size;
            for evicted in self.entries.drain(..overflow) {
                trace!("Evicted advertisement {} from cache", evicted.id());
            }
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.generation += 1;
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Bumps the usage counter of `id`, absent ids are ignored
    pub fn increment_usage(&mut self, id: &str) {
        if let Some(entry) = self.entries.iter_mut().find(|e| e.id() == id) {
            entry.usage_count = entry.usage_count.saturating_add(1);
        }
    }

    pub fn get(&self, id: &str) -> Option<&CachedAdvertisement> {
        self.entries.iter().find(|e| e.id() == id)
    }

    pub fn entries(&self) -> &[CachedAdvertisement] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
