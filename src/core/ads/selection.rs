use crate::core::models::advertisement::CachedAdvertisement;
use rand::Rng;
use rand::seq::SliceRandom;

/// Picks advertisements out of an eligible set. Single picks favour
/// the least used entries, multi picks favour variety
#[derive(Debug, Clone, Copy)]
pub struct SelectionPolicy {
    candidate_pool: usize,
}

impl SelectionPolicy {
    pub fn new(candidate_pool: usize) -> Self {
        SelectionPolicy {
            candidate_pool: candidate_pool.max(1),
        }
    }

    /// Chooses uniformly among the `candidate_pool` least used entries
    pub fn select_one<R: Rng + ?Sized>(
        &self,
        eligible: &[&CachedAdvertisement],
        rng: &mut R,
    ) -> Option<String> {
        if eligible.is_empty() {
            return None;
        }

        let mut ranked = eligible.to_vec();
        ranked.sort_by_key(|e| e.usage_count);

        let pool = self.candidate_pool.min(ranked.len());
        let pick = rng.random_range(0..pool);

        Some(ranked[pick].id().to_string())
    }

    /// Shuffles the eligible set and takes up to `count` entries
    pub fn select_many<R: Rng + ?Sized>(
        &self,
        eligible: &[&CachedAdvertisement],
        count: usize,
        rng: &mut R,
    ) -> Vec<String> {
        let mut shuffled = eligible.to_vec();
        shuffled.shuffle(rng);

        shuffled
            .into_iter()
            .take(count)
            .map(|e| e.id().to_string())
            .collect()
    }
}
