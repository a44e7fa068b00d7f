use std::sync::Arc;

use charcore_storage::Pair;
use dashmap::DashMap;
use tokio::sync::Semaphore;

/// Per-pair bounded pending-turn queue (spec §5: "each pair has a bounded
/// pending-turn queue (default 1); additional concurrent requests for the
/// same pair are rejected with 'busy' rather than queued indefinitely").
///
/// A `Semaphore` with `queue_depth` permits both serializes mutation (at
/// depth 1, exactly one turn runs at a time per pair) and provides the
/// non-blocking `try_acquire` needed for the busy rejection.
pub struct PairGuards {
    semaphores: DashMap<Pair, Arc<Semaphore>>,
    queue_depth: usize,
}

impl PairGuards {
    pub fn new(queue_depth: usize) -> Self {
        Self {
            semaphores: DashMap::new(),
            queue_depth: queue_depth.max(1),
        }
    }

    fn semaphore_for(&self, pair: &Pair) -> Arc<Semaphore> {
        self.semaphores
            .entry(pair.clone())
            .or_insert_with(|| Arc::new(Semaphore::new(self.queue_depth)))
            .clone()
    }

    /// Returns `None` ("busy") if the pair's queue is already full.
    pub fn try_acquire(&self, pair: &Pair) -> Option<tokio::sync::OwnedSemaphorePermit> {
        self.semaphore_for(pair).try_acquire_owned().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_concurrent_turn_for_same_pair_is_rejected() {
        let guards = PairGuards::new(1);
        let pair = Pair::new("luna", "alex");
        let first = guards.try_acquire(&pair);
        assert!(first.is_some());
        let second = guards.try_acquire(&pair);
        assert!(second.is_none());
        drop(first);
        let third = guards.try_acquire(&pair);
        assert!(third.is_some());
    }

    #[test]
    fn distinct_pairs_are_independent() {
        let guards = PairGuards::new(1);
        let a = guards.try_acquire(&Pair::new("luna", "alex"));
        let b = guards.try_acquire(&Pair::new("luna", "sam"));
        assert!(a.is_some());
        assert!(b.is_some());
    }
}
