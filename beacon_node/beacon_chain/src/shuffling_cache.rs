//! A cache of committee shufflings, keyed by `(epoch, decision_root)`.
//!
//! Computing a shuffling requires a state at the decision block, which may mean replaying
//! blocks; concurrent requests for the same shuffling are therefore coalesced: the first
//! requester inserts a promise and computes, everyone else blocks on the promise's receiver.

use crate::metrics;
use oneshot_broadcast::{oneshot, Receiver, Sender};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use types::{BeaconCommittee, CommitteeCache, Epoch, Hash256};

pub use proto_array::AttestationShufflingId;

/// The number of recent epochs whose shufflings are retained.
pub const DEFAULT_CACHE_SIZE: usize = 4;

/// The maximum number of concurrent committee-cache "promises" that can be issued. In effect,
/// this limits the number of concurrent states that can be loaded into memory for shuffling
/// computation. The cache size is set to 2 since there's no reason to be computing more than
/// the current and next epoch's shuffling at once.
const MAX_CONCURRENT_PROMISES: usize = 2;

#[derive(Clone)]
pub enum CacheItem {
    /// A committee cache that is fully computed.
    Committee(Arc<CommitteeCache>),
    /// A promise of a future committee cache, and the time the promise was inserted.
    Promise(Instant, Receiver<Arc<CommitteeCache>>),
}

impl CacheItem {
    pub fn is_promise(&self) -> bool {
        matches!(self, CacheItem::Promise(_, _))
    }

    /// Resolve the item to a committee cache, blocking on a promise if necessary.
    pub fn wait(self) -> Result<Arc<CommitteeCache>, Error> {
        match self {
            CacheItem::Committee(cache) => Ok(cache),
            CacheItem::Promise(_, receiver) => {
                receiver.recv().map_err(|_| Error::PromiseAbandoned)
            }
        }
    }
}

#[derive(Debug, PartialEq, Clone)]
pub enum Error {
    /// The shuffling was not present in the cache.
    NoShufflingFound {
        epoch: Epoch,
        decision_root: Hash256,
    },
    /// The computation this promise was waiting on was abandoned without resolution.
    PromiseAbandoned,
    /// Too many concurrent shuffling computations are already in flight.
    MaxPromises(usize),
    /// The committee lookup failed on the resolved shuffling.
    BeaconState(types::BeaconStateError),
}

pub struct ShufflingCache {
    cache: HashMap<AttestationShufflingId, CacheItem>,
    /// The number of distinct epochs retained.
    max_epochs: usize,
}

impl ShufflingCache {
    pub fn new(max_epochs: usize) -> Self {
        Self {
            cache: HashMap::new(),
            max_epochs,
        }
    }

    /// Look up a shuffling or live promise for `key`.
    ///
    /// Dead promises (whose computation was abandoned) are lazily removed here.
    pub fn get(&mut self, key: &AttestationShufflingId) -> Option<CacheItem> {
        match self.cache.get(key) {
            // The cache contained the committee cache directly.
            item @ Some(CacheItem::Committee(_)) => {
                metrics::inc_counter(&metrics::SHUFFLING_CACHE_HITS);
                item.cloned()
            }
            // The cache contains a promise for the committee cache.
            Some(CacheItem::Promise(inserted_at, receiver)) => match receiver.try_recv() {
                // The promise has already been resolved: upgrade to the committee proper.
                Ok(Some(committee)) => {
                    metrics::inc_counter(&metrics::SHUFFLING_CACHE_PROMISE_HITS);
                    metrics::inc_counter(&metrics::SHUFFLING_CACHE_HITS);
                    metrics::observe(
                        &metrics::SHUFFLING_CACHE_PROMISE_WAIT_SECONDS,
                        inserted_at.elapsed().as_secs_f64(),
                    );
                    let item = CacheItem::Committee(committee);
                    self.cache.insert(*key, item.clone());
                    Some(item)
                }
                // The promise has not yet been resolved; the caller should wait on it.
                Ok(None) => {
                    metrics::inc_counter(&metrics::SHUFFLING_CACHE_PROMISE_HITS);
                    metrics::inc_counter(&metrics::SHUFFLING_CACHE_HITS);
                    self.cache.get(key).cloned()
                }
                // The sender was dropped without a value: whoever was computing the shuffling
                // failed. Remove the dead promise so the next caller retries.
                Err(oneshot_broadcast::Error::SenderDropped) => {
                    metrics::inc_counter(&metrics::SHUFFLING_CACHE_PROMISE_FAILS);
                    metrics::inc_counter(&metrics::SHUFFLING_CACHE_MISSES);
                    self.cache.remove(key);
                    None
                }
            },
            None => {
                metrics::inc_counter(&metrics::SHUFFLING_CACHE_MISSES);
                None
            }
        }
    }

    pub fn contains(&self, key: &AttestationShufflingId) -> bool {
        self.cache.contains_key(key)
    }

    /// Resolve any pending promise for `key` and store the computed committee cache.
    pub fn insert_committee_cache(
        &mut self,
        key: AttestationShufflingId,
        committee_cache: &Arc<CommitteeCache>,
    ) {
        if let Some(CacheItem::Promise(inserted_at, _)) = self.cache.get(&key) {
            metrics::observe(
                &metrics::SHUFFLING_CACHE_PROMISE_WAIT_SECONDS,
                inserted_at.elapsed().as_secs_f64(),
            );
        }

        if self
            .cache
            .get(&key)
            // Replace the value if it's not present, or if it's a promise. A bird in the hand
            // is worth two in the bush.
            .map_or(true, CacheItem::is_promise)
        {
            self.insert_cache_item(key, CacheItem::Committee(committee_cache.clone()));
        }
    }

    /// Prepare to compute the shuffling for `key`: insert a promise that concurrent requesters
    /// will wait on, returning the sender that the computing thread resolves.
    pub fn create_promise(
        &mut self,
        key: AttestationShufflingId,
    ) -> Result<Sender<Arc<CommitteeCache>>, Error> {
        let num_active_promises = self
            .cache
            .values()
            .filter(|item| item.is_promise())
            .count();
        if num_active_promises >= MAX_CONCURRENT_PROMISES {
            return Err(Error::MaxPromises(num_active_promises));
        }

        let (sender, receiver) = oneshot();
        self.insert_cache_item(key, CacheItem::Promise(Instant::now(), receiver));
        Ok(sender)
    }

    /// Retrieve the committee cache for `key`, erroring if it is not immediately available.
    pub fn get_shuffling_or_throw(
        &mut self,
        key: &AttestationShufflingId,
    ) -> Result<Arc<CommitteeCache>, Error> {
        match self.get(key) {
            Some(CacheItem::Committee(cache)) => Ok(cache),
            Some(promise @ CacheItem::Promise(_, _)) => promise.wait(),
            None => Err(Error::NoShufflingFound {
                epoch: key.shuffling_epoch,
                decision_root: key.shuffling_decision_block,
            }),
        }
    }

    /// The beacon committees of every slot in the shuffling's epoch.
    pub fn get_beacon_committees<'a>(
        &self,
        committee_cache: &'a CommitteeCache,
    ) -> Result<Vec<BeaconCommittee<'a>>, Error> {
        committee_cache
            .get_all_beacon_committees()
            .map_err(Error::BeaconState)
    }

    /// Insert an item, pruning the oldest epochs once more than `max_epochs` are retained.
    fn insert_cache_item(&mut self, key: AttestationShufflingId, item: CacheItem) {
        self.cache.insert(key, item);

        let mut epochs: Vec<Epoch> = self
            .cache
            .keys()
            .map(|id| id.shuffling_epoch)
            .collect();
        epochs.sort_unstable();
        epochs.dedup();

        if epochs.len() > self.max_epochs {
            let cutoff = epochs[epochs.len() - self.max_epochs];
            self.cache.retain(|id, _| id.shuffling_epoch >= cutoff);
        }

        metrics::set_gauge(&metrics::SHUFFLING_CACHE_SIZE, self.cache.len() as i64);
    }
}

impl Default for ShufflingCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_SIZE)
    }
}

/// A helper to spawn a shuffling computation under single-flight control: returns either the
/// cached value, a receiver to wait on, or the sender obligating the caller to compute.
pub enum ShufflingLookup {
    Ready(Arc<CommitteeCache>),
    WaitFor(Receiver<Arc<CommitteeCache>>),
    Compute(Sender<Arc<CommitteeCache>>),
}

impl ShufflingCache {
    pub fn lookup_or_promise(
        &mut self,
        key: AttestationShufflingId,
    ) -> Result<ShufflingLookup, Error> {
        match self.get(&key) {
            Some(CacheItem::Committee(cache)) => Ok(ShufflingLookup::Ready(cache)),
            Some(CacheItem::Promise(_, receiver)) => Ok(ShufflingLookup::WaitFor(receiver)),
            None => self.create_promise(key).map(ShufflingLookup::Compute),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use types::FixedBytesExtended;

    fn shuffling_id(epoch: u64) -> AttestationShufflingId {
        AttestationShufflingId {
            shuffling_epoch: Epoch::new(epoch),
            shuffling_decision_block: Hash256::from_low_u64_be(epoch),
        }
    }

    fn committee_cache() -> Arc<CommitteeCache> {
        Arc::new(CommitteeCache::default())
    }

    #[test]
    fn resolved_promise_is_visible_to_other_readers() {
        let mut cache = ShufflingCache::default();
        let id = shuffling_id(0);

        // Create a promise.
        let sender = cache.create_promise(id).unwrap();

        // A reader should see a promise that is not yet resolved.
        let item = cache.get(&id).unwrap();
        assert!(item.is_promise());

        // Resolve the promise.
        let committee = committee_cache();
        sender.send(committee.clone());

        // A subsequent reader gets the committee cache.
        match cache.get(&id).unwrap() {
            CacheItem::Committee(cached) => assert!(Arc::ptr_eq(&cached, &committee)),
            CacheItem::Promise(_, _) => panic!("expected the promise to be resolved"),
        }
    }

    #[test]
    fn dead_promise_is_evicted() {
        let mut cache = ShufflingCache::default();
        let id = shuffling_id(0);

        let sender = cache.create_promise(id).unwrap();
        drop(sender);

        // The dead promise should be cleared so callers can retry.
        assert!(cache.get(&id).is_none());
        assert!(!cache.contains(&id));
    }

    #[test]
    fn too_many_promises_is_an_error() {
        let mut cache = ShufflingCache::default();

        let _sender_a = cache.create_promise(shuffling_id(0)).unwrap();
        let _sender_b = cache.create_promise(shuffling_id(1)).unwrap();

        assert!(matches!(
            cache.create_promise(shuffling_id(2)),
            Err(Error::MaxPromises(2)),
        ));
    }

    #[test]
    fn old_epochs_are_pruned() {
        let mut cache = ShufflingCache::new(2);

        for epoch in 0..4 {
            cache.insert_committee_cache(shuffling_id(epoch), &committee_cache());
        }

        assert!(!cache.contains(&shuffling_id(0)));
        assert!(!cache.contains(&shuffling_id(1)));
        assert!(cache.contains(&shuffling_id(2)));
        assert!(cache.contains(&shuffling_id(3)));
    }

    #[test]
    fn missing_shuffling_is_an_error() {
        let mut cache = ShufflingCache::default();
        assert!(matches!(
            cache.get_shuffling_or_throw(&shuffling_id(7)),
            Err(Error::NoShufflingFound { .. }),
        ));
    }
}
