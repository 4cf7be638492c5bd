//! Retains the highest-value builder bid per `(slot, parent_root, parent_hash)` (gloas, ePBS).

use crate::metrics;
use crate::naive_aggregation_pool::{outcome_label, InsertOutcome};
use std::collections::HashMap;
use types::{ExecutionBlockHash, Hash256, SignedExecutionPayloadBid, Slot};

/// The number of slots of bids retained.
pub const SLOTS_RETAINED: usize = 2;

/// Bound on distinct `(parent_root, parent_hash)` keys per slot.
pub const MAX_ITEMS_PER_SLOT: usize = 64;

#[derive(Debug, PartialEq, Clone)]
pub enum Error {
    ReachedMaxItemsPerSlot(usize),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct BidKey {
    parent_root: Hash256,
    parent_hash: ExecutionBlockHash,
}

#[derive(Default)]
pub struct ExecutionPayloadBidPool {
    lowest_permissible_slot: Slot,
    bids: HashMap<Slot, HashMap<BidKey, SignedExecutionPayloadBid>>,
}

impl ExecutionPayloadBidPool {
    /// Insert a (gossip-verified) bid, keeping only the highest value per key. Equal-value
    /// bids are treated as already known, so re-gossiped winners don't churn the pool.
    pub fn insert(&mut self, bid: SignedExecutionPayloadBid) -> Result<InsertOutcome, Error> {
        let outcome = self.insert_unchecked(bid);
        if let Ok(outcome) = &outcome {
            metrics::inc_counter_vec(
                &metrics::OP_POOL_INSERT_OUTCOMES,
                &["execution_bid", outcome_label(outcome)],
            );
        }
        outcome
    }

    fn insert_unchecked(
        &mut self,
        bid: SignedExecutionPayloadBid,
    ) -> Result<InsertOutcome, Error> {
        let slot = bid.message.slot;
        if slot < self.lowest_permissible_slot {
            return Ok(InsertOutcome::Old {
                lowest_permissible_slot: self.lowest_permissible_slot,
            });
        }

        let key = BidKey {
            parent_root: bid.message.parent_block_root,
            parent_hash: bid.message.parent_block_hash,
        };

        let slot_map = self.bids.entry(slot).or_default();
        match slot_map.get_mut(&key) {
            Some(best) => {
                if bid.message.value > best.message.value {
                    *best = bid;
                    Ok(InsertOutcome::Aggregated)
                } else if bid.message.value == best.message.value {
                    Ok(InsertOutcome::AlreadyKnown)
                } else {
                    Ok(InsertOutcome::NotBetterThan)
                }
            }
            None => {
                if slot_map.len() >= MAX_ITEMS_PER_SLOT {
                    return Err(Error::ReachedMaxItemsPerSlot(MAX_ITEMS_PER_SLOT));
                }
                slot_map.insert(key, bid);
                Ok(InsertOutcome::NewData)
            }
        }
    }

    /// The best bid to commit into a block at `slot` building on the given parent.
    pub fn best_bid(
        &self,
        slot: Slot,
        parent_root: Hash256,
        parent_hash: ExecutionBlockHash,
    ) -> Option<&SignedExecutionPayloadBid> {
        self.bids.get(&slot)?.get(&BidKey {
            parent_root,
            parent_hash,
        })
    }

    /// Advance the window, dropping bids more than `SLOTS_RETAINED` behind.
    pub fn prune(&mut self, current_slot: Slot) {
        let lowest_permissible_slot =
            current_slot.saturating_sub(Slot::new(SLOTS_RETAINED as u64));
        self.lowest_permissible_slot = lowest_permissible_slot;
        self.bids.retain(|slot, _| *slot >= lowest_permissible_slot);
    }

    pub fn num_bids(&self) -> usize {
        self.bids.values().map(HashMap::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bls::SignatureBytes;
    use types::{ExecutionPayloadBid, FixedBytesExtended};

    fn bid(slot: u64, value: u64) -> SignedExecutionPayloadBid {
        SignedExecutionPayloadBid {
            message: ExecutionPayloadBid {
                parent_block_hash: ExecutionBlockHash::zero(),
                parent_block_root: Hash256::repeat_byte(1),
                block_hash: ExecutionBlockHash::zero(),
                prev_randao: Hash256::zero(),
                gas_limit: 30_000_000,
                builder_index: 7,
                slot: Slot::new(slot),
                value,
                blob_kzg_commitments_root: Hash256::zero(),
            },
            signature: SignatureBytes::empty(),
        }
    }

    #[test]
    fn highest_value_bid_wins() {
        let mut pool = ExecutionPayloadBidPool::default();

        assert_eq!(pool.insert(bid(1, 10)).unwrap(), InsertOutcome::NewData);
        assert_eq!(pool.insert(bid(1, 5)).unwrap(), InsertOutcome::NotBetterThan);
        assert_eq!(pool.insert(bid(1, 20)).unwrap(), InsertOutcome::Aggregated);
        // An equal-value bid is a tie, not an improvement.
        assert_eq!(pool.insert(bid(1, 20)).unwrap(), InsertOutcome::AlreadyKnown);

        let best = pool
            .best_bid(
                Slot::new(1),
                Hash256::repeat_byte(1),
                ExecutionBlockHash::zero(),
            )
            .unwrap();
        assert_eq!(best.message.value, 20);
    }

    #[test]
    fn pruned_bids_are_gone() {
        let mut pool = ExecutionPayloadBidPool::default();
        pool.insert(bid(1, 10)).unwrap();

        pool.prune(Slot::new(8));
        assert_eq!(pool.num_bids(), 0);
        assert!(matches!(
            pool.insert(bid(1, 10)).unwrap(),
            InsertOutcome::Old { .. },
        ));
    }
}
