//! Slot-indexed pools that accumulate unaggregated gossip messages into the best aggregate the
//! node can produce at block-proposal time.
//!
//! Signatures held in pool entries are untrusted raw bytes: the gossip validator verifies them
//! before insertion and the pools assume insertion-time validity.

use crate::metrics;
use std::collections::HashMap;
use tree_hash::TreeHash;
use types::{Attestation, AttestationData, AttestationRef, EthSpec, Hash256, Slot};

/// The number of slots of attestations retained, ahead of the lowest permissible slot.
pub const SLOTS_RETAINED: usize = 3;

/// The maximum number of distinct `AttestationData` stored per slot. This is a DoS bound on
/// pool memory; it should never be reached in practice.
pub const MAX_ATTESTATIONS_PER_SLOT: usize = 16_384;

/// The outcome of adding an item to a pool.
#[derive(Debug, PartialEq, Clone)]
pub enum InsertOutcome {
    /// The item's data was not already in the pool; a new entry was created.
    NewData,
    /// The item's signature was folded into an existing aggregate.
    Aggregated,
    /// The item (or a superset of its participation) was already in the pool.
    AlreadyKnown,
    /// The item did not improve upon the entry already held for its key.
    NotBetterThan,
    /// The item is below the pool's retention window.
    Old { lowest_permissible_slot: Slot },
    /// The item is for a slot the pool has not been advanced to yet.
    Late { current_slot: Slot },
}

#[derive(Debug, PartialEq, Clone)]
pub enum Error {
    /// The aggregation bits of the two attestations have different lengths.
    InconsistentBitfieldLengths,
    /// The pool hit its per-slot item bound; the item was dropped.
    ReachedMaxItemsPerSlot(usize),
    SszTypes(ssz_types::Error),
    Bls(bls::Error),
}

impl From<ssz_types::Error> for Error {
    fn from(e: ssz_types::Error) -> Self {
        Error::SszTypes(e)
    }
}

/// All the attestations for a single slot, keyed by the tree hash root of their data (and
/// committee, post-electra).
#[derive(Default)]
struct SlotAttestations<E: EthSpec> {
    map: HashMap<Hash256, Attestation<E>>,
}

/// A pool of attestations aggregated "naively": each matching attestation's bits are merged
/// into a single aggregate per attestation data.
pub struct NaiveAggregationPool<E: EthSpec> {
    /// The oldest slot accepted; advanced by `prune`.
    lowest_permissible_slot: Slot,
    /// The newest slot accepted; advanced by `prune`.
    current_slot: Slot,
    maps: HashMap<Slot, SlotAttestations<E>>,
}

impl<E: EthSpec> Default for NaiveAggregationPool<E> {
    fn default() -> Self {
        Self {
            lowest_permissible_slot: Slot::new(0),
            current_slot: Slot::new(0),
            maps: HashMap::new(),
        }
    }
}

impl<E: EthSpec> NaiveAggregationPool<E> {
    /// Insert an attestation, aggregating it with any existing attestation for the same data.
    ///
    /// The given attestation must only have one signature (it is presumed fresh from gossip).
    pub fn insert(&mut self, attestation: AttestationRef<'_, E>) -> Result<InsertOutcome, Error> {
        let slot = attestation.data().slot;

        let outcome = self.insert_unchecked(slot, attestation);
        if let Ok(outcome) = &outcome {
            metrics::inc_counter_vec(
                &metrics::OP_POOL_INSERT_OUTCOMES,
                &["attestation", outcome_label(outcome)],
            );
        }
        outcome
    }

    fn insert_unchecked(
        &mut self,
        slot: Slot,
        attestation: AttestationRef<'_, E>,
    ) -> Result<InsertOutcome, Error> {
        if slot < self.lowest_permissible_slot {
            return Ok(InsertOutcome::Old {
                lowest_permissible_slot: self.lowest_permissible_slot,
            });
        }
        if slot > self.current_slot + 1u64 {
            return Ok(InsertOutcome::Late {
                current_slot: self.current_slot,
            });
        }

        let root = attestation_key(attestation);
        let slot_map = self.maps.entry(slot).or_default();

        match slot_map.map.get_mut(&root) {
            Some(existing) => aggregate_into(existing, attestation),
            None => {
                if slot_map.map.len() >= MAX_ATTESTATIONS_PER_SLOT {
                    return Err(Error::ReachedMaxItemsPerSlot(MAX_ATTESTATIONS_PER_SLOT));
                }
                slot_map.map.insert(root, to_owned_attestation(attestation));
                Ok(InsertOutcome::NewData)
            }
        }
    }

    /// The best aggregate for the given attestation data, if any.
    pub fn get(&self, data: &AttestationData) -> Option<Attestation<E>> {
        self.maps
            .get(&data.slot)
            .and_then(|map| map.map.get(&data.tree_hash_root()))
            .cloned()
    }

    /// Every aggregate for `slot`.
    pub fn get_all_at_slot(&self, slot: Slot) -> Vec<Attestation<E>> {
        self.maps
            .get(&slot)
            .map(|map| map.map.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Advance the window, dropping all items more than `SLOTS_RETAINED` behind.
    pub fn prune(&mut self, current_slot: Slot) {
        let lowest_permissible_slot =
            current_slot.saturating_sub(Slot::new(SLOTS_RETAINED as u64));
        self.current_slot = current_slot;
        self.lowest_permissible_slot = lowest_permissible_slot;
        self.maps.retain(|slot, _| *slot >= lowest_permissible_slot);
    }

    pub fn num_attestations(&self) -> usize {
        self.maps.values().map(|map| map.map.len()).sum()
    }
}

/// The pool key: the attestation data root, extended with the committee bits for electra
/// attestations (which may span committees).
fn attestation_key<E: EthSpec>(attestation: AttestationRef<'_, E>) -> Hash256 {
    match attestation {
        AttestationRef::Base(att) => att.data.tree_hash_root(),
        AttestationRef::Electra(att) => {
            let mut key = att.data.tree_hash_root().as_slice().to_vec();
            key.extend_from_slice(att.committee_bits.tree_hash_root().as_slice());
            Hash256::from_slice(&ethereum_hashing::hash(&key))
        }
    }
}

fn to_owned_attestation<E: EthSpec>(attestation: AttestationRef<'_, E>) -> Attestation<E> {
    match attestation {
        AttestationRef::Base(att) => Attestation::Base(att.clone()),
        AttestationRef::Electra(att) => Attestation::Electra(att.clone()),
    }
}

/// OR `other`'s aggregation bits into `existing`, folding the signature in when any new bit is
/// contributed.
fn aggregate_into<E: EthSpec>(
    existing: &mut Attestation<E>,
    other: AttestationRef<'_, E>,
) -> Result<InsertOutcome, Error> {
    match (existing, other) {
        (Attestation::Base(a), AttestationRef::Base(b)) => {
            if a.aggregation_bits.len() != b.aggregation_bits.len() {
                return Err(Error::InconsistentBitfieldLengths);
            }

            let merged_bits = a.aggregation_bits.union(&b.aggregation_bits);
            if merged_bits == a.aggregation_bits {
                // No new participation.
                return Ok(InsertOutcome::AlreadyKnown);
            }
            a.aggregation_bits = merged_bits;

            let mut aggregate = bls::AggregateSignature::try_from(&a.signature)
                .map_err(Error::Bls)?;
            let other_sig =
                bls::AggregateSignature::try_from(&b.signature).map_err(Error::Bls)?;
            aggregate.add_assign_aggregate(&other_sig);
            a.signature = aggregate.compress();

            Ok(InsertOutcome::Aggregated)
        }
        (Attestation::Electra(a), AttestationRef::Electra(b)) => {
            if a.aggregation_bits.len() != b.aggregation_bits.len() {
                return Err(Error::InconsistentBitfieldLengths);
            }

            let merged_bits = a.aggregation_bits.union(&b.aggregation_bits);
            if merged_bits == a.aggregation_bits {
                // No new participation.
                return Ok(InsertOutcome::AlreadyKnown);
            }
            a.aggregation_bits = merged_bits;

            let mut aggregate = bls::AggregateSignature::try_from(&a.signature)
                .map_err(Error::Bls)?;
            let other_sig =
                bls::AggregateSignature::try_from(&b.signature).map_err(Error::Bls)?;
            aggregate.add_assign_aggregate(&other_sig);
            a.signature = aggregate.compress();

            Ok(InsertOutcome::Aggregated)
        }
        _ => Err(Error::InconsistentBitfieldLengths),
    }
}

pub(crate) fn outcome_label(outcome: &InsertOutcome) -> &'static str {
    match outcome {
        InsertOutcome::NewData => "new_data",
        InsertOutcome::Aggregated => "aggregated",
        InsertOutcome::AlreadyKnown => "already_known",
        InsertOutcome::NotBetterThan => "not_better_than",
        InsertOutcome::Old { .. } => "old",
        InsertOutcome::Late { .. } => "late",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ssz_types::BitList;
    use types::{AttestationBase, Checkpoint, Epoch, FixedBytesExtended, MainnetEthSpec};

    type E = MainnetEthSpec;

    fn attestation(slot: u64, bit: usize) -> Attestation<E> {
        let mut aggregation_bits = BitList::with_capacity(8).unwrap();
        aggregation_bits.set(bit, true).unwrap();
        Attestation::Base(AttestationBase {
            aggregation_bits,
            data: AttestationData {
                slot: Slot::new(slot),
                index: 0,
                beacon_block_root: Hash256::zero(),
                source: Checkpoint::default(),
                target: Checkpoint {
                    epoch: Epoch::new(0),
                    root: Hash256::zero(),
                },
            },
            signature: bls::SignatureBytes::from(&bls::AggregateSignature::infinity()),
        })
    }

    #[test]
    fn aggregates_distinct_bits() {
        let mut pool = NaiveAggregationPool::<E>::default();

        let a = attestation(0, 0);
        let b = attestation(0, 1);

        assert_eq!(pool.insert(a.to_ref()).unwrap(), InsertOutcome::NewData);
        assert_eq!(pool.insert(b.to_ref()).unwrap(), InsertOutcome::Aggregated);
        // Re-inserting either is a no-op.
        assert_eq!(
            pool.insert(a.to_ref()).unwrap(),
            InsertOutcome::AlreadyKnown
        );

        let aggregate = pool.get(a.data()).unwrap();
        assert_eq!(aggregate.num_set_aggregation_bits(), 2);
    }

    #[test]
    fn pruned_slots_are_rejected_as_old() {
        let mut pool = NaiveAggregationPool::<E>::default();
        pool.prune(Slot::new(10));

        let old = attestation(2, 0);
        assert!(matches!(
            pool.insert(old.to_ref()).unwrap(),
            InsertOutcome::Old { .. },
        ));
    }

    #[test]
    fn premature_slots_are_rejected_as_late() {
        let mut pool = NaiveAggregationPool::<E>::default();
        pool.prune(Slot::new(10));

        let premature = attestation(15, 0);
        assert!(matches!(
            pool.insert(premature.to_ref()).unwrap(),
            InsertOutcome::Late { .. },
        ));
    }

    #[test]
    fn prune_removes_expired_aggregates() {
        let mut pool = NaiveAggregationPool::<E>::default();
        pool.insert(attestation(0, 0).to_ref()).unwrap();
        assert_eq!(pool.num_attestations(), 1);

        pool.prune(Slot::new(8));
        assert_eq!(pool.num_attestations(), 0);
    }
}
