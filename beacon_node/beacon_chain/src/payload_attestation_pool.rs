//! Aggregates payload-timeliness votes from the PTC, per `(slot, block_root, data_root)`
//! (gloas, ePBS).

use crate::metrics;
use crate::naive_aggregation_pool::{outcome_label, InsertOutcome};
use std::collections::HashMap;
use tree_hash::TreeHash;
use types::{
    BitVector, EthSpec, Hash256, PayloadAttestation, PayloadAttestationData,
    PayloadAttestationMessage, Slot,
};

/// The number of slots of payload attestations retained.
pub const SLOTS_RETAINED: usize = 2;

/// Bound on distinct attestation data per slot.
pub const MAX_ITEMS_PER_SLOT: usize = 128;

#[derive(Debug, PartialEq, Clone)]
pub enum Error {
    ReachedMaxItemsPerSlot(usize),
    /// The PTC index is out of range of the aggregation bitfield.
    InvalidCommitteeIndex(usize),
    SszTypes(ssz_types::Error),
    Bls(bls::Error),
}

impl From<ssz_types::Error> for Error {
    fn from(e: ssz_types::Error) -> Self {
        Error::SszTypes(e)
    }
}

/// An under-construction aggregate: single-bit votes merged as they arrive.
#[derive(Debug, Clone)]
pub struct AggregateFast<E: EthSpec> {
    data: PayloadAttestationData,
    aggregation_bits: BitVector<E::PtcSize>,
    signature: bls::AggregateSignature,
}

impl<E: EthSpec> AggregateFast<E> {
    fn to_payload_attestation(&self) -> PayloadAttestation<E> {
        PayloadAttestation {
            aggregation_bits: self.aggregation_bits.clone(),
            data: self.data,
            signature: bls::SignatureBytes::from(&self.signature),
        }
    }

    fn num_set_bits(&self) -> usize {
        self.aggregation_bits.num_set_bits()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct AggregateKey {
    block_root: Hash256,
    data_root: Hash256,
}

pub struct PayloadAttestationPool<E: EthSpec> {
    lowest_permissible_slot: Slot,
    aggregates: HashMap<Slot, HashMap<AggregateKey, AggregateFast<E>>>,
}

impl<E: EthSpec> Default for PayloadAttestationPool<E> {
    fn default() -> Self {
        Self {
            lowest_permissible_slot: Slot::new(0),
            aggregates: HashMap::new(),
        }
    }
}

impl<E: EthSpec> PayloadAttestationPool<E> {
    /// Merge a single PTC member's (gossip-verified) vote into the aggregate for its data.
    ///
    /// `validator_committee_index` is the member's position within the PTC, which maps
    /// directly onto the aggregation bitfield.
    pub fn insert(
        &mut self,
        message: &PayloadAttestationMessage,
        validator_committee_index: usize,
    ) -> Result<InsertOutcome, Error> {
        let outcome = self.insert_unchecked(message, validator_committee_index);
        if let Ok(outcome) = &outcome {
            metrics::inc_counter_vec(
                &metrics::OP_POOL_INSERT_OUTCOMES,
                &["payload_attestation", outcome_label(outcome)],
            );
        }
        outcome
    }

    fn insert_unchecked(
        &mut self,
        message: &PayloadAttestationMessage,
        validator_committee_index: usize,
    ) -> Result<InsertOutcome, Error> {
        let slot = message.data.slot;
        if slot < self.lowest_permissible_slot {
            return Ok(InsertOutcome::Old {
                lowest_permissible_slot: self.lowest_permissible_slot,
            });
        }

        let key = AggregateKey {
            block_root: message.data.beacon_block_root,
            data_root: message.data.tree_hash_root(),
        };

        let slot_map = self.aggregates.entry(slot).or_default();
        match slot_map.get_mut(&key) {
            Some(aggregate) => {
                if aggregate
                    .aggregation_bits
                    .get(validator_committee_index)
                    .map_err(|_| Error::InvalidCommitteeIndex(validator_committee_index))?
                {
                    return Ok(InsertOutcome::AlreadyKnown);
                }
                aggregate
                    .aggregation_bits
                    .set(validator_committee_index, true)
                    .map_err(|_| Error::InvalidCommitteeIndex(validator_committee_index))?;

                let signature =
                    bls::AggregateSignature::try_from(&message.signature).map_err(Error::Bls)?;
                aggregate.signature.add_assign_aggregate(&signature);

                Ok(InsertOutcome::Aggregated)
            }
            None => {
                if slot_map.len() >= MAX_ITEMS_PER_SLOT {
                    return Err(Error::ReachedMaxItemsPerSlot(MAX_ITEMS_PER_SLOT));
                }

                let mut aggregation_bits = BitVector::new();
                aggregation_bits
                    .set(validator_committee_index, true)
                    .map_err(|_| Error::InvalidCommitteeIndex(validator_committee_index))?;
                let signature =
                    bls::AggregateSignature::try_from(&message.signature).map_err(Error::Bls)?;

                slot_map.insert(
                    key,
                    AggregateFast {
                        data: message.data,
                        aggregation_bits,
                        signature,
                    },
                );
                Ok(InsertOutcome::NewData)
            }
        }
    }

    /// The best aggregates to include in a block building on `parent_root` at `slot`: the
    /// top-`max_attestations` by participation count.
    pub fn get_payload_attestations_for_block(
        &self,
        parent_root: Hash256,
        slot: Slot,
        max_attestations: usize,
    ) -> Vec<PayloadAttestation<E>> {
        let Some(slot_map) = self.aggregates.get(&slot) else {
            return vec![];
        };

        let mut aggregates: Vec<&AggregateFast<E>> = slot_map
            .iter()
            .filter(|(key, _)| key.block_root == parent_root)
            .map(|(_, aggregate)| aggregate)
            .collect();
        aggregates.sort_by_key(|aggregate| std::cmp::Reverse(aggregate.num_set_bits()));

        aggregates
            .into_iter()
            .take(max_attestations)
            .map(AggregateFast::to_payload_attestation)
            .collect()
    }

    /// Advance the window, dropping aggregates more than `SLOTS_RETAINED` behind.
    pub fn prune(&mut self, current_slot: Slot) {
        let lowest_permissible_slot =
            current_slot.saturating_sub(Slot::new(SLOTS_RETAINED as u64));
        self.lowest_permissible_slot = lowest_permissible_slot;
        self.aggregates
            .retain(|slot, _| *slot >= lowest_permissible_slot);
    }

    pub fn num_aggregates(&self) -> usize {
        self.aggregates.values().map(HashMap::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use types::{FixedBytesExtended, MainnetEthSpec};

    type E = MainnetEthSpec;

    fn message(slot: u64, block_root: Hash256, payload_present: bool) -> PayloadAttestationMessage {
        PayloadAttestationMessage {
            validator_index: 0,
            data: PayloadAttestationData {
                beacon_block_root: block_root,
                slot: Slot::new(slot),
                payload_present,
            },
            signature: bls::SignatureBytes::from(&bls::AggregateSignature::infinity()),
        }
    }

    #[test]
    fn votes_aggregate_per_data() {
        let mut pool = PayloadAttestationPool::<E>::default();
        let root = Hash256::repeat_byte(1);

        assert_eq!(
            pool.insert(&message(1, root, true), 0).unwrap(),
            InsertOutcome::NewData
        );
        assert_eq!(
            pool.insert(&message(1, root, true), 1).unwrap(),
            InsertOutcome::Aggregated
        );
        assert_eq!(
            pool.insert(&message(1, root, true), 1).unwrap(),
            InsertOutcome::AlreadyKnown
        );

        // A vote with the payload absent is a distinct aggregate.
        assert_eq!(
            pool.insert(&message(1, root, false), 2).unwrap(),
            InsertOutcome::NewData
        );

        let best = pool.get_payload_attestations_for_block(root, Slot::new(1), 2);
        assert_eq!(best.len(), 2);
        // The two-vote aggregate ranks first.
        assert_eq!(best[0].num_set_bits(), 2);
        assert!(best[0].data.payload_present);
        assert_eq!(best[1].num_set_bits(), 1);
    }

    #[test]
    fn max_attestations_is_honoured() {
        let mut pool = PayloadAttestationPool::<E>::default();
        let root = Hash256::repeat_byte(2);

        pool.insert(&message(1, root, true), 0).unwrap();
        pool.insert(&message(1, root, false), 1).unwrap();

        let best = pool.get_payload_attestations_for_block(root, Slot::new(1), 1);
        assert_eq!(best.len(), 1);
    }
}
