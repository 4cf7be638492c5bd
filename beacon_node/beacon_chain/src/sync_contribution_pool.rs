//! Retains the best sync-committee contribution seen per `(slot, block_root, subcommittee)`,
//! and assembles the block's `SyncAggregate` from the four subcommittee winners.

use crate::metrics;
use crate::naive_aggregation_pool::{outcome_label, InsertOutcome};
use std::collections::HashMap;
use types::consts::altair::SYNC_COMMITTEE_SUBNET_COUNT;
use types::{
    BitVector, EthSpec, Hash256, Slot, SyncAggregate, SyncCommitteeContribution, Unsigned,
};

/// The number of slots of contributions retained.
pub const SLOTS_RETAINED: usize = 3;

/// Bound on distinct `(block_root, subcommittee)` keys per slot.
pub const MAX_ITEMS_PER_SLOT: usize = 512;

#[derive(Debug, PartialEq, Clone)]
pub enum Error {
    ReachedMaxItemsPerSlot(usize),
    SszTypes(ssz_types::Error),
    Bls(bls::Error),
}

impl From<ssz_types::Error> for Error {
    fn from(e: ssz_types::Error) -> Self {
        Error::SszTypes(e)
    }
}

/// The minimal information retained about the best contribution for a key: the subcommittee
/// bits, their count, and the (unverified) aggregate signature bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncContributionFast<E: EthSpec> {
    sync_subcommittee_bits: BitVector<E::SyncSubcommitteeSize>,
    num_participants: usize,
    sync_subcommittee_signature: bls::SignatureBytes,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ContributionKey {
    block_root: Hash256,
    subcommittee_index: u64,
}

pub struct SyncContributionAndProofPool<E: EthSpec> {
    lowest_permissible_slot: Slot,
    contributions: HashMap<Slot, HashMap<ContributionKey, SyncContributionFast<E>>>,
}

impl<E: EthSpec> Default for SyncContributionAndProofPool<E> {
    fn default() -> Self {
        Self {
            lowest_permissible_slot: Slot::new(0),
            contributions: HashMap::new(),
        }
    }
}

impl<E: EthSpec> SyncContributionAndProofPool<E> {
    /// Insert a (gossip-verified) contribution, keeping it only if it has more participants
    /// than the best contribution already held for its key.
    pub fn insert(
        &mut self,
        contribution: &SyncCommitteeContribution<E>,
    ) -> Result<InsertOutcome, Error> {
        let outcome = self.insert_unchecked(contribution);
        if let Ok(outcome) = &outcome {
            metrics::inc_counter_vec(
                &metrics::OP_POOL_INSERT_OUTCOMES,
                &["sync_contribution", outcome_label(outcome)],
            );
            metrics::set_gauge(
                &metrics::SYNC_CONTRIBUTION_POOL_SIZE,
                self.num_contributions() as i64,
            );
        }
        outcome
    }

    fn insert_unchecked(
        &mut self,
        contribution: &SyncCommitteeContribution<E>,
    ) -> Result<InsertOutcome, Error> {
        let slot = contribution.slot;
        if slot < self.lowest_permissible_slot {
            return Ok(InsertOutcome::Old {
                lowest_permissible_slot: self.lowest_permissible_slot,
            });
        }

        let key = ContributionKey {
            block_root: contribution.beacon_block_root,
            subcommittee_index: contribution.subcommittee_index,
        };
        let num_participants = contribution.num_set_bits();

        let slot_map = self.contributions.entry(slot).or_default();
        match slot_map.get_mut(&key) {
            Some(best) => {
                if contribution.aggregation_bits == best.sync_subcommittee_bits {
                    Ok(InsertOutcome::AlreadyKnown)
                } else if num_participants > best.num_participants {
                    *best = SyncContributionFast {
                        sync_subcommittee_bits: contribution.aggregation_bits.clone(),
                        num_participants,
                        sync_subcommittee_signature: contribution.signature,
                    };
                    Ok(InsertOutcome::Aggregated)
                } else {
                    Ok(InsertOutcome::NotBetterThan)
                }
            }
            None => {
                if slot_map.len() >= MAX_ITEMS_PER_SLOT {
                    return Err(Error::ReachedMaxItemsPerSlot(MAX_ITEMS_PER_SLOT));
                }
                slot_map.insert(
                    key,
                    SyncContributionFast {
                        sync_subcommittee_bits: contribution.aggregation_bits.clone(),
                        num_participants,
                        sync_subcommittee_signature: contribution.signature,
                    },
                );
                Ok(InsertOutcome::NewData)
            }
        }
    }

    /// The participation count of the best contribution for a key, if any.
    pub fn best_participation(
        &self,
        slot: Slot,
        block_root: Hash256,
        subcommittee_index: u64,
    ) -> Option<usize> {
        self.contributions.get(&slot)?.get(&ContributionKey {
            block_root,
            subcommittee_index,
        })
        .map(|best| best.num_participants)
    }

    /// Produce the `SyncAggregate` for a block proposal at `slot + 1` referencing
    /// `prev_block_root`: merge each subcommittee's best bits at its offset within the full
    /// committee bitfield and aggregate the four signatures.
    ///
    /// If no contributions exist the empty aggregate (zero bits, point-at-infinity signature)
    /// is returned.
    pub fn get_aggregate(
        &self,
        slot: Slot,
        prev_block_root: Hash256,
    ) -> Result<SyncAggregate<E>, Error> {
        let mut sync_aggregate = SyncAggregate::new();
        let mut aggregate_signature = bls::AggregateSignature::infinity();
        let mut any_contribution = false;

        let subcommittee_size = E::SyncSubcommitteeSize::to_usize();

        for subcommittee_index in 0..SYNC_COMMITTEE_SUBNET_COUNT {
            let best = self
                .contributions
                .get(&slot)
                .and_then(|slot_map| {
                    slot_map.get(&ContributionKey {
                        block_root: prev_block_root,
                        subcommittee_index,
                    })
                });

            if let Some(best) = best {
                for bit in 0..subcommittee_size {
                    if best.sync_subcommittee_bits.get(bit).unwrap_or(false) {
                        sync_aggregate
                            .sync_committee_bits
                            .set(subcommittee_index as usize * subcommittee_size + bit, true)?;
                    }
                }
                let signature =
                    bls::AggregateSignature::try_from(&best.sync_subcommittee_signature)
                        .map_err(Error::Bls)?;
                aggregate_signature.add_assign_aggregate(&signature);
                any_contribution = true;
            }
        }

        if any_contribution {
            sync_aggregate.sync_committee_signature =
                bls::SignatureBytes::from(&aggregate_signature);
        }

        Ok(sync_aggregate)
    }

    /// Advance the window, dropping contributions more than `SLOTS_RETAINED` behind.
    pub fn prune(&mut self, current_slot: Slot) {
        let lowest_permissible_slot =
            current_slot.saturating_sub(Slot::new(SLOTS_RETAINED as u64));
        self.lowest_permissible_slot = lowest_permissible_slot;
        self.contributions
            .retain(|slot, _| *slot >= lowest_permissible_slot);
    }

    pub fn num_contributions(&self) -> usize {
        self.contributions.values().map(HashMap::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use types::{FixedBytesExtended, MainnetEthSpec};

    type E = MainnetEthSpec;

    fn contribution(
        slot: u64,
        block_root: Hash256,
        subcommittee_index: u64,
        bits: &[usize],
    ) -> SyncCommitteeContribution<E> {
        let mut aggregation_bits = BitVector::new();
        for &bit in bits {
            aggregation_bits.set(bit, true).unwrap();
        }
        SyncCommitteeContribution {
            slot: Slot::new(slot),
            beacon_block_root: block_root,
            subcommittee_index,
            aggregation_bits,
            signature: bls::SignatureBytes::from(&bls::AggregateSignature::infinity()),
        }
    }

    #[test]
    fn empty_pool_returns_empty_aggregate() {
        let pool = SyncContributionAndProofPool::<E>::default();
        let aggregate = pool.get_aggregate(Slot::new(1), Hash256::zero()).unwrap();

        assert_eq!(aggregate.num_set_bits(), 0);
        assert!(aggregate.sync_committee_signature.is_infinity());
    }

    #[test]
    fn best_contribution_wins() {
        let mut pool = SyncContributionAndProofPool::<E>::default();
        let root = Hash256::repeat_byte(1);

        let two_bits = contribution(1, root, 0, &[0, 1]);
        let one_bit = contribution(1, root, 0, &[5]);
        let three_bits = contribution(1, root, 0, &[2, 3, 4]);

        assert_eq!(pool.insert(&two_bits).unwrap(), InsertOutcome::NewData);
        assert_eq!(pool.insert(&one_bit).unwrap(), InsertOutcome::NotBetterThan);
        assert_eq!(pool.insert(&three_bits).unwrap(), InsertOutcome::Aggregated);
        assert_eq!(
            pool.insert(&three_bits).unwrap(),
            InsertOutcome::AlreadyKnown
        );

        // The best participation count never decreases.
        assert_eq!(pool.best_participation(Slot::new(1), root, 0), Some(3));
    }

    #[test]
    fn aggregate_merges_subcommittees_at_their_offsets() {
        let mut pool = SyncContributionAndProofPool::<E>::default();
        let root = Hash256::repeat_byte(2);
        let subcommittee_size = <E as EthSpec>::SyncSubcommitteeSize::to_usize();

        pool.insert(&contribution(1, root, 0, &[0])).unwrap();
        pool.insert(&contribution(1, root, 3, &[7])).unwrap();

        let aggregate = pool.get_aggregate(Slot::new(1), root).unwrap();
        assert_eq!(aggregate.num_set_bits(), 2);
        assert!(aggregate.sync_committee_bits.get(0).unwrap());
        assert!(aggregate
            .sync_committee_bits
            .get(3 * subcommittee_size + 7)
            .unwrap());
    }

    #[test]
    fn contributions_for_other_roots_are_ignored() {
        let mut pool = SyncContributionAndProofPool::<E>::default();
        let root_a = Hash256::repeat_byte(3);
        let root_b = Hash256::repeat_byte(4);

        pool.insert(&contribution(1, root_a, 0, &[0])).unwrap();

        let aggregate = pool.get_aggregate(Slot::new(1), root_b).unwrap();
        assert_eq!(aggregate.num_set_bits(), 0);
    }

    #[test]
    fn prune_respects_retention_window() {
        let mut pool = SyncContributionAndProofPool::<E>::default();
        let root = Hash256::repeat_byte(5);

        pool.insert(&contribution(1, root, 0, &[0])).unwrap();
        pool.prune(Slot::new(10));

        assert_eq!(pool.num_contributions(), 0);
        assert!(matches!(
            pool.insert(&contribution(1, root, 0, &[0])).unwrap(),
            InsertOutcome::Old { .. },
        ));
    }
}
