use crate::per_block_processing::errors::{AttestationInvalid as Invalid, BlockOperationError};
use safe_arith::SafeArith;
use types::{AttestationElectra, BeaconCommittee, BitList, BitVector, EthSpec};

type Result<T> = std::result::Result<T, BlockOperationError<Invalid>>;

/// Returns validator indices which participated in the attestation, sorted by increasing index.
///
/// Committees must be sorted by ascending order 0..committees_per_slot
pub fn attesting_indices_base<E: EthSpec>(
    aggregation_bits: &BitList<E::MaxValidatorsPerCommittee>,
    committee: &BeaconCommittee,
) -> Result<Vec<u64>> {
    if aggregation_bits.len() != committee.committee.len() {
        return Err(BlockOperationError::invalid(Invalid::BadAggregationBitfieldLength {
            committee_len: committee.committee.len(),
            bitfield_len: aggregation_bits.len(),
        }));
    }

    let mut indices = Vec::with_capacity(aggregation_bits.num_set_bits());

    for (i, validator_index) in committee.committee.iter().enumerate() {
        if aggregation_bits.get(i).unwrap_or(false) {
            indices.push(*validator_index as u64)
        }
    }

    indices.sort_unstable();

    Ok(indices)
}

/// Returns validator indices which participated in an electra attestation, which may span
/// multiple committees of the slot.
pub fn attesting_indices_electra<E: EthSpec>(
    aggregation_bits: &BitList<E::MaxValidatorsPerCommitteePerSlot>,
    committee_bits: &BitVector<E::MaxCommitteesPerSlot>,
    committees: &[BeaconCommittee],
) -> Result<Vec<u64>> {
    let mut attesting_indices = vec![];

    let committee_indices = get_committee_indices::<E>(committee_bits);

    let mut committee_offset = 0;
    for committee_index in committee_indices {
        let beacon_committee = committees
            .get(committee_index as usize)
            .ok_or(BlockOperationError::invalid(Invalid::BadCommitteeIndex))?;

        let committee_attesters = beacon_committee
            .committee
            .iter()
            .enumerate()
            .filter_map(|(i, &index)| {
                if let Ok(aggregation_bit_index) = committee_offset.safe_add(i) {
                    if aggregation_bits.get(aggregation_bit_index).unwrap_or(false) {
                        return Some(index as u64);
                    }
                }
                None
            })
            .collect::<Vec<_>>();

        attesting_indices.extend(committee_attesters);
        committee_offset.safe_add_assign(beacon_committee.committee.len())?;
    }

    // The bitfield must cover the committees exactly.
    if committee_offset != aggregation_bits.len() {
        return Err(BlockOperationError::invalid(Invalid::BadAggregationBitfieldLength {
            committee_len: committee_offset,
            bitfield_len: aggregation_bits.len(),
        }));
    }

    attesting_indices.sort_unstable();

    Ok(attesting_indices)
}

/// Shorthand for the attesting indices of an owned electra attestation against known committees.
pub fn attesting_indices_for_electra_attestation<E: EthSpec>(
    attestation: &AttestationElectra<E>,
    committees: &[BeaconCommittee],
) -> Result<Vec<u64>> {
    attesting_indices_electra::<E>(
        &attestation.aggregation_bits,
        &attestation.committee_bits,
        committees,
    )
}

fn get_committee_indices<E: EthSpec>(
    committee_bits: &BitVector<E::MaxCommitteesPerSlot>,
) -> Vec<u64> {
    committee_bits
        .iter()
        .enumerate()
        .filter_map(|(index, bit)| if bit { Some(index as u64) } else { None })
        .collect()
}
