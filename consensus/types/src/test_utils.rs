//! Deterministic fixture builders used by tests across the workspace.
//!
//! States are constructed directly (not via genesis + upgrades) so that a test can get a state
//! of any fork without pulling in the state-transition crate.

use crate::*;
use std::sync::Arc;

/// Generate `count` interop-style keypairs, derived deterministically from the validator index.
pub fn generate_deterministic_keypairs(count: usize) -> Vec<Keypair> {
    (0..count)
        .map(|i| Keypair::deterministic(i as u64))
        .collect()
}

/// An active validator with an execution withdrawal credential and max effective balance.
pub fn test_validator(index: u64, spec: &ChainSpec) -> Validator {
    let mut credentials = [0u8; 32];
    credentials[0] = spec.eth1_address_withdrawal_prefix_byte;
    credentials[24..].copy_from_slice(&index.to_be_bytes());

    Validator {
        pubkey: Keypair::deterministic(index).pk.compress(),
        withdrawal_credentials: Hash256::from(credentials),
        effective_balance: spec.max_effective_balance,
        slashed: false,
        activation_eligibility_epoch: Epoch::new(0),
        activation_epoch: Epoch::new(0),
        exit_epoch: spec.far_future_epoch,
        withdrawable_epoch: spec.far_future_epoch,
    }
}

/// A block of the base fork with an empty body, for root/header plumbing tests.
pub fn sample_base_block<E: EthSpec>(slot: Slot) -> BeaconBlock<E> {
    let mut block = BeaconBlock::empty(&ChainSpec::mainnet());
    if let BeaconBlock::Base(ref mut inner) = block {
        inner.slot = slot;
        inner.proposer_index = 0;
        inner.parent_root = Hash256::repeat_byte(1);
        inner.state_root = Hash256::repeat_byte(2);
    }
    block
}

/// Build a state at `slot` with `validator_count` active validators, of the fork the `spec`
/// schedules for that slot.
///
/// Committee and pubkey caches are left unbuilt; call `state.build_caches(spec)` if needed.
pub struct TestingStateBuilder;

impl TestingStateBuilder {
    pub fn build<E: EthSpec>(slot: Slot, validator_count: usize, spec: &ChainSpec) -> BeaconState<E> {
        let fork_name = spec.fork_name_at_slot::<E>(slot);

        let validators = VariableList::new(
            (0..validator_count as u64)
                .map(|i| test_validator(i, spec))
                .collect(),
        )
        .expect("validator count under registry limit");
        let balances = VariableList::new(vec![spec.max_effective_balance; validator_count])
            .expect("validator count under registry limit");

        let fork = Fork {
            previous_version: fork_name
                .previous_fork()
                .map(|f| spec.fork_version_for_name(f))
                .unwrap_or(spec.genesis_fork_version),
            current_version: spec.fork_version_for_name(fork_name),
            epoch: fork_name.activation_epoch(spec).unwrap_or(Epoch::new(0)),
        };

        let latest_block_header = BeaconBlockHeader {
            slot: slot.saturating_sub(1u64),
            proposer_index: 0,
            parent_root: Hash256::default(),
            state_root: Hash256::default(),
            body_root: Hash256::repeat_byte(0x01),
        };

        let block_roots = FixedVector::from_elem(Hash256::repeat_byte(0xbe));
        let state_roots = FixedVector::from_elem(Hash256::default());
        let randao_mixes = FixedVector::from_elem(Hash256::repeat_byte(0x42));
        let slashings = FixedVector::from_elem(0);

        let participation = VariableList::new(vec![
            ParticipationFlags::default();
            validator_count
        ])
        .expect("validator count under registry limit");
        let inactivity_scores = VariableList::new(vec![0; validator_count])
            .expect("validator count under registry limit");
        let sync_committee = Arc::new(SyncCommittee::temporary());

        let caches = StateCaches::default();

        match fork_name {
            ForkName::Base => BeaconState::Base(BeaconStateBase {
                genesis_time: 0,
                genesis_validators_root: Hash256::default(),
                slot,
                fork,
                latest_block_header,
                block_roots,
                state_roots,
                historical_roots: VariableList::empty(),
                eth1_data: Eth1Data {
                    deposit_count: validator_count as u64,
                    ..Eth1Data::default()
                },
                eth1_data_votes: VariableList::empty(),
                eth1_deposit_index: validator_count as u64,
                validators,
                balances,
                randao_mixes,
                slashings,
                previous_epoch_attestations: VariableList::empty(),
                current_epoch_attestations: VariableList::empty(),
                justification_bits: BitVector::new(),
                previous_justified_checkpoint: Checkpoint::default(),
                current_justified_checkpoint: Checkpoint::default(),
                finalized_checkpoint: Checkpoint::default(),
                total_active_balance: caches.total_active_balance,
                committee_caches: caches.committee_caches,
                pubkey_cache: caches.pubkey_cache,
                exit_cache: caches.exit_cache,
                progressive_balances_cache: caches.progressive_balances_cache,
                epoch_cache: caches.epoch_cache,
            }),
            ForkName::Altair => BeaconState::Altair(BeaconStateAltair {
                genesis_time: 0,
                genesis_validators_root: Hash256::default(),
                slot,
                fork,
                latest_block_header,
                block_roots,
                state_roots,
                historical_roots: VariableList::empty(),
                eth1_data: Eth1Data::default(),
                eth1_data_votes: VariableList::empty(),
                eth1_deposit_index: validator_count as u64,
                validators,
                balances,
                randao_mixes,
                slashings,
                previous_epoch_participation: participation.clone(),
                current_epoch_participation: participation,
                justification_bits: BitVector::new(),
                previous_justified_checkpoint: Checkpoint::default(),
                current_justified_checkpoint: Checkpoint::default(),
                finalized_checkpoint: Checkpoint::default(),
                inactivity_scores,
                current_sync_committee: sync_committee.clone(),
                next_sync_committee: sync_committee,
                total_active_balance: caches.total_active_balance,
                committee_caches: caches.committee_caches,
                pubkey_cache: caches.pubkey_cache,
                exit_cache: caches.exit_cache,
                progressive_balances_cache: caches.progressive_balances_cache,
                epoch_cache: caches.epoch_cache,
            }),
            ForkName::Bellatrix => BeaconState::Bellatrix(BeaconStateBellatrix {
                genesis_time: 0,
                genesis_validators_root: Hash256::default(),
                slot,
                fork,
                latest_block_header,
                block_roots,
                state_roots,
                historical_roots: VariableList::empty(),
                eth1_data: Eth1Data::default(),
                eth1_data_votes: VariableList::empty(),
                eth1_deposit_index: validator_count as u64,
                validators,
                balances,
                randao_mixes,
                slashings,
                previous_epoch_participation: participation.clone(),
                current_epoch_participation: participation,
                justification_bits: BitVector::new(),
                previous_justified_checkpoint: Checkpoint::default(),
                current_justified_checkpoint: Checkpoint::default(),
                finalized_checkpoint: Checkpoint::default(),
                inactivity_scores,
                current_sync_committee: sync_committee.clone(),
                next_sync_committee: sync_committee,
                latest_execution_payload_header: ExecutionPayloadHeaderBellatrix::default(),
                total_active_balance: caches.total_active_balance,
                committee_caches: caches.committee_caches,
                pubkey_cache: caches.pubkey_cache,
                exit_cache: caches.exit_cache,
                progressive_balances_cache: caches.progressive_balances_cache,
                epoch_cache: caches.epoch_cache,
            }),
            ForkName::Capella => BeaconState::Capella(BeaconStateCapella {
                genesis_time: 0,
                genesis_validators_root: Hash256::default(),
                slot,
                fork,
                latest_block_header,
                block_roots,
                state_roots,
                historical_roots: VariableList::empty(),
                eth1_data: Eth1Data::default(),
                eth1_data_votes: VariableList::empty(),
                eth1_deposit_index: validator_count as u64,
                validators,
                balances,
                randao_mixes,
                slashings,
                previous_epoch_participation: participation.clone(),
                current_epoch_participation: participation,
                justification_bits: BitVector::new(),
                previous_justified_checkpoint: Checkpoint::default(),
                current_justified_checkpoint: Checkpoint::default(),
                finalized_checkpoint: Checkpoint::default(),
                inactivity_scores,
                current_sync_committee: sync_committee.clone(),
                next_sync_committee: sync_committee,
                latest_execution_payload_header: ExecutionPayloadHeaderCapella::default(),
                next_withdrawal_index: 0,
                next_withdrawal_validator_index: 0,
                historical_summaries: VariableList::empty(),
                total_active_balance: caches.total_active_balance,
                committee_caches: caches.committee_caches,
                pubkey_cache: caches.pubkey_cache,
                exit_cache: caches.exit_cache,
                progressive_balances_cache: caches.progressive_balances_cache,
                epoch_cache: caches.epoch_cache,
            }),
            ForkName::Deneb => BeaconState::Deneb(BeaconStateDeneb {
                genesis_time: 0,
                genesis_validators_root: Hash256::default(),
                slot,
                fork,
                latest_block_header,
                block_roots,
                state_roots,
                historical_roots: VariableList::empty(),
                eth1_data: Eth1Data::default(),
                eth1_data_votes: VariableList::empty(),
                eth1_deposit_index: validator_count as u64,
                validators,
                balances,
                randao_mixes,
                slashings,
                previous_epoch_participation: participation.clone(),
                current_epoch_participation: participation,
                justification_bits: BitVector::new(),
                previous_justified_checkpoint: Checkpoint::default(),
                current_justified_checkpoint: Checkpoint::default(),
                finalized_checkpoint: Checkpoint::default(),
                inactivity_scores,
                current_sync_committee: sync_committee.clone(),
                next_sync_committee: sync_committee,
                latest_execution_payload_header: ExecutionPayloadHeaderDeneb::default(),
                next_withdrawal_index: 0,
                next_withdrawal_validator_index: 0,
                historical_summaries: VariableList::empty(),
                total_active_balance: caches.total_active_balance,
                committee_caches: caches.committee_caches,
                pubkey_cache: caches.pubkey_cache,
                exit_cache: caches.exit_cache,
                progressive_balances_cache: caches.progressive_balances_cache,
                epoch_cache: caches.epoch_cache,
            }),
            ForkName::Electra => BeaconState::Electra(BeaconStateElectra {
                genesis_time: 0,
                genesis_validators_root: Hash256::default(),
                slot,
                fork,
                latest_block_header,
                block_roots,
                state_roots,
                historical_roots: VariableList::empty(),
                eth1_data: Eth1Data::default(),
                eth1_data_votes: VariableList::empty(),
                eth1_deposit_index: validator_count as u64,
                validators,
                balances,
                randao_mixes,
                slashings,
                previous_epoch_participation: participation.clone(),
                current_epoch_participation: participation,
                justification_bits: BitVector::new(),
                previous_justified_checkpoint: Checkpoint::default(),
                current_justified_checkpoint: Checkpoint::default(),
                finalized_checkpoint: Checkpoint::default(),
                inactivity_scores,
                current_sync_committee: sync_committee.clone(),
                next_sync_committee: sync_committee,
                latest_execution_payload_header: ExecutionPayloadHeaderElectra::default(),
                next_withdrawal_index: 0,
                next_withdrawal_validator_index: 0,
                historical_summaries: VariableList::empty(),
                deposit_requests_start_index: u64::MAX,
                deposit_balance_to_consume: 0,
                exit_balance_to_consume: 0,
                earliest_exit_epoch: Epoch::new(0),
                consolidation_balance_to_consume: 0,
                earliest_consolidation_epoch: Epoch::new(0),
                pending_deposits: VariableList::empty(),
                pending_partial_withdrawals: VariableList::empty(),
                pending_consolidations: VariableList::empty(),
                total_active_balance: caches.total_active_balance,
                committee_caches: caches.committee_caches,
                pubkey_cache: caches.pubkey_cache,
                exit_cache: caches.exit_cache,
                progressive_balances_cache: caches.progressive_balances_cache,
                epoch_cache: caches.epoch_cache,
            }),
            ForkName::Fulu => BeaconState::Fulu(BeaconStateFulu {
                genesis_time: 0,
                genesis_validators_root: Hash256::default(),
                slot,
                fork,
                latest_block_header,
                block_roots,
                state_roots,
                historical_roots: VariableList::empty(),
                eth1_data: Eth1Data::default(),
                eth1_data_votes: VariableList::empty(),
                eth1_deposit_index: validator_count as u64,
                validators,
                balances,
                randao_mixes,
                slashings,
                previous_epoch_participation: participation.clone(),
                current_epoch_participation: participation,
                justification_bits: BitVector::new(),
                previous_justified_checkpoint: Checkpoint::default(),
                current_justified_checkpoint: Checkpoint::default(),
                finalized_checkpoint: Checkpoint::default(),
                inactivity_scores,
                current_sync_committee: sync_committee.clone(),
                next_sync_committee: sync_committee,
                latest_execution_payload_header: ExecutionPayloadHeaderFulu::default(),
                next_withdrawal_index: 0,
                next_withdrawal_validator_index: 0,
                historical_summaries: VariableList::empty(),
                deposit_requests_start_index: u64::MAX,
                deposit_balance_to_consume: 0,
                exit_balance_to_consume: 0,
                earliest_exit_epoch: Epoch::new(0),
                consolidation_balance_to_consume: 0,
                earliest_consolidation_epoch: Epoch::new(0),
                pending_deposits: VariableList::empty(),
                pending_partial_withdrawals: VariableList::empty(),
                pending_consolidations: VariableList::empty(),
                total_active_balance: caches.total_active_balance,
                committee_caches: caches.committee_caches,
                pubkey_cache: caches.pubkey_cache,
                exit_cache: caches.exit_cache,
                progressive_balances_cache: caches.progressive_balances_cache,
                epoch_cache: caches.epoch_cache,
            }),
            ForkName::Gloas => BeaconState::Gloas(BeaconStateGloas {
                genesis_time: 0,
                genesis_validators_root: Hash256::default(),
                slot,
                fork,
                latest_block_header,
                block_roots,
                state_roots,
                historical_roots: VariableList::empty(),
                eth1_data: Eth1Data::default(),
                eth1_data_votes: VariableList::empty(),
                eth1_deposit_index: validator_count as u64,
                validators,
                balances,
                randao_mixes,
                slashings,
                previous_epoch_participation: participation.clone(),
                current_epoch_participation: participation,
                justification_bits: BitVector::new(),
                previous_justified_checkpoint: Checkpoint::default(),
                current_justified_checkpoint: Checkpoint::default(),
                finalized_checkpoint: Checkpoint::default(),
                inactivity_scores,
                current_sync_committee: sync_committee.clone(),
                next_sync_committee: sync_committee,
                latest_execution_payload_bid: ExecutionPayloadBid::default(),
                next_withdrawal_index: 0,
                next_withdrawal_validator_index: 0,
                historical_summaries: VariableList::empty(),
                deposit_requests_start_index: u64::MAX,
                deposit_balance_to_consume: 0,
                exit_balance_to_consume: 0,
                earliest_exit_epoch: Epoch::new(0),
                consolidation_balance_to_consume: 0,
                earliest_consolidation_epoch: Epoch::new(0),
                pending_deposits: VariableList::empty(),
                pending_partial_withdrawals: VariableList::empty(),
                pending_consolidations: VariableList::empty(),
                execution_payload_availability: BitVector::new(),
                builder_pending_payments: FixedVector::from_elem(
                    BuilderPendingPayment::default(),
                ),
                builder_pending_withdrawals: VariableList::empty(),
                latest_block_hash: ExecutionBlockHash::zero(),
                latest_full_slot: slot,
                total_active_balance: caches.total_active_balance,
                committee_caches: caches.committee_caches,
                pubkey_cache: caches.pubkey_cache,
                exit_cache: caches.exit_cache,
                progressive_balances_cache: caches.progressive_balances_cache,
                epoch_cache: caches.epoch_cache,
            }),
        }
    }
}

struct StateCaches {
    total_active_balance: Option<(Epoch, u64)>,
    committee_caches: [Arc<CommitteeCache>; CACHED_EPOCHS],
    pubkey_cache: PubkeyCache,
    exit_cache: ExitCache,
    progressive_balances_cache: ProgressiveBalancesCache,
    epoch_cache: EpochCache,
}

impl Default for StateCaches {
    fn default() -> Self {
        Self {
            total_active_balance: None,
            committee_caches: [
                Arc::new(CommitteeCache::default()),
                Arc::new(CommitteeCache::default()),
                Arc::new(CommitteeCache::default()),
            ],
            pubkey_cache: PubkeyCache::default(),
            exit_cache: ExitCache::default(),
            progressive_balances_cache: ProgressiveBalancesCache::default(),
            epoch_cache: EpochCache::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MinimalEthSpec;

    type E = MinimalEthSpec;

    #[test]
    fn builds_a_state_for_every_fork() {
        let spec = ChainSpec::all_forks_at_genesis();
        let state = TestingStateBuilder::build::<E>(Slot::new(8), 16, &spec);
        assert_eq!(state.fork_name_unchecked(), ForkName::Fulu);
        assert_eq!(state.validators().len(), 16);

        let base_spec = ChainSpec::minimal();
        let state = TestingStateBuilder::build::<E>(Slot::new(8), 16, &base_spec);
        assert_eq!(state.fork_name_unchecked(), ForkName::Base);
    }

    #[test]
    fn built_state_supports_committee_caches() {
        let spec = ChainSpec::all_forks_at_genesis();
        let mut state = TestingStateBuilder::build::<E>(Slot::new(8), 32, &spec);
        state.build_caches(&spec).unwrap();
        let committee = state.get_beacon_committee(Slot::new(8), 0).unwrap();
        assert!(!committee.committee.is_empty());
    }
}
