pub use crate::consensus_context::ConsensusContext;
use errors::{BlockOperationError, BlockProcessingError, HeaderInvalid};
use safe_arith::{ArithError, SafeArith};
use signature_sets::{block_proposal_signature_set, get_pubkey_from_state, randao_signature_set};
use std::borrow::Cow;
use types::{
    BeaconBlockRef, BeaconState, BeaconStateError, ChainSpec, EthSpec, ExecutionPayloadBid,
    ExecutionPayloadHeader, ExecutionPayloadRef, SignedBeaconBlock, SignedRoot, Slot, Unsigned,
    Withdrawal, Withdrawals,
};

pub mod altair;
pub mod block_signature_verifier;
pub mod errors;
mod is_valid_indexed_attestation;
pub mod process_operations;
pub mod signature_sets;
mod verify_attestation;
mod verify_attester_slashing;
mod verify_bls_to_execution_change;
mod verify_deposit;
mod verify_exit;
mod verify_proposer_slashing;

pub use self::verify_attester_slashing::{
    get_slashable_indices, get_slashable_indices_modular, verify_attester_slashing,
};
pub use self::verify_proposer_slashing::verify_proposer_slashing;
pub use altair::sync_committee::process_sync_aggregate;
pub use block_signature_verifier::{BlockSignatureVerifier, ParallelSignatureSets};
pub use is_valid_indexed_attestation::is_valid_indexed_attestation;
pub use process_operations::process_operations;
pub use verify_attestation::{
    verify_attestation_for_block_inclusion, verify_attestation_for_state,
};
pub use verify_bls_to_execution_change::verify_bls_to_execution_change;
pub use verify_deposit::{
    get_existing_validator_index, verify_deposit_merkle_proof, verify_deposit_signature,
};
pub use verify_exit::verify_exit;

use crate::common::decrease_balance;
use crate::common::update_progressive_balances_cache::initialize_progressive_balances_cache;
use crate::epoch_cache::initialize_epoch_cache;
use crate::BlockSignatureStrategy;

/// The strategy to be used when validating the block's signatures.
#[derive(PartialEq, Clone, Copy, Debug)]
pub enum VerifySignatures {
    /// Validate all signatures encountered.
    True,
    /// Do not validate any signature. Use with caution.
    False,
}

impl VerifySignatures {
    pub fn is_true(self) -> bool {
        self == VerifySignatures::True
    }
}

/// Control verification of the latest block header.
#[derive(PartialEq, Clone, Copy, Debug)]
pub enum VerifyBlockRoot {
    True,
    False,
}

/// The result of the execution engine's verdict on the block's payload, as known to the caller.
///
/// The state-transition itself never talks to the engine; the import pipeline resolves the
/// payload status up-front (possibly optimistically) and passes the verdict in.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ExecutionPayloadStatus {
    /// The block predates the merge and carries no payload.
    PreMerge,
    /// The engine (or an optimistic assumption) holds the payload to be valid.
    Valid,
    /// The engine deemed the payload invalid.
    Invalid,
}

/// Whether the block's blob or column data has been checked for availability.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum DataAvailabilityStatus {
    /// The block predates data availability requirements.
    PreData,
    /// The block is outside the data-availability retention window; data is not required.
    OutOfRange,
    /// All required sidecar data is held and KZG-verified.
    Available,
}

/// Externally resolved facts about a block that the pure state-transition cannot compute itself.
#[derive(Debug, Clone, Copy)]
pub struct ExternalBlockData {
    pub execution_payload_status: ExecutionPayloadStatus,
    pub data_availability_status: DataAvailabilityStatus,
}

impl ExternalBlockData {
    /// Assume the payload is valid and data is available. Used for trusted blocks (e.g. blocks
    /// we produced ourselves) and in tests.
    pub fn assume_valid() -> Self {
        Self {
            execution_payload_status: ExecutionPayloadStatus::Valid,
            data_availability_status: DataAvailabilityStatus::Available,
        }
    }
}

/// The expected withdrawals for a state, along with bookkeeping about which queues they came
/// from.
pub struct ExpectedWithdrawals<E: EthSpec> {
    pub withdrawals: Withdrawals<E>,
    /// The number of builder pending withdrawals consumed (gloas only).
    pub processed_builder_withdrawals_count: usize,
    /// The number of pending partial withdrawals consumed (electra onwards).
    pub processed_partial_withdrawals_count: Option<usize>,
}

/// Updates the state for a new block, whilst validating that the block is valid, optionally
/// checking the block proposer signature.
///
/// Returns `Ok(())` if the block is valid and the state was successfully updated. Otherwise
/// returns an error describing why the block was invalid or how the function failed to execute.
///
/// If `block_root` is `Some`, this root is used for verification of the proposer's signature. If
/// it is `None` the signing root is computed from scratch. This parameter only exists to avoid
/// re-calculating the root when it is already known.
pub fn per_block_processing<E: EthSpec>(
    state: &mut BeaconState<E>,
    signed_block: &SignedBeaconBlock<E>,
    block_signature_strategy: BlockSignatureStrategy,
    verify_block_root: VerifyBlockRoot,
    external_data: ExternalBlockData,
    ctxt: &mut ConsensusContext<E>,
    spec: &ChainSpec,
) -> Result<(), BlockProcessingError> {
    let block = signed_block.message();

    // Verify that the `SignedBeaconBlock` instantiation matches the fork at `signed_block.slot()`.
    signed_block
        .fork_name(spec)
        .map_err(BlockProcessingError::InconsistentBlockFork)?;

    // Verify that the `BeaconState` instantiation matches the fork at `state.slot()`.
    state
        .fork_name(spec)
        .map_err(BlockProcessingError::InconsistentStateFork)?;

    // Build epoch caches so that the lookups during operation processing are cheap.
    initialize_epoch_cache(state, spec)?;
    initialize_progressive_balances_cache(state, spec)?;
    state.build_exit_cache(spec)?;

    let verify_signatures = match block_signature_strategy {
        BlockSignatureStrategy::VerifyBulk => {
            // Verify all signatures in the block at once.
            block_verify!(
                BlockSignatureVerifier::verify_entire_block(
                    state,
                    |i| get_pubkey_from_state(state, i),
                    |pk_bytes| pk_bytes.decompress().ok().map(Cow::Owned),
                    signed_block,
                    ctxt,
                    spec
                )
                .is_ok(),
                BlockProcessingError::BulkSignatureVerificationFailed
            );
            VerifySignatures::False
        }
        BlockSignatureStrategy::VerifyIndividual => VerifySignatures::True,
        BlockSignatureStrategy::NoVerification => VerifySignatures::False,
        BlockSignatureStrategy::VerifyRandao => VerifySignatures::False,
    };

    let proposer_index = process_block_header(state, block.temporary_block_header(), verify_block_root, ctxt, spec)?;

    if verify_signatures.is_true() {
        verify_block_signature(state, signed_block, ctxt, spec)?;
    }

    let verify_randao = if let BlockSignatureStrategy::VerifyRandao = block_signature_strategy {
        VerifySignatures::True
    } else {
        verify_signatures
    };

    process_randao(state, block, verify_randao, ctxt, spec)?;
    process_eth1_data(state, block.body().eth1_data())?;
    process_operations(state, block.body(), verify_signatures, ctxt, spec)?;

    if let Ok(sync_aggregate) = block.body().sync_aggregate() {
        process_sync_aggregate(state, sync_aggregate, proposer_index, verify_signatures, spec)?;
    }

    if state.fork_name_unchecked().gloas_enabled() {
        // ePBS blocks commit to the payload via a signed builder bid; the payload itself is
        // verified later against the execution-payload envelope.
        process_withdrawals_gloas(state, spec)?;
        process_execution_payload_bid(state, block, verify_signatures, spec)?;
        process_payload_attestations(state, block, verify_signatures, spec)?;
    } else if state.fork_name_unchecked().capella_enabled() {
        let payload = block.body().execution_payload()?;
        process_withdrawals(state, payload, spec)?;
        process_execution_payload(state, block.slot(), payload, external_data, spec)?;
    } else if is_execution_enabled(state, block.body())? {
        let payload = block.body().execution_payload()?;
        process_execution_payload(state, block.slot(), payload, external_data, spec)?;
    }

    verify_data_availability(block.body().blob_kzg_commitments_len(), external_data)?;

    Ok(())
}

/// Processes the block header, returning the proposer index.
pub fn process_block_header<E: EthSpec>(
    state: &mut BeaconState<E>,
    block_header: types::BeaconBlockHeader,
    verify_block_root: VerifyBlockRoot,
    ctxt: &mut ConsensusContext<E>,
    spec: &ChainSpec,
) -> Result<u64, BlockOperationError<HeaderInvalid>> {
    // Verify that the slots match
    verify!(
        block_header.slot == state.slot(),
        HeaderInvalid::StateSlotMismatch
    );

    // Verify that the block is newer than the latest block header
    verify!(
        block_header.slot > state.latest_block_header().slot,
        HeaderInvalid::OlderThanLatestBlockHeader {
            block_slot: block_header.slot,
            latest_block_header_slot: state.latest_block_header().slot,
        }
    );

    // Verify that proposer index is the correct index
    let proposer_index = block_header.proposer_index;
    let state_proposer_index = ctxt.get_proposer_index(state, spec)?;
    verify!(
        proposer_index == state_proposer_index,
        HeaderInvalid::ProposerIndexMismatch {
            block_proposer_index: proposer_index,
            state_proposer_index,
        }
    );

    if verify_block_root == VerifyBlockRoot::True {
        let expected_previous_block_root = state.latest_block_header().canonical_root();
        verify!(
            block_header.parent_root == expected_previous_block_root,
            HeaderInvalid::ParentBlockRootMismatch {
                state: expected_previous_block_root,
                block: block_header.parent_root,
            }
        );
    }

    *state.latest_block_header_mut() = block_header;

    // Verify proposer is not slashed
    verify!(
        !state.get_validator(proposer_index as usize)?.slashed,
        HeaderInvalid::ProposerSlashed(proposer_index)
    );

    Ok(proposer_index)
}

/// Verifies the signature of a block.
pub fn verify_block_signature<E: EthSpec>(
    state: &BeaconState<E>,
    block: &SignedBeaconBlock<E>,
    ctxt: &mut ConsensusContext<E>,
    spec: &ChainSpec,
) -> Result<(), BlockOperationError<HeaderInvalid>> {
    let block_root = Some(ctxt.get_current_block_root(block)?);
    let proposer_index = Some(ctxt.get_proposer_index(state, spec)?);
    verify!(
        block_proposal_signature_set(
            state,
            |i| get_pubkey_from_state(state, i),
            block,
            block_root,
            proposer_index,
            spec
        )?
        .verify(),
        HeaderInvalid::ProposalSignatureInvalid
    );

    Ok(())
}

/// Verifies the `randao_reveal` against the block's proposer pubkey and updates
/// `state.latest_randao_mixes`.
pub fn process_randao<E: EthSpec>(
    state: &mut BeaconState<E>,
    block: BeaconBlockRef<'_, E>,
    verify_signatures: VerifySignatures,
    ctxt: &mut ConsensusContext<E>,
    spec: &ChainSpec,
) -> Result<(), BlockProcessingError> {
    if verify_signatures.is_true() {
        // Verify RANDAO reveal signature.
        let proposer_index = ctxt.get_proposer_index(state, spec)?;
        block_verify!(
            randao_signature_set(
                state,
                |i| get_pubkey_from_state(state, i),
                block,
                Some(proposer_index),
                spec
            )?
            .verify(),
            BlockProcessingError::RandaoSignatureInvalid
        );
    }

    // Update the current epoch RANDAO mix.
    state.update_randao_mix(state.current_epoch(), block.body().randao_reveal())?;

    Ok(())
}

/// Update the `state.eth1_data_votes` based upon the `eth1_data` provided.
pub fn process_eth1_data<E: EthSpec>(
    state: &mut BeaconState<E>,
    eth1_data: &types::Eth1Data,
) -> Result<(), BlockProcessingError> {
    if let Some(new_eth1_data) = get_new_eth1_data(state, eth1_data)? {
        *state.eth1_data_mut() = new_eth1_data;
    }

    state.eth1_data_votes_mut().push(eth1_data.clone())?;

    Ok(())
}

/// Returns `Ok(Some(eth1_data))` if adding the given `eth1_data` to `state.eth1_data_votes` would
/// result in a change to `state.eth1_data`.
pub fn get_new_eth1_data<E: EthSpec>(
    state: &BeaconState<E>,
    eth1_data: &types::Eth1Data,
) -> Result<Option<types::Eth1Data>, ArithError> {
    let num_votes = state
        .eth1_data_votes()
        .iter()
        .filter(|vote| *vote == eth1_data)
        .count();

    // The +1 is to account for the `eth1_data` supplied to the function.
    if num_votes.safe_add(1)?.safe_mul(2)? > E::SlotsPerEth1VotingPeriod::to_usize() {
        Ok(Some(eth1_data.clone()))
    } else {
        Ok(None)
    }
}

/// Performs *partial* verification of the execution payload: the checks that depend only on the
/// state and the payload, not on the execution engine's verdict.
pub fn partially_verify_execution_payload<E: EthSpec>(
    state: &BeaconState<E>,
    block_slot: Slot,
    payload: ExecutionPayloadRef<'_, E>,
    spec: &ChainSpec,
) -> Result<(), BlockProcessingError> {
    if is_merge_transition_complete(state) {
        let expected = state.latest_execution_payload_header()?.block_hash();
        block_verify!(
            payload.parent_hash() == expected,
            BlockProcessingError::ExecutionHashChainIncontiguous {
                expected,
                found: payload.parent_hash(),
            }
        );
    }

    let expected_randao = *state.get_randao_mix(state.current_epoch())?;
    block_verify!(
        payload.prev_randao() == expected_randao,
        BlockProcessingError::ExecutionRandaoMismatch {
            expected: expected_randao,
            found: payload.prev_randao(),
        }
    );

    let expected_timestamp = compute_timestamp_at_slot(state, block_slot, spec)?;
    block_verify!(
        payload.timestamp() == expected_timestamp,
        BlockProcessingError::ExecutionInvalidTimestamp {
            expected: expected_timestamp,
            found: payload.timestamp(),
        }
    );

    Ok(())
}

/// Applies the execution payload to the state, assuming the engine verdict supplied in
/// `external_data` has been resolved by the caller.
pub fn process_execution_payload<E: EthSpec>(
    state: &mut BeaconState<E>,
    block_slot: Slot,
    payload: ExecutionPayloadRef<'_, E>,
    external_data: ExternalBlockData,
    spec: &ChainSpec,
) -> Result<(), BlockProcessingError> {
    partially_verify_execution_payload(state, block_slot, payload, spec)?;

    block_verify!(
        external_data.execution_payload_status != ExecutionPayloadStatus::Invalid,
        BlockProcessingError::ExecutionInvalid
    );

    match (state, ExecutionPayloadHeader::from_payload(payload)) {
        (BeaconState::Bellatrix(state), ExecutionPayloadHeader::Bellatrix(header)) => {
            state.latest_execution_payload_header = header;
        }
        (BeaconState::Capella(state), ExecutionPayloadHeader::Capella(header)) => {
            state.latest_execution_payload_header = header;
        }
        (BeaconState::Deneb(state), ExecutionPayloadHeader::Deneb(header)) => {
            state.latest_execution_payload_header = header;
        }
        (BeaconState::Electra(state), ExecutionPayloadHeader::Electra(header)) => {
            state.latest_execution_payload_header = header;
        }
        (BeaconState::Fulu(state), ExecutionPayloadHeader::Fulu(header)) => {
            state.latest_execution_payload_header = header;
        }
        _ => return Err(BlockProcessingError::IncorrectStateType),
    }

    Ok(())
}

/// Returns `true` once the merge transition payload has been embedded in the state.
pub fn is_merge_transition_complete<E: EthSpec>(state: &BeaconState<E>) -> bool {
    match state.latest_execution_payload_header() {
        Ok(header) => !header.is_default_with_empty_roots(),
        Err(_) => false,
    }
}

/// Returns `true` if the block contains a non-default payload or the transition is complete.
pub fn is_execution_enabled<E: EthSpec>(
    state: &BeaconState<E>,
    body: types::BeaconBlockBodyRef<'_, E>,
) -> Result<bool, BeaconStateError> {
    if !state.fork_name_unchecked().bellatrix_enabled() {
        return Ok(false);
    }
    if is_merge_transition_complete(state) {
        return Ok(true);
    }
    let payload = body.execution_payload()?;
    Ok(!payload.clone_from_ref().is_default_with_empty_roots())
}

/// Compute the timestamp of a slot relative to the state's genesis time.
pub fn compute_timestamp_at_slot<E: EthSpec>(
    state: &BeaconState<E>,
    block_slot: Slot,
    spec: &ChainSpec,
) -> Result<u64, ArithError> {
    let slots_since_genesis = block_slot.as_u64().safe_sub(spec.genesis_slot.as_u64())?;
    slots_since_genesis
        .safe_mul(spec.seconds_per_slot)
        .and_then(|since_genesis| state.genesis_time().safe_add(since_genesis))
}

/// Verify that a block requiring sidecar data has had it checked by the caller.
fn verify_data_availability(
    commitments_len: usize,
    external_data: ExternalBlockData,
) -> Result<(), BlockProcessingError> {
    if commitments_len == 0 {
        return Ok(());
    }
    match external_data.data_availability_status {
        DataAvailabilityStatus::Available | DataAvailabilityStatus::OutOfRange => Ok(()),
        DataAvailabilityStatus::PreData => Err(BlockProcessingError::DataUnavailable),
    }
}

/// Compute the next batch of withdrawals which should be included in a block.
///
/// Queues are drained in a fixed order: builder pending withdrawals (gloas), then pending
/// partial withdrawals (electra), then the bounded validator sweep. All share the
/// `MaxWithdrawalsPerPayload` cap.
pub fn get_expected_withdrawals<E: EthSpec>(
    state: &BeaconState<E>,
    spec: &ChainSpec,
) -> Result<ExpectedWithdrawals<E>, BlockProcessingError> {
    let epoch = state.current_epoch();
    let mut withdrawal_index = state.next_withdrawal_index()?;
    let mut validator_index = state.next_withdrawal_validator_index()?;
    let mut withdrawals: Vec<Withdrawal> = Vec::with_capacity(E::MaxWithdrawalsPerPayload::to_usize());
    let fork_name = state.fork_name_unchecked();

    // Builder payments are settled ahead of any validator withdrawal, bounded to half the
    // payload's withdrawal capacity so they cannot starve the sweep.
    let mut processed_builder_withdrawals_count = 0;
    if let Ok(builder_pending_withdrawals) = state.builder_pending_withdrawals() {
        let builder_cap = E::MaxWithdrawalsPerPayload::to_usize().safe_div(2)?;
        for pending in builder_pending_withdrawals.iter() {
            if withdrawals.len() >= builder_cap {
                break;
            }
            if pending.withdrawable_epoch > epoch {
                break;
            }
            let builder = state.get_validator(pending.builder_index as usize)?;
            if !builder.slashed {
                withdrawals.push(pending.into_withdrawal(withdrawal_index));
                withdrawal_index.safe_add_assign(1)?;
            }
            processed_builder_withdrawals_count.safe_add_assign(1)?;
        }
    }

    // [New in Electra:EIP7251] Consume pending partial withdrawals.
    let processed_partial_withdrawals_count =
        if let Ok(pending_partial_withdrawals) = state.pending_partial_withdrawals() {
            let mut processed_count = 0;
            for withdrawal in pending_partial_withdrawals.iter() {
                if withdrawal.withdrawable_epoch > epoch
                    || withdrawals.len() == spec.max_pending_partials_per_withdrawals_sweep as usize
                {
                    break;
                }

                let validator = state.get_validator(withdrawal.validator_index as usize)?;

                let has_sufficient_effective_balance =
                    validator.effective_balance >= spec.min_activation_balance;
                let total_withdrawn = withdrawals
                    .iter()
                    .filter(|w| w.validator_index == withdrawal.validator_index)
                    .map(|w| w.amount)
                    .sum::<u64>();
                let balance = state
                    .get_balance(withdrawal.validator_index as usize)?
                    .safe_sub(total_withdrawn)?;
                let has_excess_balance = balance > spec.min_activation_balance;

                if validator.exit_epoch == spec.far_future_epoch
                    && has_sufficient_effective_balance
                    && has_excess_balance
                {
                    let withdrawable_balance = std::cmp::min(
                        balance.safe_sub(spec.min_activation_balance)?,
                        withdrawal.amount,
                    );
                    withdrawals.push(Withdrawal {
                        index: withdrawal_index,
                        validator_index: withdrawal.validator_index,
                        address: validator
                            .get_execution_withdrawal_address(spec)
                            .ok_or(BlockProcessingError::WithdrawalCredentialsInvalid)?,
                        amount: withdrawable_balance,
                    });
                    withdrawal_index.safe_add_assign(1)?;
                }
                processed_count.safe_add_assign(1)?;
            }
            Some(processed_count)
        } else {
            None
        };

    let bound = std::cmp::min(
        state.validators().len() as u64,
        spec.max_validators_per_withdrawals_sweep,
    );
    for _ in 0..bound {
        let validator = state.get_validator(validator_index as usize)?;
        let partially_withdrawn_balance = withdrawals
            .iter()
            .filter(|withdrawal| withdrawal.validator_index == validator_index)
            .map(|withdrawal| withdrawal.amount)
            .sum::<u64>();
        let balance = state
            .get_balance(validator_index as usize)?
            .safe_sub(partially_withdrawn_balance)?;
        if validator.is_fully_withdrawable_at(balance, epoch, spec, fork_name) {
            withdrawals.push(Withdrawal {
                index: withdrawal_index,
                validator_index,
                address: validator
                    .get_execution_withdrawal_address(spec)
                    .ok_or(BlockProcessingError::WithdrawalCredentialsInvalid)?,
                amount: balance,
            });
            withdrawal_index.safe_add_assign(1)?;
        } else if validator.is_partially_withdrawable_validator(balance, spec, fork_name) {
            withdrawals.push(Withdrawal {
                index: withdrawal_index,
                validator_index,
                address: validator
                    .get_execution_withdrawal_address(spec)
                    .ok_or(BlockProcessingError::WithdrawalCredentialsInvalid)?,
                amount: balance.safe_sub(validator.get_max_effective_balance(spec, fork_name))?,
            });
            withdrawal_index.safe_add_assign(1)?;
        }
        if withdrawals.len() == E::MaxWithdrawalsPerPayload::to_usize() {
            break;
        }
        validator_index = validator_index
            .safe_add(1)?
            .safe_rem(state.validators().len() as u64)?;
    }

    Ok(ExpectedWithdrawals {
        withdrawals: Withdrawals::<E>::new(withdrawals)
            .map_err(BlockProcessingError::SszTypesError)?,
        processed_builder_withdrawals_count,
        processed_partial_withdrawals_count,
    })
}

/// Apply withdrawals to the state, verifying that the payload's withdrawal list matches the
/// locally computed one element by element.
pub fn process_withdrawals<E: EthSpec>(
    state: &mut BeaconState<E>,
    payload: ExecutionPayloadRef<'_, E>,
    spec: &ChainSpec,
) -> Result<(), BlockProcessingError> {
    let expected = get_expected_withdrawals(state, spec)?;

    let payload_withdrawals = payload.withdrawals()?;
    block_verify!(
        expected.withdrawals.len() == payload_withdrawals.len(),
        BlockProcessingError::WithdrawalsCountMismatch {
            expected: expected.withdrawals.len(),
            found: payload_withdrawals.len(),
        }
    );
    for (expected_withdrawal, found) in expected.withdrawals.iter().zip(payload_withdrawals.iter())
    {
        block_verify!(
            expected_withdrawal == found,
            BlockProcessingError::WithdrawalsPayloadMismatch {
                expected: Box::new(expected_withdrawal.clone()),
                found: Box::new(found.clone()),
            }
        );
    }

    apply_withdrawals(state, expected, spec)
}

/// Apply withdrawals on a gloas state. The payload is not present in the block; the withdrawals
/// root is checked later against the execution-payload envelope.
pub fn process_withdrawals_gloas<E: EthSpec>(
    state: &mut BeaconState<E>,
    spec: &ChainSpec,
) -> Result<(), BlockProcessingError> {
    let expected = get_expected_withdrawals(state, spec)?;
    apply_withdrawals(state, expected, spec)
}

fn apply_withdrawals<E: EthSpec>(
    state: &mut BeaconState<E>,
    expected: ExpectedWithdrawals<E>,
    spec: &ChainSpec,
) -> Result<(), BlockProcessingError> {
    for withdrawal in expected.withdrawals.iter() {
        decrease_balance(state, withdrawal.validator_index as usize, withdrawal.amount)?;
    }

    // Drain the consumed prefix of the builder pending withdrawals queue.
    if expected.processed_builder_withdrawals_count > 0 {
        if let BeaconState::Gloas(gloas_state) = state {
            let remaining: Vec<_> = gloas_state
                .builder_pending_withdrawals
                .iter()
                .skip(expected.processed_builder_withdrawals_count)
                .cloned()
                .collect();
            gloas_state.builder_pending_withdrawals =
                types::VariableList::new(remaining).map_err(BlockProcessingError::SszTypesError)?;
        }
    }

    // Drain the consumed prefix of the pending partial withdrawals queue.
    if let Some(processed) = expected.processed_partial_withdrawals_count {
        if processed > 0 {
            let remaining: Vec<_> = state
                .pending_partial_withdrawals()?
                .iter()
                .skip(processed)
                .cloned()
                .collect();
            let pending = types::VariableList::new(remaining)
                .map_err(BlockProcessingError::SszTypesError)?;
            match state {
                BeaconState::Electra(s) => s.pending_partial_withdrawals = pending,
                BeaconState::Fulu(s) => s.pending_partial_withdrawals = pending,
                BeaconState::Gloas(s) => s.pending_partial_withdrawals = pending,
                _ => return Err(BlockProcessingError::IncorrectStateType),
            }
        }
    }

    // Advance the withdrawal index and the validator sweep cursor.
    let num_withdrawals = expected.withdrawals.len();
    if let Some(latest_withdrawal) = expected.withdrawals.last() {
        *state.next_withdrawal_index_mut()? = latest_withdrawal.index.safe_add(1)?;

        if num_withdrawals == E::MaxWithdrawalsPerPayload::to_usize() {
            // The sweep was cut short by the cap: resume after the last withdrawn validator.
            *state.next_withdrawal_validator_index_mut()? = latest_withdrawal
                .validator_index
                .safe_add(1)?
                .safe_rem(state.validators().len() as u64)?;
            return Ok(());
        }
    }

    // The whole sweep window was scanned.
    *state.next_withdrawal_validator_index_mut()? = state
        .next_withdrawal_validator_index()?
        .safe_add(spec.max_validators_per_withdrawals_sweep)?
        .safe_rem(state.validators().len() as u64)?;

    Ok(())
}

/// Verify the signed builder bid and commit it to the state (gloas, ePBS).
pub fn process_execution_payload_bid<E: EthSpec>(
    state: &mut BeaconState<E>,
    block: BeaconBlockRef<'_, E>,
    verify_signatures: VerifySignatures,
    spec: &ChainSpec,
) -> Result<(), BlockProcessingError> {
    let signed_bid = block.body().signed_execution_payload_bid()?.clone();
    let bid = &signed_bid.message;
    let builder_index = bid.builder_index as usize;

    if verify_signatures.is_true() {
        let builder_pubkey = get_pubkey_from_state(state, builder_index)
            .ok_or(BlockProcessingError::BeaconStateError(
                BeaconStateError::UnknownValidator(builder_index),
            ))?;
        let domain = spec.get_domain(
            block.epoch(),
            types::Domain::BeaconProposer,
            &state.fork(),
            state.genesis_validators_root(),
        );
        let message = bid.signing_root(domain);
        let signature = bls::AggregateSignature::try_from(&signed_bid.signature)
            .map_err(|_| BlockProcessingError::ExecutionBidInvalid {
                reason: "undecodable signature",
            })?;
        block_verify!(
            bls::SignatureSet::single_pubkey(Cow::Owned(signature), builder_pubkey, message)
                .verify(),
            BlockProcessingError::ExecutionBidInvalid {
                reason: "bad signature",
            }
        );
    }

    // The builder must be able to cover the bid on top of everything it already owes.
    let pending_payments: u64 = state
        .builder_pending_payments()?
        .iter()
        .filter(|payment| payment.withdrawal.builder_index as usize == builder_index)
        .map(|payment| payment.withdrawal.amount)
        .sum();
    let pending_withdrawals: u64 = state
        .builder_pending_withdrawals()?
        .iter()
        .filter(|withdrawal| withdrawal.builder_index as usize == builder_index)
        .map(|withdrawal| withdrawal.amount)
        .sum();
    let builder_balance = state.get_balance(builder_index)?;
    block_verify!(
        builder_balance
            >= bid
                .value
                .safe_add(pending_payments)?
                .safe_add(pending_withdrawals)?,
        BlockProcessingError::ExecutionBidInvalid {
            reason: "insufficient builder balance",
        }
    );

    block_verify!(
        bid.slot == block.slot(),
        BlockProcessingError::ExecutionBidInvalid {
            reason: "bid slot mismatch",
        }
    );
    block_verify!(
        bid.parent_block_hash == state.latest_block_hash()?,
        BlockProcessingError::ExecutionBidInvalid {
            reason: "parent block hash mismatch",
        }
    );
    block_verify!(
        bid.parent_block_root == block.parent_root(),
        BlockProcessingError::ExecutionBidInvalid {
            reason: "parent block root mismatch",
        }
    );
    let expected_randao = *state.get_randao_mix(state.current_epoch())?;
    block_verify!(
        bid.prev_randao == expected_randao,
        BlockProcessingError::ExecutionBidInvalid {
            reason: "prev randao mismatch",
        }
    );

    // Record the payment, pending the payload-timeliness quorum.
    let slots_per_epoch = E::slots_per_epoch();
    let payment_index = slots_per_epoch
        .safe_add(block.slot().as_u64().safe_rem(slots_per_epoch)?)?
        as usize;
    let payment = types::BuilderPendingPayment {
        weight: 0,
        withdrawal: types::BuilderPendingWithdrawal {
            fee_recipient: types::Address::ZERO,
            amount: bid.value,
            builder_index: bid.builder_index,
            withdrawable_epoch: state
                .current_epoch()
                .safe_add(spec.min_validator_withdrawability_delay)?,
        },
    };

    let bid_message: ExecutionPayloadBid = bid.clone();
    if let BeaconState::Gloas(gloas_state) = state {
        *gloas_state
            .builder_pending_payments
            .get_mut(payment_index)
            .ok_or(BeaconStateError::SlotOutOfBounds)? = payment;
        gloas_state.latest_execution_payload_bid = bid_message;
        Ok(())
    } else {
        Err(BlockProcessingError::IncorrectStateType)
    }
}

/// The indices of the payload-timeliness committee for `slot`: an equal slice from the head of
/// each beacon committee at the slot.
pub fn get_ptc<E: EthSpec>(
    state: &BeaconState<E>,
    slot: Slot,
) -> Result<Vec<usize>, BlockProcessingError> {
    let committees = state.get_beacon_committees_at_slot(slot)?;
    let committees_per_slot = committees.len().max(1);
    let members_per_committee = E::PtcSize::to_usize().safe_div(committees_per_slot)?;

    let mut indices = Vec::with_capacity(E::PtcSize::to_usize());
    for committee in committees {
        indices.extend(
            committee
                .committee
                .iter()
                .take(members_per_committee)
                .copied(),
        );
    }
    Ok(indices)
}

/// Verify each payload attestation and accumulate quorum weight for the parent slot's builder
/// payment (gloas, ePBS).
pub fn process_payload_attestations<E: EthSpec>(
    state: &mut BeaconState<E>,
    block: BeaconBlockRef<'_, E>,
    verify_signatures: VerifySignatures,
    spec: &ChainSpec,
) -> Result<(), BlockProcessingError> {
    use errors::PayloadAttestationInvalid;

    let payload_attestations = block.body().payload_attestations()?.clone();
    let previous_slot = block.slot().saturating_sub(1u64);

    for (i, attestation) in payload_attestations.iter().enumerate() {
        let data = &attestation.data;
        let invalid = |reason: PayloadAttestationInvalid| {
            BlockProcessingError::PayloadAttestationInvalid { index: i, reason }
        };

        if data.slot != previous_slot {
            return Err(invalid(PayloadAttestationInvalid::SlotMismatch {
                state: previous_slot,
                attestation: data.slot,
            }));
        }
        if data.beacon_block_root != block.parent_root() {
            return Err(invalid(PayloadAttestationInvalid::BlockRootMismatch {
                expected: block.parent_root(),
                found: data.beacon_block_root,
            }));
        }
        if attestation.num_set_bits() == 0 {
            return Err(invalid(PayloadAttestationInvalid::EmptyAggregationBitfield));
        }

        let ptc = get_ptc(state, previous_slot)?;
        let attesting_indices: Vec<usize> = ptc
            .iter()
            .enumerate()
            .filter(|(bit, _)| {
                attestation
                    .aggregation_bits
                    .get(*bit)
                    .unwrap_or(false)
            })
            .map(|(_, index)| *index)
            .collect();

        if verify_signatures.is_true() {
            let domain = spec.get_domain(
                data.slot.epoch(E::slots_per_epoch()),
                types::Domain::PtcAttester,
                &state.fork(),
                state.genesis_validators_root(),
            );
            let message = data.signing_root(domain);
            let signature = bls::AggregateSignature::try_from(&attestation.signature)
                .map_err(|_| invalid(PayloadAttestationInvalid::BadSignature))?;
            let mut pubkeys = Vec::with_capacity(attesting_indices.len());
            for &index in &attesting_indices {
                pubkeys.push(get_pubkey_from_state(state, index).ok_or(
                    BlockProcessingError::BeaconStateError(BeaconStateError::UnknownValidator(
                        index,
                    )),
                )?);
            }
            block_verify!(
                bls::SignatureSet::multiple_pubkeys(Cow::Owned(signature), pubkeys, message)
                    .verify(),
                invalid(PayloadAttestationInvalid::BadSignature)
            );
        }

        // Attestations for a present payload accumulate weight towards the builder-payment
        // quorum of the attested slot.
        if data.payload_present {
            let mut weight = 0u64;
            for &index in &attesting_indices {
                weight.safe_add_assign(state.get_effective_balance(index)?)?;
            }

            let payment_index = data.slot.as_u64().safe_rem(E::slots_per_epoch())? as usize;
            if let BeaconState::Gloas(gloas_state) = state {
                gloas_state
                    .builder_pending_payments
                    .get_mut(payment_index)
                    .ok_or(BeaconStateError::SlotOutOfBounds)?
                    .weight
                    .safe_add_assign(weight)?;
            }
        }
    }

    Ok(())
}
