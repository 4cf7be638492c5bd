use super::*;
use crate::common::{
    altair::{get_base_reward, BaseRewardPerIncrement},
    get_attestation_participation_flag_indices, increase_balance, initiate_validator_exit,
    slash_validator, update_progressive_balances_cache::update_progressive_balances_on_attestation,
};
use crate::per_block_processing::errors::{BlockProcessingError, IntoWithIndex};
use crate::VerifySignatures;
use safe_arith::SafeArith;
use types::consts::altair::{PARTICIPATION_FLAG_WEIGHTS, PROPOSER_WEIGHT, WEIGHT_DENOMINATOR};
use types::consts::altair::TIMELY_TARGET_FLAG_INDEX;
use types::{
    AttestationRef, BeaconBlockBodyRef, BeaconState, BeaconStateError, ChainSpec,
    ConsolidationRequest, Deposit, DepositRequest, EthSpec, ExecutionRequests, PendingAttestation,
    PendingConsolidation, PendingDeposit, PendingPartialWithdrawal, ProposerSlashing,
    PublicKeyBytes, SignedBlsToExecutionChange, SignedVoluntaryExit, Unsigned, Validator,
    WithdrawalRequest,
};

pub fn process_operations<E: EthSpec>(
    state: &mut BeaconState<E>,
    block_body: BeaconBlockBodyRef<'_, E>,
    verify_signatures: VerifySignatures,
    ctxt: &mut ConsensusContext<E>,
    spec: &ChainSpec,
) -> Result<(), BlockProcessingError> {
    process_proposer_slashings(
        state,
        &block_body.proposer_slashings()[..],
        verify_signatures,
        ctxt,
        spec,
    )?;
    process_attester_slashings(state, block_body, verify_signatures, ctxt, spec)?;
    process_attestations(state, block_body, verify_signatures, ctxt, spec)?;
    process_deposits(state, &block_body.deposits()[..], spec)?;
    process_exits(
        state,
        &block_body.voluntary_exits()[..],
        verify_signatures,
        spec,
    )?;

    if let Ok(bls_to_execution_changes) = block_body.bls_to_execution_changes() {
        process_bls_to_execution_changes(
            state,
            &bls_to_execution_changes[..],
            verify_signatures,
            spec,
        )?;
    }

    if let Ok(execution_requests) = block_body.execution_requests() {
        process_execution_requests(state, execution_requests, spec)?;
    }

    Ok(())
}

pub mod base {
    use super::*;
    use types::AttestationBase;

    /// Validates each `Attestation` and updates the state, short-circuiting on an invalid object.
    ///
    /// Returns `Ok(())` if the validation and state updates completed successfully, otherwise returns
    /// an `Err` describing the invalid object or cause of failure.
    pub fn process_attestations<E: EthSpec>(
        state: &mut BeaconState<E>,
        attestations: &[AttestationBase<E>],
        verify_signatures: VerifySignatures,
        ctxt: &mut ConsensusContext<E>,
        spec: &ChainSpec,
    ) -> Result<(), BlockProcessingError> {
        // Ensure required caches are all built. These should be no-ops during regular operation.
        state.build_committee_cache(types::RelativeEpoch::Current, spec)?;
        state.build_committee_cache(types::RelativeEpoch::Previous, spec)?;

        let proposer_index = ctxt.get_proposer_index(state, spec)?;

        // Verify and apply each attestation.
        for (i, attestation) in attestations.iter().enumerate() {
            verify_attestation_for_block_inclusion(
                state,
                AttestationRef::Base(attestation),
                ctxt,
                verify_signatures,
                spec,
            )
            .map_err(|e| e.into_with_index(i))?;

            let pending_attestation = PendingAttestation {
                aggregation_bits: attestation.aggregation_bits.clone(),
                data: attestation.data,
                inclusion_delay: state.slot().safe_sub(attestation.data.slot)?.as_u64(),
                proposer_index,
            };

            if attestation.data.target.epoch == state.current_epoch() {
                match state {
                    BeaconState::Base(base_state) => base_state
                        .current_epoch_attestations
                        .push(pending_attestation)?,
                    _ => return Err(BlockProcessingError::IncorrectStateType),
                }
            } else {
                match state {
                    BeaconState::Base(base_state) => base_state
                        .previous_epoch_attestations
                        .push(pending_attestation)?,
                    _ => return Err(BlockProcessingError::IncorrectStateType),
                }
            }
        }

        Ok(())
    }
}

pub mod altair_deneb {
    use super::*;

    pub fn process_attestations<'a, E: EthSpec, I>(
        state: &mut BeaconState<E>,
        attestations: I,
        verify_signatures: VerifySignatures,
        ctxt: &mut ConsensusContext<E>,
        spec: &ChainSpec,
    ) -> Result<(), BlockProcessingError>
    where
        I: Iterator<Item = AttestationRef<'a, E>>,
    {
        attestations.enumerate().try_for_each(|(i, attestation)| {
            process_attestation(state, attestation, i, ctxt, verify_signatures, spec)
        })
    }

    pub fn process_attestation<E: EthSpec>(
        state: &mut BeaconState<E>,
        attestation: AttestationRef<'_, E>,
        att_index: usize,
        ctxt: &mut ConsensusContext<E>,
        verify_signatures: VerifySignatures,
        spec: &ChainSpec,
    ) -> Result<(), BlockProcessingError> {
        state.build_committee_cache(types::RelativeEpoch::Previous, spec)?;
        state.build_committee_cache(types::RelativeEpoch::Current, spec)?;

        let proposer_index = ctxt.get_proposer_index(state, spec)?;

        let attesting_indices = verify_attestation_for_block_inclusion(
            state,
            attestation,
            ctxt,
            verify_signatures,
            spec,
        )
        .map_err(|e| e.into_with_index(att_index))?
        .attesting_indices_to_vec();

        // Matching roots, participation flag indices
        let data = attestation.data();
        let inclusion_delay = state.slot().safe_sub(data.slot)?.as_u64();
        let participation_flag_indices =
            get_attestation_participation_flag_indices(state, data, inclusion_delay, spec)?;

        // Update epoch participation flags.
        let total_active_balance = state.get_total_active_balance()?;
        let base_reward_per_increment = BaseRewardPerIncrement::new(total_active_balance, spec)?;
        let mut proposer_reward_numerator = 0u64;
        for index in attesting_indices {
            let index = index as usize;

            let validator_effective_balance = state.get_effective_balance(index)?;
            let validator_slashed = state.get_validator(index)?.slashed;

            for (flag_index, &weight) in PARTICIPATION_FLAG_WEIGHTS.iter().enumerate() {
                let epoch_participation = state
                    .get_epoch_participation_mut(data.target.epoch)?
                    .get_mut(index)
                    .ok_or(BeaconStateError::ParticipationOutOfBounds(index))?;

                if participation_flag_indices.contains(&flag_index)
                    && !epoch_participation.has_flag(flag_index)?
                {
                    epoch_participation.add_flag(flag_index)?;
                    proposer_reward_numerator.safe_add_assign(
                        get_base_reward(state, index, base_reward_per_increment, spec)?
                            .safe_mul(weight)?,
                    )?;

                    if flag_index == TIMELY_TARGET_FLAG_INDEX {
                        update_progressive_balances_on_attestation(
                            state,
                            data.target.epoch,
                            flag_index,
                            validator_effective_balance,
                            validator_slashed,
                        )?;
                    }
                }
            }
        }

        let proposer_reward_denominator = WEIGHT_DENOMINATOR
            .safe_sub(PROPOSER_WEIGHT)?
            .safe_mul(WEIGHT_DENOMINATOR)?
            .safe_div(PROPOSER_WEIGHT)?;
        let proposer_reward = proposer_reward_numerator.safe_div(proposer_reward_denominator)?;
        increase_balance(state, proposer_index as usize, proposer_reward)?;
        Ok(())
    }
}

/// Validates each `ProposerSlashing` and updates the state, short-circuiting on an invalid object.
///
/// Returns `Ok(())` if the validation and state updates completed successfully, otherwise returns
/// an `Err` describing the invalid object or cause of failure.
pub fn process_proposer_slashings<E: EthSpec>(
    state: &mut BeaconState<E>,
    proposer_slashings: &[ProposerSlashing],
    verify_signatures: VerifySignatures,
    ctxt: &mut ConsensusContext<E>,
    spec: &ChainSpec,
) -> Result<(), BlockProcessingError> {
    // Verify and apply proposer slashings in series.
    // We have to verify in series because an invalid block may contain multiple slashings
    // for the same validator, and we need to correctly detect and reject that.
    proposer_slashings
        .iter()
        .enumerate()
        .try_for_each(|(i, proposer_slashing)| {
            verify_proposer_slashing(proposer_slashing, state, verify_signatures, spec)
                .map_err(|e| e.into_with_index(i))?;

            slash_validator(
                state,
                proposer_slashing.signed_header_1.message.proposer_index as usize,
                None,
                ctxt,
                spec,
            )?;

            Ok(())
        })
}

/// Validates each `AttesterSlashing` and updates the state, short-circuiting on an invalid object.
///
/// Returns `Ok(())` if the validation and state updates completed successfully, otherwise returns
/// an `Err` describing the invalid object or cause of failure.
pub fn process_attester_slashings<E: EthSpec>(
    state: &mut BeaconState<E>,
    block_body: BeaconBlockBodyRef<'_, E>,
    verify_signatures: VerifySignatures,
    ctxt: &mut ConsensusContext<E>,
    spec: &ChainSpec,
) -> Result<(), BlockProcessingError> {
    for (i, attester_slashing) in block_body.attester_slashings().enumerate() {
        let slashable_indices =
            verify_attester_slashing(state, attester_slashing, verify_signatures, spec)
                .map_err(|e| e.into_with_index(i))?;

        for i in slashable_indices {
            slash_validator(state, i as usize, None, ctxt, spec)?;
        }
    }

    Ok(())
}

/// Wrapper function to handle calling the correct version of `process_attestations` based on
/// the fork.
pub fn process_attestations<E: EthSpec>(
    state: &mut BeaconState<E>,
    block_body: BeaconBlockBodyRef<'_, E>,
    verify_signatures: VerifySignatures,
    ctxt: &mut ConsensusContext<E>,
    spec: &ChainSpec,
) -> Result<(), BlockProcessingError> {
    match block_body {
        BeaconBlockBodyRef::Base(body) => {
            base::process_attestations(
                state,
                &body.attestations[..],
                verify_signatures,
                ctxt,
                spec,
            )?;
        }
        _ => {
            altair_deneb::process_attestations(
                state,
                block_body.attestations(),
                verify_signatures,
                ctxt,
                spec,
            )?;
        }
    }
    Ok(())
}

/// Validates each `Exit` and updates the state, short-circuiting on an invalid object.
///
/// Returns `Ok(())` if the validation and state updates completed successfully, otherwise returns
/// an `Err` describing the invalid object or cause of failure.
pub fn process_exits<E: EthSpec>(
    state: &mut BeaconState<E>,
    voluntary_exits: &[SignedVoluntaryExit],
    verify_signatures: VerifySignatures,
    spec: &ChainSpec,
) -> Result<(), BlockProcessingError> {
    // Verify and apply each exit in series. We iterate in series because higher-index exits may
    // become invalid due to the application of lower-index ones.
    for (i, exit) in voluntary_exits.iter().enumerate() {
        verify_exit(state, None, exit, verify_signatures, spec)
            .map_err(|e| e.into_with_index(i))?;

        initiate_validator_exit(state, exit.message.validator_index as usize, spec)?;
    }
    Ok(())
}

/// Validates each `bls_to_execution_change` and updates the state
///
/// Returns `Ok(())` if the validation and state updates completed successfully. Otherwise returns
/// an `Err` describing the invalid object or cause of failure.
pub fn process_bls_to_execution_changes<E: EthSpec>(
    state: &mut BeaconState<E>,
    bls_to_execution_changes: &[SignedBlsToExecutionChange],
    verify_signatures: VerifySignatures,
    spec: &ChainSpec,
) -> Result<(), BlockProcessingError> {
    for (i, signed_address_change) in bls_to_execution_changes.iter().enumerate() {
        verify_bls_to_execution_change(state, signed_address_change, verify_signatures, spec)
            .map_err(|e| e.into_with_index(i))?;

        state
            .get_validator_mut(signed_address_change.message.validator_index as usize)?
            .change_withdrawal_credentials(
                &signed_address_change.message.to_execution_address,
                spec,
            );
    }

    Ok(())
}

/// Validates each `Deposit` and updates the state, short-circuiting on an invalid object.
///
/// Returns `Ok(())` if the validation and state updates completed successfully, otherwise returns
/// an `Err` describing the invalid object or cause of failure.
pub fn process_deposits<E: EthSpec>(
    state: &mut BeaconState<E>,
    deposits: &[Deposit],
    spec: &ChainSpec,
) -> Result<(), BlockProcessingError> {
    // [Modified in Electra:EIP6110]
    // Disable former deposit mechanism once all prior deposits are processed
    let eth1_deposit_index_limit = if state.fork_name_unchecked().electra_enabled() {
        std::cmp::min(
            state.eth1_data().deposit_count,
            state.deposit_requests_start_index()?,
        )
    } else {
        state.eth1_data().deposit_count
    };

    let expected_deposit_len = std::cmp::min(
        E::MaxDeposits::to_u64(),
        eth1_deposit_index_limit.saturating_sub(state.eth1_deposit_index()),
    );
    block_verify!(
        deposits.len() as u64 == expected_deposit_len,
        BlockProcessingError::DepositCountInvalid {
            expected: expected_deposit_len as usize,
            found: deposits.len(),
        }
    );

    // Verify merkle proofs in parallel.
    deposits
        .iter()
        .enumerate()
        .try_for_each(|(i, deposit)| {
            verify_deposit_merkle_proof(
                state,
                deposit,
                state.eth1_deposit_index().safe_add(i as u64)?,
                spec,
            )
            .map_err(|e| e.into_with_index(i))
        })?;

    // Update the state in series.
    for deposit in deposits {
        apply_deposit(state, &deposit.data, spec)?;
        state.eth1_deposit_index_mut().safe_add_assign(1)?;
    }

    Ok(())
}

/// Process a single deposit, assuming its merkle proof has already been verified.
pub fn apply_deposit<E: EthSpec>(
    state: &mut BeaconState<E>,
    deposit_data: &types::DepositData,
    spec: &ChainSpec,
) -> Result<(), BlockProcessingError> {
    state.update_pubkey_cache()?;

    let amount = deposit_data.amount;
    let validator_index = state.get_validator_index(&deposit_data.pubkey)?;

    if state.fork_name_unchecked().electra_enabled() {
        // [Modified in Electra:EIP7251] all deposits are queued.
        if validator_index.is_none() {
            // The signature should be checked for new validators. Return early for a bad
            // signature.
            if verify_deposit_signature(deposit_data, spec).is_err() {
                return Ok(());
            }

            add_validator_to_registry(state, deposit_data.pubkey, deposit_data.withdrawal_credentials, 0, spec)?;
        }

        let electra_state = match state {
            BeaconState::Electra(s) => &mut s.pending_deposits,
            BeaconState::Fulu(s) => &mut s.pending_deposits,
            BeaconState::Gloas(s) => &mut s.pending_deposits,
            _ => return Err(BlockProcessingError::IncorrectStateType),
        };
        electra_state.push(PendingDeposit {
            pubkey: deposit_data.pubkey,
            withdrawal_credentials: deposit_data.withdrawal_credentials,
            amount,
            signature: deposit_data.signature,
            slot: spec.genesis_slot, // Use `GENESIS_SLOT` to distinguish from a pending deposit request
        })?;

        return Ok(());
    }

    if let Some(index) = validator_index {
        // Update the existing validator balance.
        increase_balance(state, index, amount)?;
    } else {
        // The signature should be checked for new validators. Return early for a bad
        // signature.
        if verify_deposit_signature(deposit_data, spec).is_err() {
            return Ok(());
        }

        add_validator_to_registry(
            state,
            deposit_data.pubkey,
            deposit_data.withdrawal_credentials,
            amount,
            spec,
        )?;
    }

    Ok(())
}

pub fn add_validator_to_registry<E: EthSpec>(
    state: &mut BeaconState<E>,
    pubkey: PublicKeyBytes,
    withdrawal_credentials: types::Hash256,
    amount: u64,
    spec: &ChainSpec,
) -> Result<(), BlockProcessingError> {
    let fork_name = state.fork_name_unchecked();
    let deposit_data_stub = types::DepositData {
        pubkey,
        withdrawal_credentials,
        amount,
        signature: bls::SignatureBytes::empty(),
    };
    let validator = Validator::from_deposit(&deposit_data_stub, amount, fork_name, spec);
    state.validators_mut().push(validator)?;
    state.balances_mut().push(amount)?;

    // Altair or later initializations.
    if let Ok(previous_epoch_participation) = state.previous_epoch_participation_mut() {
        previous_epoch_participation.push(types::ParticipationFlags::default())?;
    }
    if let Ok(current_epoch_participation) = state.current_epoch_participation_mut() {
        current_epoch_participation.push(types::ParticipationFlags::default())?;
    }
    if let Ok(inactivity_scores) = state.inactivity_scores_mut() {
        inactivity_scores.push(0)?;
    }

    state.update_pubkey_cache()?;

    Ok(())
}

/// Process the execution-layer triggered requests bundled with an electra block.
pub fn process_execution_requests<E: EthSpec>(
    state: &mut BeaconState<E>,
    requests: &ExecutionRequests<E>,
    spec: &ChainSpec,
) -> Result<(), BlockProcessingError> {
    for request in requests.deposits.iter() {
        process_deposit_request(state, request, spec)?;
    }
    for request in requests.withdrawals.iter() {
        process_withdrawal_request(state, request, spec)?;
    }
    for request in requests.consolidations.iter() {
        process_consolidation_request(state, request, spec)?;
    }
    Ok(())
}

/// `process_deposit_request` from the electra spec (EIP-6110).
pub fn process_deposit_request<E: EthSpec>(
    state: &mut BeaconState<E>,
    request: &DepositRequest,
    spec: &ChainSpec,
) -> Result<(), BlockProcessingError> {
    // Set deposit request start index
    if state.deposit_requests_start_index()? == spec.unset_deposit_requests_start_index {
        match state {
            BeaconState::Electra(s) => s.deposit_requests_start_index = request.index,
            BeaconState::Fulu(s) => s.deposit_requests_start_index = request.index,
            BeaconState::Gloas(s) => s.deposit_requests_start_index = request.index,
            _ => return Err(BlockProcessingError::IncorrectStateType),
        }
    }

    let slot = state.slot();
    let pending_deposits = match state {
        BeaconState::Electra(s) => &mut s.pending_deposits,
        BeaconState::Fulu(s) => &mut s.pending_deposits,
        BeaconState::Gloas(s) => &mut s.pending_deposits,
        _ => return Err(BlockProcessingError::IncorrectStateType),
    };
    pending_deposits.push(PendingDeposit {
        pubkey: request.pubkey,
        withdrawal_credentials: request.withdrawal_credentials,
        amount: request.amount,
        signature: request.signature,
        slot,
    })?;

    Ok(())
}

/// `process_withdrawal_request` from the electra spec (EIP-7002).
pub fn process_withdrawal_request<E: EthSpec>(
    state: &mut BeaconState<E>,
    request: &WithdrawalRequest,
    spec: &ChainSpec,
) -> Result<(), BlockProcessingError> {
    let amount = request.amount;
    let is_full_exit_request = amount == spec.full_exit_request_amount;

    // If partial withdrawal queue is full, only full exits are processed
    if state.pending_partial_withdrawals()?.len() == E::PendingPartialWithdrawalsLimit::to_usize()
        && !is_full_exit_request
    {
        return Ok(());
    }

    // Verify pubkey exists
    state.update_pubkey_cache()?;
    let Some(index) = state.get_validator_index(&request.validator_pubkey)? else {
        return Ok(());
    };

    let validator = state.get_validator(index)?;
    // Verify withdrawal credentials
    let has_correct_credential = validator.has_execution_withdrawal_credential(spec);
    let is_correct_source_address = validator
        .get_execution_withdrawal_address(spec)
        .map(|addr| addr == request.source_address)
        .unwrap_or(false);
    if !(has_correct_credential && is_correct_source_address) {
        return Ok(());
    }
    // Verify the validator is active
    if !validator.is_active_at(state.current_epoch()) {
        return Ok(());
    }
    // Verify exit has not been initiated
    if validator.exit_epoch != spec.far_future_epoch {
        return Ok(());
    }
    // Verify the validator has been active long enough
    if state.current_epoch()
        < validator
            .activation_epoch
            .safe_add(spec.shard_committee_period)?
    {
        return Ok(());
    }

    let pending_balance_to_withdraw = state
        .pending_partial_withdrawals()?
        .iter()
        .filter(|w| w.validator_index as usize == index)
        .try_fold(0u64, |acc, w| acc.safe_add(w.amount))?;

    if is_full_exit_request {
        // Only exit validator if it has no pending withdrawals in the queue
        if pending_balance_to_withdraw == 0 {
            initiate_validator_exit(state, index, spec)?;
        }
        return Ok(());
    }

    let balance = state.get_balance(index)?;
    let has_sufficient_effective_balance =
        state.get_validator(index)?.effective_balance >= spec.min_activation_balance;
    let has_excess_balance = balance
        > spec
            .min_activation_balance
            .safe_add(pending_balance_to_withdraw)?;

    // Only allow partial withdrawals with compounding withdrawal credentials
    if state
        .get_validator(index)?
        .has_compounding_withdrawal_credential(spec)
        && has_sufficient_effective_balance
        && has_excess_balance
    {
        let to_withdraw = std::cmp::min(
            balance
                .safe_sub(spec.min_activation_balance)?
                .safe_sub(pending_balance_to_withdraw)?,
            amount,
        );
        let exit_queue_epoch = state.compute_exit_epoch_and_update_churn(to_withdraw, spec)?;
        let withdrawable_epoch =
            exit_queue_epoch.safe_add(spec.min_validator_withdrawability_delay)?;

        let validator_index = index as u64;
        let pending_partial_withdrawals = match state {
            BeaconState::Electra(s) => &mut s.pending_partial_withdrawals,
            BeaconState::Fulu(s) => &mut s.pending_partial_withdrawals,
            BeaconState::Gloas(s) => &mut s.pending_partial_withdrawals,
            _ => return Err(BlockProcessingError::IncorrectStateType),
        };
        pending_partial_withdrawals.push(PendingPartialWithdrawal {
            validator_index,
            amount: to_withdraw,
            withdrawable_epoch,
        })?;
    }

    Ok(())
}

/// `process_consolidation_request` from the electra spec (EIP-7251).
pub fn process_consolidation_request<E: EthSpec>(
    state: &mut BeaconState<E>,
    request: &ConsolidationRequest,
    spec: &ChainSpec,
) -> Result<(), BlockProcessingError> {
    if is_valid_switch_to_compounding_request(state, request, spec)? {
        state.update_pubkey_cache()?;
        if let Some(source_index) = state.get_validator_index(&request.source_pubkey)? {
            switch_to_compounding_validator(state, source_index, spec)?;
        }
        return Ok(());
    }

    // Verify that source != target, so a consolidation cannot be used as an exit
    if request.source_pubkey == request.target_pubkey {
        return Ok(());
    }

    // If the pending consolidations queue is full, consolidation requests are ignored
    if state.pending_consolidations()?.len() == E::PendingConsolidationsLimit::to_usize() {
        return Ok(());
    }
    // If there is too little available consolidation churn limit, consolidation requests are
    // ignored
    if state.get_consolidation_churn_limit(spec)? <= spec.min_activation_balance {
        return Ok(());
    }

    state.update_pubkey_cache()?;
    let Some(source_index) = state.get_validator_index(&request.source_pubkey)? else {
        return Ok(());
    };
    let Some(target_index) = state.get_validator_index(&request.target_pubkey)? else {
        return Ok(());
    };

    let source_validator = state.get_validator(source_index)?;
    // Verify the source withdrawal credentials
    let is_correct_source_address = source_validator
        .get_execution_withdrawal_address(spec)
        .map(|addr| addr == request.source_address)
        .unwrap_or(false);
    if !(source_validator.has_execution_withdrawal_credential(spec) && is_correct_source_address) {
        return Ok(());
    }

    // Verify the target has compounding withdrawal credentials
    if !state
        .get_validator(target_index)?
        .has_compounding_withdrawal_credential(spec)
    {
        return Ok(());
    }

    let current_epoch = state.current_epoch();
    // Verify the source and the target are active
    if !state.get_validator(source_index)?.is_active_at(current_epoch)
        || !state.get_validator(target_index)?.is_active_at(current_epoch)
    {
        return Ok(());
    }
    // Verify exits for source and target have not been initiated
    if state.get_validator(source_index)?.exit_epoch != spec.far_future_epoch
        || state.get_validator(target_index)?.exit_epoch != spec.far_future_epoch
    {
        return Ok(());
    }
    // Verify the source has no pending withdrawals in the queue
    let source_pending = state
        .pending_partial_withdrawals()?
        .iter()
        .filter(|w| w.validator_index as usize == source_index)
        .try_fold(0u64, |acc, w| acc.safe_add(w.amount))?;
    if source_pending > 0 {
        return Ok(());
    }

    // Initiate source validator exit and append pending consolidation
    let source_effective_balance = state.get_validator(source_index)?.effective_balance;
    let exit_epoch =
        state.compute_consolidation_epoch_and_update_churn(source_effective_balance, spec)?;
    let withdrawable_epoch = exit_epoch.safe_add(spec.min_validator_withdrawability_delay)?;
    {
        let source_validator = state.get_validator_mut(source_index)?;
        source_validator.exit_epoch = exit_epoch;
        source_validator.withdrawable_epoch = withdrawable_epoch;
    }
    state
        .exit_cache_mut()
        .record_validator_exit(exit_epoch)?;

    let pending_consolidations = match state {
        BeaconState::Electra(s) => &mut s.pending_consolidations,
        BeaconState::Fulu(s) => &mut s.pending_consolidations,
        BeaconState::Gloas(s) => &mut s.pending_consolidations,
        _ => return Err(BlockProcessingError::IncorrectStateType),
    };
    pending_consolidations.push(PendingConsolidation {
        source_index: source_index as u64,
        target_index: target_index as u64,
    })?;

    Ok(())
}

/// Is the consolidation request a request for the source validator to begin compounding on its
/// own, rather than consolidating into another validator?
fn is_valid_switch_to_compounding_request<E: EthSpec>(
    state: &mut BeaconState<E>,
    request: &ConsolidationRequest,
    spec: &ChainSpec,
) -> Result<bool, BlockProcessingError> {
    // Switch to compounding requires source and target be equal
    if request.source_pubkey != request.target_pubkey {
        return Ok(false);
    }

    state.update_pubkey_cache()?;
    let Some(source_index) = state.get_validator_index(&request.source_pubkey)? else {
        // Verify pubkey exists
        return Ok(false);
    };

    let source_validator = state.get_validator(source_index)?;
    // Verify request has been authorized
    let is_correct_source_address = source_validator
        .get_execution_withdrawal_address(spec)
        .map(|addr| addr == request.source_address)
        .unwrap_or(false);
    if !is_correct_source_address {
        return Ok(false);
    }

    // Verify source withdrawal credentials
    if !source_validator.has_eth1_withdrawal_credential(spec) {
        return Ok(false);
    }

    // Verify the source is active
    if !source_validator.is_active_at(state.current_epoch()) {
        return Ok(false);
    }
    // Verify exit for source has not been initiated
    if source_validator.exit_epoch != spec.far_future_epoch {
        return Ok(false);
    }

    Ok(true)
}

/// Change a validator's withdrawal credentials prefix to the compounding prefix, queueing any
/// excess balance as a pending deposit.
pub fn switch_to_compounding_validator<E: EthSpec>(
    state: &mut BeaconState<E>,
    index: usize,
    spec: &ChainSpec,
) -> Result<(), BlockProcessingError> {
    let mut credentials = state.get_validator(index)?.withdrawal_credentials;
    let credentials_bytes = credentials.as_mut_slice();
    if let Some(first) = credentials_bytes.first_mut() {
        *first = spec.compounding_withdrawal_prefix_byte;
    }
    state.get_validator_mut(index)?.withdrawal_credentials = credentials;

    queue_excess_active_balance(state, index, spec)?;

    Ok(())
}

/// Queue a validator's balance above `MIN_ACTIVATION_BALANCE` as a pending deposit.
pub fn queue_excess_active_balance<E: EthSpec>(
    state: &mut BeaconState<E>,
    index: usize,
    spec: &ChainSpec,
) -> Result<(), BlockProcessingError> {
    let balance = state.get_balance(index)?;
    if balance > spec.min_activation_balance {
        let excess_balance = balance.safe_sub(spec.min_activation_balance)?;
        *state.get_balance_mut(index)? = spec.min_activation_balance;

        let validator = state.get_validator(index)?;
        let pending_deposit = PendingDeposit {
            pubkey: validator.pubkey,
            withdrawal_credentials: validator.withdrawal_credentials,
            amount: excess_balance,
            // Use bls.G2_POINT_AT_INFINITY as a signature field placeholder and
            // GENESIS_SLOT to distinguish from a pending deposit request
            signature: bls::SignatureBytes::empty(),
            slot: spec.genesis_slot,
        };

        let pending_deposits = match state {
            BeaconState::Electra(s) => &mut s.pending_deposits,
            BeaconState::Fulu(s) => &mut s.pending_deposits,
            BeaconState::Gloas(s) => &mut s.pending_deposits,
            _ => return Err(BlockProcessingError::IncorrectStateType),
        };
        pending_deposits.push(pending_deposit)?;
    }
    Ok(())
}
