use crate::common::increase_balance;
use crate::per_block_processing::verify_deposit_signature;
use crate::per_epoch_processing::errors::EpochProcessingError;
use safe_arith::SafeArith;
use types::{
    BeaconState, ChainSpec, DepositData, EthSpec, ParticipationFlags, PendingDeposit, Validator,
};

/// Apply the queued deposits that have been finalized and fit in this epoch's churn
/// (EIP-6110/EIP-7251).
pub fn process_pending_deposits<E: EthSpec>(
    state: &mut BeaconState<E>,
    spec: &ChainSpec,
) -> Result<(), EpochProcessingError> {
    let next_epoch = state.next_epoch()?;
    let available_for_processing = state
        .deposit_balance_to_consume()?
        .safe_add(state.get_activation_exit_churn_limit(spec)?)?;
    let mut processed_amount = 0;
    let mut next_deposit_index = 0;
    let mut deposits_to_postpone = vec![];
    let mut is_churn_limit_reached = false;
    let finalized_slot = state
        .finalized_checkpoint()
        .epoch
        .start_slot(E::slots_per_epoch());

    state.update_pubkey_cache()?;

    let pending_deposits: Vec<PendingDeposit> =
        state.pending_deposits()?.iter().cloned().collect();

    for deposit in &pending_deposits {
        // Do not process deposit requests if the eth1 bridge deposits are not yet applied.
        if deposit.slot > spec.genesis_slot
            && state.eth1_deposit_index() < state.deposit_requests_start_index()?
        {
            break;
        }
        // Only process deposits that have been finalized.
        if deposit.slot > finalized_slot {
            break;
        }
        if next_deposit_index >= spec.max_pending_deposits_per_epoch {
            break;
        }

        let mut is_validator_exited = false;
        let mut is_validator_withdrawn = false;
        if let Some(index) = state.get_validator_index(&deposit.pubkey)? {
            let validator = state.get_validator(index)?;
            is_validator_exited = validator.exit_epoch < spec.far_future_epoch;
            is_validator_withdrawn = validator.withdrawable_epoch < next_epoch;
        }

        if is_validator_withdrawn {
            // The deposited balance will never become active: credit it without consuming
            // churn.
            apply_pending_deposit(state, deposit, spec)?;
        } else if is_validator_exited {
            // The validator is exiting: postpone the deposit until after the withdrawable
            // epoch.
            deposits_to_postpone.push(deposit.clone());
        } else {
            is_churn_limit_reached =
                processed_amount.safe_add(deposit.amount)? > available_for_processing;
            if is_churn_limit_reached {
                break;
            }
            processed_amount.safe_add_assign(deposit.amount)?;
            apply_pending_deposit(state, deposit, spec)?;
        }

        next_deposit_index.safe_add_assign(1)?;
    }

    let remaining: Vec<PendingDeposit> = pending_deposits
        .into_iter()
        .skip(next_deposit_index as usize)
        .chain(deposits_to_postpone)
        .collect();
    let remaining = types::VariableList::new(remaining)?;
    match state {
        BeaconState::Electra(s) => s.pending_deposits = remaining,
        BeaconState::Fulu(s) => s.pending_deposits = remaining,
        BeaconState::Gloas(s) => s.pending_deposits = remaining,
        _ => return Err(types::BeaconStateError::IncorrectStateVariant.into()),
    }

    // Accumulate churn only if the limit was hit.
    let deposit_balance_to_consume = if is_churn_limit_reached {
        available_for_processing.safe_sub(processed_amount)?
    } else {
        0
    };
    match state {
        BeaconState::Electra(s) => s.deposit_balance_to_consume = deposit_balance_to_consume,
        BeaconState::Fulu(s) => s.deposit_balance_to_consume = deposit_balance_to_consume,
        BeaconState::Gloas(s) => s.deposit_balance_to_consume = deposit_balance_to_consume,
        _ => return Err(types::BeaconStateError::IncorrectStateVariant.into()),
    }

    Ok(())
}

fn apply_pending_deposit<E: EthSpec>(
    state: &mut BeaconState<E>,
    deposit: &PendingDeposit,
    spec: &ChainSpec,
) -> Result<(), EpochProcessingError> {
    let deposit_data = DepositData {
        pubkey: deposit.pubkey,
        withdrawal_credentials: deposit.withdrawal_credentials,
        amount: deposit.amount,
        signature: deposit.signature,
    };

    if let Some(index) = state.get_validator_index(&deposit.pubkey)? {
        increase_balance(state, index, deposit.amount)?;
    } else if verify_deposit_signature(&deposit_data, spec).is_ok() {
        let validator = Validator::from_deposit(
            &deposit_data,
            deposit.amount,
            state.fork_name_unchecked(),
            spec,
        );
        state.validators_mut().push(validator)?;
        state.balances_mut().push(deposit.amount)?;
        state
            .previous_epoch_participation_mut()?
            .push(ParticipationFlags::default())?;
        state
            .current_epoch_participation_mut()?
            .push(ParticipationFlags::default())?;
        state.inactivity_scores_mut()?.push(0)?;
        state.update_pubkey_cache()?;
    }

    Ok(())
}
