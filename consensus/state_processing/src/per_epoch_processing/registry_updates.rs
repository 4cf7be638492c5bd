use super::errors::EpochProcessingError;
use crate::common::initiate_validator_exit;
use safe_arith::SafeArith;
use types::{BeaconState, ChainSpec, EthSpec, Validator};

/// Performs a validator registry update, if required.
pub fn process_registry_updates<E: EthSpec>(
    state: &mut BeaconState<E>,
    spec: &ChainSpec,
) -> Result<(), EpochProcessingError> {
    // Process activation eligibility and ejections.
    // Collect eligible and exiting validators (we need to avoid mutating the state while
    // iterating).
    let current_epoch = state.current_epoch();
    let current_fork = state.fork_name_unchecked();
    let is_ejectable = |validator: &Validator| {
        validator.is_active_at(current_epoch)
            && validator.effective_balance <= spec.ejection_balance
    };
    let indices_to_update: Vec<_> = state
        .validators()
        .iter()
        .enumerate()
        .filter(|(_, validator)| {
            validator.is_eligible_for_activation_queue(spec, current_fork)
                || is_ejectable(validator)
        })
        .map(|(idx, _)| idx)
        .collect();

    for index in indices_to_update {
        let validator = state.get_validator(index)?;
        if validator.is_eligible_for_activation_queue(spec, current_fork) {
            state.get_validator_mut(index)?.activation_eligibility_epoch =
                current_epoch.safe_add(1)?;
        }
        if is_ejectable(state.get_validator(index)?) {
            initiate_validator_exit(state, index, spec)?;
        }
    }

    let activation_epoch = state.compute_activation_exit_epoch(current_epoch, spec)?;
    let finalized_checkpoint = state.finalized_checkpoint();

    if current_fork.electra_enabled() {
        // [Modified in Electra:EIP7251] activate all eligible validators; the churn limit is
        // enforced on the deposit side instead.
        for index in 0..state.validators().len() {
            let validator = state.get_validator(index)?;
            if validator.is_eligible_for_activation(&finalized_checkpoint, spec) {
                state.get_validator_mut(index)?.activation_epoch = activation_epoch;
            }
        }
    } else {
        // Queue validators eligible for activation and not yet dequeued for activation.
        let mut activation_queue: Vec<usize> = state
            .validators()
            .iter()
            .enumerate()
            .filter(|(_, validator)| {
                validator.is_eligible_for_activation(&finalized_checkpoint, spec)
            })
            .map(|(index, _)| index)
            .collect();

        // Order by the sequence of activation_eligibility_epoch setting and then index.
        activation_queue.sort_by_key(|&index| {
            state
                .validators()
                .get(index)
                .map(|validator| (validator.activation_eligibility_epoch, index))
                .unwrap_or((spec.far_future_epoch, index))
        });

        // Dequeue validators for activation up to churn limit.
        let churn_limit = state.get_activation_churn_limit(spec)? as usize;
        for index in activation_queue.into_iter().take(churn_limit) {
            state.get_validator_mut(index)?.activation_epoch = activation_epoch;
        }
    }

    Ok(())
}
