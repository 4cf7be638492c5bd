use crate::per_epoch_processing::errors::EpochProcessingError;
use safe_arith::SafeArith;
use types::{BeaconState, BuilderPendingPayment, ChainSpec, EthSpec, FixedVector};

/// Settle the builder payments of the previous epoch that reached the payload-timeliness
/// quorum, queueing them as builder pending withdrawals (ePBS).
///
/// Payments are settled strictly before any withdrawal sweep runs for them: the withdrawable
/// epoch assigned here is in the future, so a settled payment is only ever paid out by a later
/// block's builder sweep.
pub fn process_builder_pending_payments<E: EthSpec>(
    state: &mut BeaconState<E>,
    spec: &ChainSpec,
) -> Result<(), EpochProcessingError> {
    let quorum = builder_payment_quorum_threshold(state, spec)?;
    let withdrawable_epoch = state
        .compute_activation_exit_epoch(state.current_epoch(), spec)?
        .safe_add(spec.min_validator_withdrawability_delay)?;

    let slots_per_epoch = E::slots_per_epoch() as usize;

    // The first `SLOTS_PER_EPOCH` entries cover the previous epoch and are retired here; the
    // remainder shift down to make room for the upcoming epoch.
    let mut settled = vec![];
    if let BeaconState::Gloas(gloas_state) = state {
        for payment in gloas_state
            .builder_pending_payments
            .iter()
            .take(slots_per_epoch)
        {
            if payment.weight > quorum && payment.withdrawal.amount > 0 {
                let mut withdrawal = payment.withdrawal.clone();
                withdrawal.withdrawable_epoch = withdrawable_epoch;
                settled.push(withdrawal);
            }
        }

        let mut rotated: Vec<BuilderPendingPayment> = gloas_state
            .builder_pending_payments
            .iter()
            .skip(slots_per_epoch)
            .cloned()
            .collect();
        rotated.resize(slots_per_epoch.safe_mul(2)?, BuilderPendingPayment::default());
        gloas_state.builder_pending_payments =
            FixedVector::new(rotated).map_err(EpochProcessingError::SszTypesError)?;

        for withdrawal in settled {
            gloas_state.builder_pending_withdrawals.push(withdrawal)?;
        }
    }

    Ok(())
}

/// The weight a builder payment must exceed before it is honoured: a configured fraction of one
/// slot's share of the total active balance.
pub fn builder_payment_quorum_threshold<E: EthSpec>(
    state: &BeaconState<E>,
    spec: &ChainSpec,
) -> Result<u64, EpochProcessingError> {
    let per_slot_balance = state
        .get_total_active_balance()?
        .safe_div(E::slots_per_epoch())?;
    per_slot_balance
        .safe_mul(spec.builder_payment_threshold_numerator)?
        .safe_div(spec.builder_payment_threshold_denominator)
        .map_err(Into::into)
}
