use crate::common::{decrease_balance, increase_balance};
use crate::per_epoch_processing::errors::EpochProcessingError;
use safe_arith::SafeArith;
use types::{BeaconState, EthSpec, PendingConsolidation};

/// Move the balances of withdrawable consolidation sources into their targets (EIP-7251).
pub fn process_pending_consolidations<E: EthSpec>(
    state: &mut BeaconState<E>,
) -> Result<(), EpochProcessingError> {
    let next_epoch = state.next_epoch()?;
    let mut next_pending_consolidation: usize = 0;

    let pending_consolidations: Vec<PendingConsolidation> =
        state.pending_consolidations()?.iter().cloned().collect();

    for pending_consolidation in &pending_consolidations {
        let source_index = pending_consolidation.source_index as usize;
        let target_index = pending_consolidation.target_index as usize;
        let source = state.get_validator(source_index)?;

        if source.slashed {
            next_pending_consolidation.safe_add_assign(1)?;
            continue;
        }
        if source.withdrawable_epoch > next_epoch {
            break;
        }

        // Move the active balance to the target; any excess stays withdrawable on the source.
        let source_effective_balance = std::cmp::min(
            state.get_balance(source_index)?,
            source.effective_balance,
        );
        decrease_balance(state, source_index, source_effective_balance)?;
        increase_balance(state, target_index, source_effective_balance)?;

        next_pending_consolidation.safe_add_assign(1)?;
    }

    let remaining: Vec<PendingConsolidation> = pending_consolidations
        .into_iter()
        .skip(next_pending_consolidation)
        .collect();
    let remaining = types::VariableList::new(remaining)?;
    match state {
        BeaconState::Electra(s) => s.pending_consolidations = remaining,
        BeaconState::Fulu(s) => s.pending_consolidations = remaining,
        BeaconState::Gloas(s) => s.pending_consolidations = remaining,
        _ => return Err(types::BeaconStateError::IncorrectStateVariant.into()),
    }

    Ok(())
}
