use crate::per_epoch_processing::{process_epoch, EpochProcessingSummary};
use crate::upgrade::{
    upgrade_to_altair, upgrade_to_bellatrix, upgrade_to_capella, upgrade_to_deneb,
    upgrade_to_electra, upgrade_to_fulu, upgrade_to_gloas,
};
use crate::per_epoch_processing::Error as EpochProcessingError;
use safe_arith::{ArithError, SafeArith};
use types::{
    BeaconState, BeaconStateError, ChainSpec, EthSpec, FixedBytesExtended, Hash256,
    InconsistentFork, Unsigned,
};

#[derive(Debug, PartialEq)]
pub enum Error {
    BeaconStateError(BeaconStateError),
    EpochProcessingError(EpochProcessingError),
    ArithError(ArithError),
    InconsistentStateFork(InconsistentFork),
}

impl From<ArithError> for Error {
    fn from(e: ArithError) -> Self {
        Self::ArithError(e)
    }
}

/// Advances a state forward by one slot, performing per-epoch processing if required.
///
/// If the root of the supplied `state` is known, then it can be passed as `state_root`. If
/// `state_root` is `None`, the root of `state` will be computed using a cached tree hash.
/// Providing the `state_root` makes this function several orders of magnitude faster.
pub fn per_slot_processing<E: EthSpec>(
    state: &mut BeaconState<E>,
    state_root: Option<Hash256>,
    spec: &ChainSpec,
) -> Result<Option<EpochProcessingSummary>, Error> {
    // Verify that the `BeaconState` instantiation matches the fork at `state.slot()`.
    state
        .fork_name(spec)
        .map_err(Error::InconsistentStateFork)?;

    cache_state(state, state_root)?;

    let summary = if state.slot() > spec.genesis_slot
        && state.slot().safe_add(1)?.safe_rem(E::slots_per_epoch())? == 0
    {
        Some(process_epoch(state, spec)?)
    } else {
        None
    };

    state.slot_mut().safe_add_assign(1)?;

    // Process fork upgrades here. Note that multiple upgrades can potentially run
    // in sequence if they are scheduled in the same Epoch (common in testnets)
    if state.slot().safe_rem(E::slots_per_epoch())? == 0 {
        // If the Altair fork epoch is reached, perform an irregular state upgrade.
        if spec.altair_fork_epoch == Some(state.current_epoch()) {
            upgrade_to_altair(state, spec)?;
        }
        // If the Bellatrix fork epoch is reached, perform an irregular state upgrade.
        if spec.bellatrix_fork_epoch == Some(state.current_epoch()) {
            upgrade_to_bellatrix(state, spec)?;
        }
        // Capella.
        if spec.capella_fork_epoch == Some(state.current_epoch()) {
            upgrade_to_capella(state, spec)?;
        }
        // Deneb.
        if spec.deneb_fork_epoch == Some(state.current_epoch()) {
            upgrade_to_deneb(state, spec)?;
        }
        // Electra.
        if spec.electra_fork_epoch == Some(state.current_epoch()) {
            upgrade_to_electra(state, spec)?;
        }
        // Fulu.
        if spec.fulu_fork_epoch == Some(state.current_epoch()) {
            upgrade_to_fulu(state, spec)?;
        }
        // Gloas.
        if spec.gloas_fork_epoch == Some(state.current_epoch()) {
            upgrade_to_gloas(state, spec)?;
        }

        // Additionally build all caches so that all valid states that are advanced always have
        // committee caches built, and we don't have to worry about initialising them at higher
        // layers.
        state.build_caches(spec)?;
    }

    Ok(summary)
}

fn cache_state<E: EthSpec>(
    state: &mut BeaconState<E>,
    state_root: Option<Hash256>,
) -> Result<(), Error> {
    let previous_state_root = if let Some(root) = state_root {
        root
    } else {
        state.update_tree_hash_cache()?
    };

    // Note: increment the state slot here to allow use of our `state_root` and `block_root`
    // getter/setter functions.
    //
    // This is a bit hacky, however it gets the job done safely without lots of code.
    let previous_slot = state.slot();
    state.slot_mut().safe_add_assign(1)?;

    // Store the previous slot's post state transition root.
    state.set_state_root(previous_slot, previous_state_root)?;

    // Cache latest block header state root
    if state.latest_block_header().state_root == Hash256::zero() {
        state.latest_block_header_mut().state_root = previous_state_root;
    }

    // Cache block root
    let latest_block_root = state.latest_block_header().canonical_root();
    state.set_block_root(previous_slot, latest_block_root)?;

    // Unset the availability bit of the upcoming slot: a payload for it has (by definition) not
    // been revealed yet (ePBS).
    //
    // At this point `state.slot()` has been temporarily incremented, so it already refers to
    // the upcoming slot.
    let next_slot_index = state
        .slot()
        .as_usize()
        .safe_rem(E::SlotsPerHistoricalRoot::to_usize())?;
    if let BeaconState::Gloas(gloas_state) = state {
        gloas_state
            .execution_payload_availability
            .set(next_slot_index, false)
            .map_err(|_| Error::BeaconStateError(BeaconStateError::SlotOutOfBounds))?;
    }

    // Set the state slot back to what it should be.
    state.slot_mut().safe_sub_assign(1)?;

    Ok(())
}

impl From<BeaconStateError> for Error {
    fn from(e: BeaconStateError) -> Error {
        Error::BeaconStateError(e)
    }
}

impl From<EpochProcessingError> for Error {
    fn from(e: EpochProcessingError) -> Error {
        Error::EpochProcessingError(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use types::test_utils::TestingStateBuilder;
    use types::{MinimalEthSpec, Slot};

    type E = MinimalEthSpec;

    #[test]
    fn advances_slot_and_caches_roots() {
        let spec = ChainSpec::all_forks_at_genesis();
        let mut state = TestingStateBuilder::build::<E>(Slot::new(1), 16, &spec);

        let state_root = Hash256::repeat_byte(0xdd);
        per_slot_processing(&mut state, Some(state_root), &spec).unwrap();

        assert_eq!(state.slot(), Slot::new(2));
        assert_eq!(*state.get_state_root(Slot::new(1)).unwrap(), state_root);
        // The latest block header had a zero state root, so it must have been filled in.
        assert_eq!(state.latest_block_header().state_root, state_root);
    }

    #[test]
    fn wrong_fork_variant_is_rejected() {
        // A state built as fulu under a schedule where the slot is base must be rejected.
        let fulu_spec = ChainSpec::all_forks_at_genesis();
        let base_spec = ChainSpec::minimal();
        let mut state = TestingStateBuilder::build::<E>(Slot::new(1), 16, &fulu_spec);

        assert!(matches!(
            per_slot_processing(&mut state, None, &base_spec),
            Err(Error::InconsistentStateFork(_))
        ));
    }
}
