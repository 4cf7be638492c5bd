use super::errors::EpochProcessingError;
use safe_arith::SafeArith;
use tree_hash::TreeHash;
use types::{BeaconState, EthSpec, Hash256, Unsigned};

/// Accumulate the block and state roots of a completed `SlotsPerHistoricalRoot` period
/// (pre-capella).
pub fn process_historical_roots_update<E: EthSpec>(
    state: &mut BeaconState<E>,
) -> Result<(), EpochProcessingError> {
    let next_epoch = state.next_epoch()?;
    if next_epoch
        .as_u64()
        .safe_rem(E::SlotsPerHistoricalRoot::to_u64().safe_div(E::slots_per_epoch())?)?
        == 0
    {
        // Build a merkle tree of `(block_roots, state_roots)` as per the `HistoricalBatch`
        // container.
        let block_roots_root = state.block_roots().tree_hash_root();
        let state_roots_root = state.state_roots().tree_hash_root();
        let historical_root =
            Hash256::from_slice(&ethereum_hashing::hash32_concat(
                block_roots_root.as_slice(),
                state_roots_root.as_slice(),
            ));
        state.historical_roots_mut().push(historical_root)?;
    }
    Ok(())
}
