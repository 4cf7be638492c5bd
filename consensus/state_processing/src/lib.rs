//! Provides the deterministic state-transition function: advancing a `BeaconState` through
//! slots, epochs and blocks according to the consensus rules.

#![deny(clippy::wildcard_imports)]
#![deny(clippy::integer_division)]

#[macro_use]
mod macros;
mod metrics;

pub mod common;
pub mod consensus_context;
pub mod epoch_cache;
pub mod per_block_processing;
pub mod per_epoch_processing;
pub mod per_slot_processing;
pub mod state_advance;
pub mod upgrade;

pub use consensus_context::ConsensusContext;
pub use epoch_cache::initialize_epoch_cache;
pub use per_block_processing::{
    errors::BlockProcessingError, process_block_header, process_operations, signature_sets,
    ExternalBlockData, VerifyBlockRoot, VerifySignatures,
};
pub use per_epoch_processing::process_epoch as per_epoch_processing;
pub use per_slot_processing::{per_slot_processing, Error as SlotProcessingError};
pub use state_advance::{complete_state_advance, partial_state_advance};
pub use types;

use types::{BeaconState, ChainSpec, EthSpec, Hash256, SignedBeaconBlock};

/// The strategy to be used when validating the block's signatures.
#[derive(PartialEq, Clone, Copy, Debug)]
pub enum BlockSignatureStrategy {
    /// Do not validate any signature. Use with caution.
    NoVerification,
    /// Validate each signature individually, as its object is being processed.
    VerifyIndividual,
    /// Validate only the randao reveal signature.
    VerifyRandao,
    /// Collect all signatures and verify them in a batch at the end of block processing.
    VerifyBulk,
}

/// The full state-transition function: advance `state` to the block's slot, apply the block,
/// and verify the resulting state root.
///
/// Fails before any externally visible mutation: on error the caller should discard `state`.
pub fn state_transition<E: EthSpec>(
    state: &mut BeaconState<E>,
    block: &SignedBeaconBlock<E>,
    signature_strategy: BlockSignatureStrategy,
    external_data: ExternalBlockData,
    spec: &ChainSpec,
) -> Result<Hash256, BlockProcessingError> {
    let block_slot = block.slot();
    while state.slot() < block_slot {
        per_slot_processing(state, None, spec).map_err(BlockProcessingError::SlotProcessingError)?;
    }

    let mut ctxt = ConsensusContext::new(block_slot);

    per_block_processing::per_block_processing(
        state,
        block,
        signature_strategy,
        VerifyBlockRoot::True,
        external_data,
        &mut ctxt,
        spec,
    )?;

    let state_root = state
        .update_tree_hash_cache()
        .map_err(BlockProcessingError::BeaconStateError)?;

    if state_root != block.state_root() {
        return Err(BlockProcessingError::StateRootMismatch {
            block: block.state_root(),
            local: state_root,
        });
    }

    Ok(state_root)
}
