//! Stages of the block import pipeline, from an untrusted network block to a fully verified
//! block ready for fork choice:
//!
//! ```text
//! Received -> SanityChecked -> ConsensusVerified -> (ExecutionEngineNotified)
//!     -> DataAvailabilityChecked -> ForkChoiceApplied -> Persisted -> Notified
//! ```
//!
//! The sanity and consensus stages are represented as wrapper types so that later stages can
//! only be reached through the earlier ones.

use crate::data_availability_checker::AvailabilityCheckError;
use crate::errors::BeaconChainError;
use execution_layer::{
    EngineApiError, ExecutionEngine, NewPayloadRequest, PayloadStatusV1, PayloadStatusV1Status,
};
use fork_choice::{PayloadVerificationStatus, ProtoBlock};
use proto_array::InvalidationOperation;
use state_processing::ConsensusContext;
use std::sync::Arc;
use types::{
    BeaconState, ChainSpec, Epoch, EthSpec, ExecutionBlockHash, Hash256, SignedBeaconBlock, Slot,
    VERSIONED_HASH_VERSION_KZG,
};

/// An error on the payload-verification path. `Invalid`-class errors are fatal for the block
/// and drive latest-valid-hash recovery; transport-class errors leave the block retriable.
#[derive(Debug)]
pub enum ExecutionPayloadError {
    /// The engine returned `INVALID`; the block and its descendants must be invalidated.
    RejectedByExecutionEngine { status: PayloadStatusV1 },
    /// The engine returned `INVALID_BLOCK_HASH`: fatal for this block, no optimistic fallback.
    InvalidBlockHash { status: PayloadStatusV1 },
    /// The engine could not be reached or failed internally; the block may be retried.
    EngineError(EngineApiError),
}

/// An error on the block import path.
#[derive(Debug)]
pub enum BlockError {
    /// The parent block was unknown.
    ParentUnknown { parent_root: Hash256 },
    /// The block slot is greater than the present slot.
    FutureSlot {
        present_slot: Slot,
        block_slot: Slot,
    },
    /// The block conflicts with finalization.
    WouldRevertFinalizedSlot {
        block_slot: Slot,
        finalized_slot: Slot,
    },
    /// The block is already fully imported.
    BlockIsAlreadyKnown(Hash256),
    /// The genesis block may never be re-imported.
    GenesisBlock,
    /// The proposal signature was invalid.
    ProposalSignatureInvalid,
    /// The state transition rejected the block. Never retried.
    PerBlockProcessingError(state_processing::BlockProcessingError),
    /// The payload failed execution-engine verification.
    ExecutionPayloadError(ExecutionPayloadError),
    /// The block's sidecar data failed verification or never became available.
    AvailabilityCheck(AvailabilityCheckError),
    /// An internal error during processing; validity was not determined.
    BeaconChainError(Box<BeaconChainError>),
}

impl From<ExecutionPayloadError> for BlockError {
    fn from(e: ExecutionPayloadError) -> Self {
        BlockError::ExecutionPayloadError(e)
    }
}

impl From<state_processing::BlockProcessingError> for BlockError {
    fn from(e: state_processing::BlockProcessingError) -> Self {
        BlockError::PerBlockProcessingError(e)
    }
}

impl From<AvailabilityCheckError> for BlockError {
    fn from(e: AvailabilityCheckError) -> Self {
        BlockError::AvailabilityCheck(e)
    }
}

impl From<BeaconChainError> for BlockError {
    fn from(e: BeaconChainError) -> Self {
        BlockError::BeaconChainError(Box::new(e))
    }
}

/// A block that has passed cheap structural checks: slot bounds, uniqueness and parent
/// presence in fork choice.
pub struct SanityCheckedBlock<E: EthSpec> {
    pub block: Arc<SignedBeaconBlock<E>>,
    pub block_root: Hash256,
    pub parent_block: ProtoBlock,
}

/// A block whose state transition (with batched signature verification) has been applied,
/// yielding the post-state.
pub struct ConsensusVerifiedBlock<E: EthSpec> {
    pub block: Arc<SignedBeaconBlock<E>>,
    pub block_root: Hash256,
    pub parent_block: ProtoBlock,
    /// The state after applying `block`.
    pub post_state: BeaconState<E>,
    pub consensus_context: ConsensusContext<E>,
}

/// Assemble the `newPayload` request for a block, including versioned hashes (deneb+), parent
/// beacon block root (deneb+) and execution requests (electra+).
pub fn new_payload_request<E: EthSpec>(
    block: &SignedBeaconBlock<E>,
) -> Result<NewPayloadRequest<E>, BlockError> {
    let message = block.message();
    let body = message.body();
    let execution_payload = body
        .execution_payload()
        .map_err(|e| BlockError::BeaconChainError(Box::new(BeaconChainError::from(e))))?
        .clone_from_ref();

    let fork_name = block.fork_name_unchecked();

    let versioned_hashes = fork_name.deneb_enabled().then(|| {
        body.blob_kzg_commitments()
            .map(|commitments| {
                commitments
                    .iter()
                    .map(|commitment| commitment.calculate_versioned_hash())
                    .collect()
            })
            .unwrap_or_default()
    });

    let parent_beacon_block_root = fork_name.deneb_enabled().then(|| message.parent_root());

    let execution_requests = body.execution_requests().ok().cloned();

    Ok(NewPayloadRequest {
        fork_name,
        execution_payload,
        versioned_hashes,
        parent_beacon_block_root,
        execution_requests,
    })
}

/// Notify the execution engine of a block's payload and interpret the verdict:
///
/// | engine status            | consequence                                       |
/// |--------------------------|---------------------------------------------------|
/// | `VALID`                  | `Verified`, latest valid hash recorded            |
/// | `INVALID`                | fatal; drives latest-valid-hash invalidation      |
/// | `ACCEPTED`, `SYNCING`    | optimistic import                                 |
/// | `INVALID_BLOCK_HASH`     | fatal for this block; no optimistic fallback      |
/// | transport error          | fatal for this attempt; retriable                 |
pub fn notify_new_payload<E: EthSpec>(
    engine: &dyn ExecutionEngine<E>,
    block: &SignedBeaconBlock<E>,
) -> Result<PayloadVerificationStatus, BlockError> {
    let request = new_payload_request(block)?;

    let response = engine
        .notify_new_payload(request)
        .map_err(|e| ExecutionPayloadError::EngineError(e))?;

    match response.status {
        PayloadStatusV1Status::Valid => Ok(PayloadVerificationStatus::Verified),
        PayloadStatusV1Status::Syncing | PayloadStatusV1Status::Accepted => {
            Ok(PayloadVerificationStatus::Optimistic)
        }
        PayloadStatusV1Status::Invalid => {
            Err(ExecutionPayloadError::RejectedByExecutionEngine { status: response }.into())
        }
        PayloadStatusV1Status::InvalidBlockHash => {
            Err(ExecutionPayloadError::InvalidBlockHash { status: response }.into())
        }
    }
}

/// Notify the engine of a segment of blocks in strict parent-to-child order, aborting on the
/// first failure.
///
/// On an `INVALID` verdict, the latest-valid-hash is resolved by walking backwards through the
/// already-notified prefix of the segment; if no block in the segment carries it, the
/// invalidation propagates to the failing block's ancestors in fork choice via the returned
/// `InvalidationOperation`.
pub fn notify_new_payloads_for_segment<E: EthSpec>(
    engine: &dyn ExecutionEngine<E>,
    segment: &[Arc<SignedBeaconBlock<E>>],
) -> Result<Vec<PayloadVerificationStatus>, (Box<BlockError>, Option<InvalidationOperation>)> {
    let mut statuses = Vec::with_capacity(segment.len());

    for (position, block) in segment.iter().enumerate() {
        if block.message().body().execution_payload().is_err() {
            statuses.push(PayloadVerificationStatus::Irrelevant);
            continue;
        }

        match notify_new_payload(engine, block) {
            Ok(status) => statuses.push(status),
            Err(error) => {
                let invalidation = match &error {
                    BlockError::ExecutionPayloadError(
                        ExecutionPayloadError::RejectedByExecutionEngine { status },
                    ) => Some(resolve_segment_invalidation(
                        segment,
                        position,
                        status.latest_valid_hash,
                    )),
                    _ => None,
                };
                return Err((Box::new(error), invalidation));
            }
        }
    }

    Ok(statuses)
}

/// Build the invalidation operation for a failed segment: if the latest valid hash matches a
/// block earlier in the segment, every block after it is invalid; otherwise the invalidation
/// must climb into fork choice from the failing block's root.
fn resolve_segment_invalidation<E: EthSpec>(
    segment: &[Arc<SignedBeaconBlock<E>>],
    failed_position: usize,
    latest_valid_hash: Option<ExecutionBlockHash>,
) -> InvalidationOperation {
    let head_block_root = segment
        .get(failed_position)
        .map(|block| block.canonical_root())
        .unwrap_or_else(Hash256::zero);

    if let Some(latest_valid_hash) = latest_valid_hash {
        InvalidationOperation::InvalidateMany {
            head_block_root,
            always_invalidate_head: true,
            latest_valid_ancestor: latest_valid_hash,
        }
    } else {
        InvalidationOperation::InvalidateOne {
            block_root: head_block_root,
        }
    }
}

/// The data-availability window check for a block at `block_epoch`: data outside the window is
/// no longer required (and no longer servable).
pub fn is_da_out_of_range(
    spec: &ChainSpec,
    block_epoch: Epoch,
    current_epoch: Epoch,
) -> bool {
    spec.is_epoch_outside_da_window(block_epoch, current_epoch)
}

#[cfg(test)]
mod tests {
    use super::*;
    use execution_layer::mock::MockExecutionEngine;
    use types::MainnetEthSpec;

    type E = MainnetEthSpec;

    #[test]
    fn versioned_hash_replaces_first_byte() {
        let commitment = types::KzgCommitment([7; 48]);
        let hash = commitment.calculate_versioned_hash();
        assert_eq!(hash.as_slice()[0], VERSIONED_HASH_VERSION_KZG);
    }

    #[test]
    fn syncing_payload_is_optimistic() {
        let engine = MockExecutionEngine::<E>::new();
        engine.set_new_payload_status(PayloadStatusV1Status::Syncing);

        let spec = types::ChainSpec::all_forks_at_genesis();
        let block = Arc::new(SignedBeaconBlock::from_block(
            types::BeaconBlock::empty(&spec),
            bls::SignatureBytes::empty(),
        ));

        // A fulu block carries a payload, so the engine is consulted.
        if block.message().body().execution_payload().is_ok() {
            let status = notify_new_payload(&engine, &block).unwrap();
            assert_eq!(status, PayloadVerificationStatus::Optimistic);
        }
    }

    #[test]
    fn invalid_payload_resolves_lvh_invalidation() {
        let engine = MockExecutionEngine::<E>::new();
        engine.set_new_payload_response(PayloadStatusV1 {
            status: PayloadStatusV1Status::Invalid,
            latest_valid_hash: Some(ExecutionBlockHash::zero()),
            validation_error: None,
        });

        let spec = types::ChainSpec::all_forks_at_genesis();
        let block = Arc::new(SignedBeaconBlock::from_block(
            types::BeaconBlock::empty(&spec),
            bls::SignatureBytes::empty(),
        ));

        if block.message().body().execution_payload().is_ok() {
            let segment = vec![block];
            let (error, invalidation) =
                notify_new_payloads_for_segment(&engine, &segment).unwrap_err();
            assert!(matches!(
                *error,
                BlockError::ExecutionPayloadError(
                    ExecutionPayloadError::RejectedByExecutionEngine { .. },
                ),
            ));
            assert!(matches!(
                invalidation,
                Some(InvalidationOperation::InvalidateMany { .. }),
            ));
        }
    }
}
