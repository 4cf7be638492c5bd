//! The collaborator interface to the execution engine: the `engine-api` wire types, the engine
//! connection-state machine, and the `ExecutionEngine` trait consumed by the block import
//! pipeline. The JSON-RPC HTTP transport itself lives behind that trait.

pub mod engine_api;
pub mod engines;
pub mod mock;

pub use engine_api::{
    BlobAndProofV1, BlobAndProofV2, EngineApiError, ForkchoiceState, ForkchoiceUpdatedResponse,
    GetPayloadResponse, NewPayloadRequest, PayloadAttributes, PayloadStatusV1,
    PayloadStatusV1Status, TransportError,
};
pub use engines::{EngineState, EngineStateMachine};

use types::{EthSpec, Hash256};

/// The interface to an execution engine, as consumed by the block import pipeline and block
/// production.
///
/// Implementations are expected to map errors onto `EngineApiError` so that the engine state
/// machine can classify them.
pub trait ExecutionEngine<E: EthSpec>: Send + Sync {
    /// `engine_newPayload`: ask the engine to validate and insert an execution payload.
    fn notify_new_payload(
        &self,
        request: NewPayloadRequest<E>,
    ) -> Result<PayloadStatusV1, EngineApiError>;

    /// `engine_forkchoiceUpdated`: notify the engine of a change in chain head, optionally
    /// initiating payload production.
    fn notify_forkchoice_updated(
        &self,
        forkchoice_state: ForkchoiceState,
        payload_attributes: Option<PayloadAttributes>,
    ) -> Result<ForkchoiceUpdatedResponse, EngineApiError>;

    /// `engine_getPayload`: retrieve a payload that was previously requested via
    /// `notify_forkchoice_updated`.
    fn get_payload(&self, payload_id: [u8; 8]) -> Result<GetPayloadResponse<E>, EngineApiError>;

    /// `engine_getBlobsV1`: fetch blobs-and-proofs from the engine's public mempool, if held.
    fn get_blobs_v1(
        &self,
        versioned_hashes: Vec<Hash256>,
    ) -> Result<Vec<Option<BlobAndProofV1<E>>>, EngineApiError>;

    /// `engine_getBlobsV2`: as `get_blobs_v1`, but returning cell proofs (fulu).
    fn get_blobs_v2(
        &self,
        versioned_hashes: Vec<Hash256>,
    ) -> Result<Vec<Option<BlobAndProofV2<E>>>, EngineApiError>;
}
