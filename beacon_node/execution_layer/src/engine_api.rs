use kzg::{KzgCommitment, KzgProof};
use serde::{Deserialize, Serialize};
use strum::IntoStaticStr;
use types::{
    Address, Blob, EthSpec, ExecutionBlockHash, ExecutionPayload, ExecutionRequests, ForkName,
    Hash256, KzgProofs, Uint256,
};

/// The execution-engine's verdict on a `newPayload` call.
///
/// https://github.com/ethereum/execution-apis/blob/main/src/engine/paris.md#payloadstatusv1
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, IntoStaticStr)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum PayloadStatusV1Status {
    Valid,
    Invalid,
    Syncing,
    Accepted,
    InvalidBlockHash,
}

impl PayloadStatusV1Status {
    /// Statuses which permit an optimistic import, pending a later verdict.
    pub fn is_optimistic(&self) -> bool {
        matches!(
            self,
            PayloadStatusV1Status::Syncing | PayloadStatusV1Status::Accepted
        )
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayloadStatusV1 {
    pub status: PayloadStatusV1Status,
    pub latest_valid_hash: Option<ExecutionBlockHash>,
    pub validation_error: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForkchoiceState {
    pub head_block_hash: ExecutionBlockHash,
    pub safe_block_hash: ExecutionBlockHash,
    pub finalized_block_hash: ExecutionBlockHash,
}

/// Attributes for initiating payload production, `engine_forkchoiceUpdated`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayloadAttributes {
    #[serde(with = "serde_utils::quoted_u64")]
    pub timestamp: u64,
    pub prev_randao: Hash256,
    pub suggested_fee_recipient: Address,
    /// Post-capella.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub withdrawals: Option<Vec<types::Withdrawal>>,
    /// Post-deneb.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_beacon_block_root: Option<Hash256>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForkchoiceUpdatedResponse {
    pub payload_status: PayloadStatusV1,
    pub payload_id: Option<[u8; 8]>,
}

/// A `getPayload` response: the payload plus its bid value and sidecar bundle.
#[derive(Clone, Debug, PartialEq)]
pub struct GetPayloadResponse<E: EthSpec> {
    pub execution_payload: ExecutionPayload<E>,
    pub block_value: Uint256,
    pub blobs_bundle: Option<BlobsBundle<E>>,
    pub execution_requests: Option<ExecutionRequests<E>>,
}

/// The bundle of blobs, commitments and proofs returned alongside a produced payload.
///
/// Deneb and electra return one proof per blob (V1); fulu returns `CELLS_PER_EXT_BLOB` cell
/// proofs per blob (V2). The two shapes share this container, with the count distinguishing
/// them.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct BlobsBundle<E: EthSpec> {
    pub commitments: types::KzgCommitments<E>,
    pub proofs: Vec<KzgProof>,
    pub blobs: Vec<Blob<E>>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct BlobAndProofV1<E: EthSpec> {
    pub blob: Blob<E>,
    pub proof: KzgProof,
}

#[derive(Clone, Debug, PartialEq)]
pub struct BlobAndProofV2<E: EthSpec> {
    pub blob: Blob<E>,
    pub proofs: KzgProofs<E>,
}

/// A `newPayload` request, assembled from a beacon block by the import pipeline.
///
/// The versioned hashes and parent beacon block root are only present from deneb onwards, the
/// execution requests from electra onwards.
#[derive(Clone, Debug, PartialEq)]
pub struct NewPayloadRequest<E: EthSpec> {
    pub fork_name: ForkName,
    pub execution_payload: ExecutionPayload<E>,
    pub versioned_hashes: Option<Vec<Hash256>>,
    pub parent_beacon_block_root: Option<Hash256>,
    pub execution_requests: Option<ExecutionRequests<E>>,
}

impl<E: EthSpec> NewPayloadRequest<E> {
    pub fn block_hash(&self) -> ExecutionBlockHash {
        self.execution_payload.block_hash()
    }

    pub fn parent_hash(&self) -> ExecutionBlockHash {
        self.execution_payload.parent_hash()
    }
}

/// Classification of a failed engine HTTP exchange, at the granularity the engine state machine
/// cares about.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TransportError {
    /// The TCP connection was refused or the host could not be resolved. The engine is gone.
    ConnectionRefused,
    HostNotFound,
    /// The connection was torn down mid-exchange. With the engine API this is how failed JWT
    /// authentication manifests.
    ConnectionReset,
    ConnectionAborted,
    /// The request timed out; the engine may still be healthy under load.
    Timeout,
    Other(String),
}

#[derive(Debug)]
pub enum EngineApiError {
    /// The engine responded, but with a JSON-RPC error object.
    RequestFailed { code: i64, message: String },
    /// The response arrived but could not be deserialized.
    Json(serde_json::Error),
    /// The exchange failed below the HTTP layer.
    Transport(TransportError),
    /// The engine is required for this operation but was never configured.
    EngineNotConfigured,
    /// Payload production was requested before a `forkchoiceUpdated` supplied attributes.
    PayloadIdUnavailable,
    UnsupportedFork(ForkName),
}

impl From<serde_json::Error> for EngineApiError {
    fn from(e: serde_json::Error) -> Self {
        EngineApiError::Json(e)
    }
}
