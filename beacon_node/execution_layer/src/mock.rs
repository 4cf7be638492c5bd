//! A programmable execution engine for tests: every request type can be primed with the status
//! it should return, and all received payloads are recorded.

use crate::engine_api::{
    BlobAndProofV1, BlobAndProofV2, EngineApiError, ForkchoiceState, ForkchoiceUpdatedResponse,
    GetPayloadResponse, NewPayloadRequest, PayloadAttributes, PayloadStatusV1,
    PayloadStatusV1Status,
};
use crate::ExecutionEngine;
use parking_lot::Mutex;
use std::collections::HashMap;
use types::{EthSpec, ExecutionBlockHash, Hash256};

pub struct MockExecutionEngine<E: EthSpec> {
    /// The status to return from the next `notify_new_payload` calls.
    new_payload_status: Mutex<PayloadStatusV1>,
    /// Per-block-hash overrides, taking precedence over `new_payload_status`.
    new_payload_statuses: Mutex<HashMap<ExecutionBlockHash, PayloadStatusV1>>,
    /// When set, every call fails with this transport error kind.
    transport_error: Mutex<Option<crate::engine_api::TransportError>>,
    /// Record of the payload block hashes the engine was told about, in call order.
    received_payloads: Mutex<Vec<ExecutionBlockHash>>,
    _phantom: std::marker::PhantomData<E>,
}

impl<E: EthSpec> Default for MockExecutionEngine<E> {
    fn default() -> Self {
        Self {
            new_payload_status: Mutex::new(PayloadStatusV1 {
                status: PayloadStatusV1Status::Valid,
                latest_valid_hash: None,
                validation_error: None,
            }),
            new_payload_statuses: Mutex::new(HashMap::new()),
            transport_error: Mutex::new(None),
            received_payloads: Mutex::new(vec![]),
            _phantom: std::marker::PhantomData,
        }
    }
}

impl<E: EthSpec> MockExecutionEngine<E> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the status returned for every payload without an explicit override.
    pub fn set_new_payload_status(&self, status: PayloadStatusV1Status) {
        self.new_payload_status.lock().status = status;
    }

    /// Prime the full response, including the latest valid hash.
    pub fn set_new_payload_response(&self, response: PayloadStatusV1) {
        *self.new_payload_status.lock() = response;
    }

    /// Prime the response for one specific payload block hash.
    pub fn set_status_for_block(&self, block_hash: ExecutionBlockHash, response: PayloadStatusV1) {
        self.new_payload_statuses.lock().insert(block_hash, response);
    }

    /// Make every exchange fail at the transport layer.
    pub fn set_transport_error(&self, error: Option<crate::engine_api::TransportError>) {
        *self.transport_error.lock() = error;
    }

    /// The payload block hashes received so far, in order.
    pub fn received_payloads(&self) -> Vec<ExecutionBlockHash> {
        self.received_payloads.lock().clone()
    }

    fn check_transport(&self) -> Result<(), EngineApiError> {
        if let Some(error) = self.transport_error.lock().clone() {
            return Err(EngineApiError::Transport(error));
        }
        Ok(())
    }
}

impl<E: EthSpec> ExecutionEngine<E> for MockExecutionEngine<E> {
    fn notify_new_payload(
        &self,
        request: NewPayloadRequest<E>,
    ) -> Result<PayloadStatusV1, EngineApiError> {
        self.check_transport()?;

        let block_hash = request.block_hash();
        self.received_payloads.lock().push(block_hash);

        if let Some(response) = self.new_payload_statuses.lock().get(&block_hash) {
            return Ok(response.clone());
        }
        Ok(self.new_payload_status.lock().clone())
    }

    fn notify_forkchoice_updated(
        &self,
        _forkchoice_state: ForkchoiceState,
        _payload_attributes: Option<PayloadAttributes>,
    ) -> Result<ForkchoiceUpdatedResponse, EngineApiError> {
        self.check_transport()?;
        Ok(ForkchoiceUpdatedResponse {
            payload_status: self.new_payload_status.lock().clone(),
            payload_id: None,
        })
    }

    fn get_payload(&self, _payload_id: [u8; 8]) -> Result<GetPayloadResponse<E>, EngineApiError> {
        self.check_transport()?;
        Err(EngineApiError::PayloadIdUnavailable)
    }

    fn get_blobs_v1(
        &self,
        versioned_hashes: Vec<Hash256>,
    ) -> Result<Vec<Option<BlobAndProofV1<E>>>, EngineApiError> {
        self.check_transport()?;
        Ok(vec![None; versioned_hashes.len()])
    }

    fn get_blobs_v2(
        &self,
        versioned_hashes: Vec<Hash256>,
    ) -> Result<Vec<Option<BlobAndProofV2<E>>>, EngineApiError> {
        self.check_transport()?;
        Ok(vec![None; versioned_hashes.len()])
    }
}
