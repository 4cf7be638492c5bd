//! The unit of range sync: one epoch's worth of slots, downloaded from a single peer and
//! carried through a state machine until its blocks are processed and validated.

use crate::sync::block_input::BlockInput;
use crate::sync::network_context::PeerId;
use std::collections::HashSet;
use std::hash::{Hash, Hasher};
use types::{Epoch, EthSpec, ForkName, Slot};

/// Number of times a batch is re-downloaded before the chain it belongs to is dropped.
pub const MAX_BATCH_DOWNLOAD_ATTEMPTS: u8 = 5;

/// Number of times a batch's blocks may fail processing before the chain is dropped.
pub const MAX_BATCH_PROCESSING_ATTEMPTS: u8 = 3;

/// Execution-engine errors are transient, so they are retried more generously than consensus
/// failures.
pub const MAX_BATCH_EXECUTION_ENGINE_ERROR_ATTEMPTS: u8 = 10;

/// An illegal operation for the batch's current state, or an attempt-count cap being hit.
///
/// No state mutation occurs when an error is returned.
#[derive(Debug, PartialEq, Eq)]
pub enum BatchError {
    /// The operation is not legal in the batch's current state.
    WrongStatus {
        operation: &'static str,
        state: &'static str,
    },
    /// A response contained more blocks than the batch requested.
    InvalidCount { expected: u64, found: u64 },
    /// The download-attempt cap was exceeded.
    MaxDownloadAttempts,
    /// The processing-attempt cap was exceeded.
    MaxProcessingAttempts,
    /// The execution-engine-error cap was exceeded.
    MaxExecutionEngineErrorAttempts,
}

/// A peer and the content it delivered, snapshotted when processing starts so that blame can
/// be assigned when a later validation fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attempt {
    /// The peer(s) that served the data of this attempt.
    pub peers: Vec<PeerId>,
    /// A hash of the content of the batch, to distinguish retries that served different data.
    pub hash: u64,
}

pub enum BatchState<E: EthSpec> {
    /// The batch is waiting to be assigned a peer.
    AwaitingDownload,
    /// The batch is being downloaded from `peer`.
    Downloading(PeerId),
    /// The batch has been completely downloaded and is ready for processing.
    AwaitingProcessing(PeerId, Vec<BlockInput<E>>),
    /// The batch is being processed.
    Processing(Attempt),
    /// The batch was processed successfully and is awaiting validation by a following batch
    /// importing at least one block. This defends against a peer serving a plausible-looking
    /// empty batch.
    AwaitingValidation(Attempt),
    /// The batch is fully processed and validated.
    Done,
    /// Intermediate state, only observed if a state-transition closure panicked.
    Poisoned,
}

impl<E: EthSpec> BatchState<E> {
    pub fn visualize(&self) -> char {
        match self {
            BatchState::AwaitingDownload => 'd',
            BatchState::Downloading(_) => 'D',
            BatchState::AwaitingProcessing(_, _) => 'p',
            BatchState::Processing(_) => 'P',
            BatchState::AwaitingValidation(_) => 'v',
            BatchState::Done => 'V',
            BatchState::Poisoned => 'X',
        }
    }

    fn name(&self) -> &'static str {
        match self {
            BatchState::AwaitingDownload => "AwaitingDownload",
            BatchState::Downloading(_) => "Downloading",
            BatchState::AwaitingProcessing(_, _) => "AwaitingProcessing",
            BatchState::Processing(_) => "Processing",
            BatchState::AwaitingValidation(_) => "AwaitingValidation",
            BatchState::Done => "Done",
            BatchState::Poisoned => "Poisoned",
        }
    }
}

pub struct BatchInfo<E: EthSpec> {
    /// The epoch this batch covers.
    start_epoch: Epoch,
    /// The first slot of the batch.
    start_slot: Slot,
    /// The number of slots requested (one epoch).
    count: u64,
    /// The fork at `start_slot`, which shapes the by-range requests.
    fork_name: ForkName,
    /// Peers that failed to deliver the batch; never selected for the next attempt.
    failed_download_attempts: Vec<PeerId>,
    /// Snapshots of the attempts whose processing failed.
    failed_processing_attempts: Vec<Attempt>,
    /// Attempts that failed on an execution-engine error, tracked separately since they are
    /// retried against a different cap.
    failed_execution_attempts: Vec<Attempt>,
    /// Peers whose data survived processing, carried across retries for accountability.
    good_peers: Vec<PeerId>,
    state: BatchState<E>,
}

impl<E: EthSpec> BatchInfo<E> {
    /// Create a batch for `start_epoch`, covering one epoch of slots.
    ///
    /// Requests are aligned per `(epoch * slots_per_epoch) + 1` so that the epoch-boundary
    /// block (which belongs to the prior batch's state) is not double-requested.
    pub fn new(start_epoch: Epoch, fork_name: ForkName) -> Self {
        let start_slot = start_epoch.start_slot(E::slots_per_epoch()) + 1;
        BatchInfo {
            start_epoch,
            start_slot,
            count: E::slots_per_epoch(),
            fork_name,
            failed_download_attempts: Vec::new(),
            failed_processing_attempts: Vec::new(),
            failed_execution_attempts: Vec::new(),
            good_peers: Vec::new(),
            state: BatchState::AwaitingDownload,
        }
    }

    pub fn start_epoch(&self) -> Epoch {
        self.start_epoch
    }

    pub fn start_slot(&self) -> Slot {
        self.start_slot
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn fork_name(&self) -> ForkName {
        self.fork_name
    }

    pub fn state(&self) -> &BatchState<E> {
        &self.state
    }

    /// Peers which have participated in any failed attempt against this batch; they are never
    /// selected for the next attempt until the batch resets.
    pub fn failed_peers(&self) -> HashSet<PeerId> {
        let mut peers = HashSet::with_capacity(
            self.failed_download_attempts.len() + self.failed_processing_attempts.len(),
        );
        for peer in &self.failed_download_attempts {
            peers.insert(*peer);
        }
        for attempt in &self.failed_processing_attempts {
            peers.extend(attempt.peers.iter().copied());
        }
        peers
    }

    /// The peer currently responsible for the batch, if any.
    pub fn current_peer(&self) -> Option<&PeerId> {
        match &self.state {
            BatchState::AwaitingDownload | BatchState::Done | BatchState::Poisoned => None,
            BatchState::Downloading(peer_id)
            | BatchState::AwaitingProcessing(peer_id, _) => Some(peer_id),
            BatchState::Processing(attempt) | BatchState::AwaitingValidation(attempt) => {
                attempt.peers.first()
            }
        }
    }

    /*
     * State transitions. Illegal operations return `WrongStatus` and leave the state
     * untouched.
     */

    /// AwaitingDownload -> Downloading.
    pub fn start_downloading(&mut self, peer: PeerId) -> Result<(), BatchError> {
        match self.state {
            BatchState::AwaitingDownload => {
                self.state = BatchState::Downloading(peer);
                Ok(())
            }
            ref other => Err(BatchError::WrongStatus {
                operation: "start_downloading",
                state: other.name(),
            }),
        }
    }

    /// Downloading -> AwaitingProcessing when every block input is complete, or back to
    /// AwaitingDownload when data is still outstanding (the caller issues the follow-up
    /// requests shaped from the inputs' `missing_*` sets).
    pub fn download_completed(
        &mut self,
        blocks: Vec<BlockInput<E>>,
    ) -> Result<bool, BatchError> {
        match std::mem::replace(&mut self.state, BatchState::Poisoned) {
            BatchState::Downloading(peer) => {
                if blocks.len() as u64 > self.count {
                    let found = blocks.len() as u64;
                    self.state = BatchState::Downloading(peer);
                    return Err(BatchError::InvalidCount {
                        expected: self.count,
                        found,
                    });
                }

                if !self.good_peers.contains(&peer) {
                    self.good_peers.push(peer);
                }

                if blocks.iter().all(BlockInput::has_block_and_all_data) {
                    self.state = BatchState::AwaitingProcessing(peer, blocks);
                    Ok(true)
                } else {
                    // Partial data: re-enter the download state for the gaps.
                    self.state = BatchState::AwaitingDownload;
                    Ok(false)
                }
            }
            other => {
                let result = Err(BatchError::WrongStatus {
                    operation: "download_completed",
                    state: other.name(),
                });
                self.state = other;
                result
            }
        }
    }

    /// Downloading -> AwaitingDownload, recording the failed peer. Errors with
    /// `MaxDownloadAttempts` once the cap is exceeded.
    pub fn downloading_error(&mut self, peer: PeerId) -> Result<(), BatchError> {
        match self.state {
            BatchState::Downloading(_) => {
                if self.failed_download_attempts.len() + 1 > MAX_BATCH_DOWNLOAD_ATTEMPTS as usize
                {
                    return Err(BatchError::MaxDownloadAttempts);
                }
                self.failed_download_attempts.push(peer);
                self.state = BatchState::AwaitingDownload;
                Ok(())
            }
            ref other => Err(BatchError::WrongStatus {
                operation: "downloading_error",
                state: other.name(),
            }),
        }
    }

    /// AwaitingProcessing -> Processing, snapshotting a content hash and the peers credited
    /// with this attempt.
    pub fn start_processing(&mut self) -> Result<Vec<BlockInput<E>>, BatchError> {
        match std::mem::replace(&mut self.state, BatchState::Poisoned) {
            BatchState::AwaitingProcessing(peer, blocks) => {
                let mut hasher = std::collections::hash_map::DefaultHasher::new();
                for block in &blocks {
                    block.block_root().hash(&mut hasher);
                }
                let mut peers = self.good_peers.clone();
                if !peers.contains(&peer) {
                    peers.push(peer);
                }
                self.state = BatchState::Processing(Attempt {
                    peers,
                    hash: hasher.finish(),
                });
                Ok(blocks)
            }
            other => {
                let result = Err(BatchError::WrongStatus {
                    operation: "start_processing",
                    state: other.name(),
                });
                self.state = other;
                result
            }
        }
    }

    /// Processing -> AwaitingValidation.
    pub fn processing_completed(&mut self) -> Result<(), BatchError> {
        match std::mem::replace(&mut self.state, BatchState::Poisoned) {
            BatchState::Processing(attempt) => {
                self.state = BatchState::AwaitingValidation(attempt);
                Ok(())
            }
            other => {
                let result = Err(BatchError::WrongStatus {
                    operation: "processing_completed",
                    state: other.name(),
                });
                self.state = other;
                result
            }
        }
    }

    /// Processing -> AwaitingDownload with the blocks cleared. `execution_error` routes the
    /// attempt onto the more generous execution-engine cap.
    pub fn processing_error(&mut self, execution_error: bool) -> Result<(), BatchError> {
        match std::mem::replace(&mut self.state, BatchState::Poisoned) {
            BatchState::Processing(attempt) => {
                if execution_error {
                    if self.failed_execution_attempts.len() + 1
                        > MAX_BATCH_EXECUTION_ENGINE_ERROR_ATTEMPTS as usize
                    {
                        self.state = BatchState::Processing(attempt);
                        return Err(BatchError::MaxExecutionEngineErrorAttempts);
                    }
                    self.failed_execution_attempts.push(attempt);
                } else {
                    if self.failed_processing_attempts.len() + 1
                        > MAX_BATCH_PROCESSING_ATTEMPTS as usize
                    {
                        self.state = BatchState::Processing(attempt);
                        return Err(BatchError::MaxProcessingAttempts);
                    }
                    self.failed_processing_attempts.push(attempt);
                }
                self.state = BatchState::AwaitingDownload;
                Ok(())
            }
            other => {
                let result = Err(BatchError::WrongStatus {
                    operation: "processing_error",
                    state: other.name(),
                });
                self.state = other;
                result
            }
        }
    }

    /// AwaitingValidation -> AwaitingDownload: a following batch contradicted this one, so its
    /// content is suspect and must be re-downloaded. The blamed attempt is recorded.
    pub fn validation_error(&mut self) -> Result<(), BatchError> {
        match std::mem::replace(&mut self.state, BatchState::Poisoned) {
            BatchState::AwaitingValidation(attempt) => {
                if self.failed_processing_attempts.len() + 1
                    > MAX_BATCH_PROCESSING_ATTEMPTS as usize
                {
                    self.state = BatchState::AwaitingValidation(attempt);
                    return Err(BatchError::MaxProcessingAttempts);
                }
                self.failed_processing_attempts.push(attempt);
                self.state = BatchState::AwaitingDownload;
                Ok(())
            }
            other => {
                let result = Err(BatchError::WrongStatus {
                    operation: "validation_error",
                    state: other.name(),
                });
                self.state = other;
                result
            }
        }
    }

    /// AwaitingValidation -> Done. Only called once the *next* batch has imported at least one
    /// block, confirming that this batch did not maliciously omit blocks.
    pub fn validation_completed(&mut self) -> Result<Attempt, BatchError> {
        match std::mem::replace(&mut self.state, BatchState::Poisoned) {
            BatchState::AwaitingValidation(attempt) => {
                self.state = BatchState::Done;
                Ok(attempt)
            }
            other => {
                let result = Err(BatchError::WrongStatus {
                    operation: "validation_completed",
                    state: other.name(),
                });
                self.state = other;
                result
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use types::{FixedBytesExtended, Hash256, MainnetEthSpec};

    type E = MainnetEthSpec;

    fn peer(byte: u8) -> PeerId {
        PeerId([byte; 32])
    }

    fn complete_input(slot: u64) -> BlockInput<E> {
        use crate::sync::block_input::DataRequirement;
        use std::sync::Arc;

        let spec = types::ChainSpec::mainnet();
        let mut input = BlockInput::new(Slot::new(slot), Hash256::from_low_u64_be(slot));
        input.add_block(
            Arc::new(types::SignedBeaconBlock::from_block(
                types::BeaconBlock::empty(&spec),
                bls::SignatureBytes::empty(),
            )),
            DataRequirement::PreData,
        );
        input
    }

    #[test]
    fn happy_path_reaches_done() {
        let mut batch = BatchInfo::<E>::new(Epoch::new(1), ForkName::Base);
        assert!(matches!(batch.state(), BatchState::AwaitingDownload));

        batch.start_downloading(peer(1)).unwrap();
        assert!(batch.download_completed(vec![complete_input(33)]).unwrap());

        let blocks = batch.start_processing().unwrap();
        assert_eq!(blocks.len(), 1);
        batch.processing_completed().unwrap();
        let attempt = batch.validation_completed().unwrap();

        assert!(matches!(batch.state(), BatchState::Done));
        assert!(attempt.peers.contains(&peer(1)));
    }

    #[test]
    fn download_error_cap_is_enforced() {
        let mut batch = BatchInfo::<E>::new(Epoch::new(0), ForkName::Base);

        for _ in 0..MAX_BATCH_DOWNLOAD_ATTEMPTS {
            batch.start_downloading(peer(1)).unwrap();
            batch.downloading_error(peer(1)).unwrap();
        }

        // One more than the cap must fail.
        batch.start_downloading(peer(1)).unwrap();
        assert_eq!(
            batch.downloading_error(peer(1)),
            Err(BatchError::MaxDownloadAttempts),
        );
    }

    #[test]
    fn illegal_transitions_error_without_mutating() {
        let mut batch = BatchInfo::<E>::new(Epoch::new(0), ForkName::Base);

        // Cannot process a batch that was never downloaded.
        assert_eq!(
            batch.start_processing().unwrap_err(),
            BatchError::WrongStatus {
                operation: "start_processing",
                state: "AwaitingDownload",
            },
        );
        assert!(matches!(batch.state(), BatchState::AwaitingDownload));

        // Cannot complete a download that was never started.
        assert_eq!(
            batch.download_completed(vec![]).unwrap_err(),
            BatchError::WrongStatus {
                operation: "download_completed",
                state: "AwaitingDownload",
            },
        );
        assert!(matches!(batch.state(), BatchState::AwaitingDownload));

        // Cannot validate before processing.
        batch.start_downloading(peer(1)).unwrap();
        assert_eq!(
            batch.validation_completed().unwrap_err(),
            BatchError::WrongStatus {
                operation: "validation_completed",
                state: "Downloading",
            },
        );
        assert!(matches!(batch.state(), BatchState::Downloading(_)));
    }

    #[test]
    fn incomplete_data_returns_to_awaiting_download() {
        let mut batch = BatchInfo::<E>::new(Epoch::new(0), ForkName::Base);
        batch.start_downloading(peer(7)).unwrap();

        // An input with no block yet is incomplete.
        let input = BlockInput::<E>::new(Slot::new(1), Hash256::zero());
        assert!(!batch.download_completed(vec![input]).unwrap());
        assert!(matches!(batch.state(), BatchState::AwaitingDownload));

        // The serving peer is still credited as good.
        batch.start_downloading(peer(7)).unwrap();
        assert!(batch.download_completed(vec![complete_input(1)]).unwrap());
        let blocks = batch.start_processing().unwrap();
        assert_eq!(blocks.len(), 1);
    }

    #[test]
    fn failed_peers_accumulate_across_attempts() {
        let mut batch = BatchInfo::<E>::new(Epoch::new(0), ForkName::Base);

        batch.start_downloading(peer(1)).unwrap();
        batch.downloading_error(peer(1)).unwrap();

        batch.start_downloading(peer(2)).unwrap();
        batch.download_completed(vec![complete_input(1)]).unwrap();
        batch.start_processing().unwrap();
        batch.processing_error(false).unwrap();

        let failed = batch.failed_peers();
        assert!(failed.contains(&peer(1)));
        assert!(failed.contains(&peer(2)));
    }

    #[test]
    fn execution_errors_use_their_own_cap() {
        let mut batch = BatchInfo::<E>::new(Epoch::new(0), ForkName::Base);

        // More processing rounds than MAX_BATCH_PROCESSING_ATTEMPTS are fine when the
        // failures are execution-engine errors.
        for _ in 0..MAX_BATCH_PROCESSING_ATTEMPTS + 2 {
            batch.start_downloading(peer(1)).unwrap();
            batch.download_completed(vec![complete_input(1)]).unwrap();
            batch.start_processing().unwrap();
            batch.processing_error(true).unwrap();
        }
    }
}
