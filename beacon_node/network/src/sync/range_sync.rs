//! The per-chain scheduler of range sync: a contiguous run of batches being downloaded from a
//! pool of peers, processed in order, and validated one batch behind processing.

use crate::sync::batch::{BatchError, BatchInfo, BatchState};
use crate::sync::block_input::BlockInput;
use crate::sync::network_context::{
    download_by_range_requests, PeerAction, PeerId, SyncNetworkContext,
};
use slog::{debug, warn, Logger};
use std::collections::{BTreeMap, HashSet};
use types::{ChainSpec, Epoch, EthSpec, Hash256, Slot};

/// The number of batches downloaded ahead of the batch being processed.
pub const BATCH_BUFFER_SIZE: u64 = 5;

/// The outcome the chain reports for a batch handed to the processor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchProcessResult {
    /// The batch was processed; `imported_blocks` counts the blocks accepted.
    Success { imported_blocks: usize },
    /// The batch failed consensus processing.
    FaultyFailure,
    /// The batch failed on an execution-engine error; retried on its own cap.
    NonFaultyFailure,
}

#[derive(Debug)]
pub enum RemoveChain {
    /// The chain completed its target.
    Complete,
    /// A batch exhausted its attempts; the whole chain is abandoned.
    BatchFailed(BatchError),
    /// The chain has no peers left to download from.
    EmptyPeerPool,
}

pub struct SyncingChain<E: EthSpec> {
    /// The first epoch this chain syncs (exclusive of already-held slots).
    start_epoch: Epoch,
    /// The slot and root this chain is syncing towards.
    pub target_head_slot: Slot,
    pub target_head_root: Hash256,
    /// All live batches, keyed by their epoch.
    batches: BTreeMap<Epoch, BatchInfo<E>>,
    /// The peer pool for this chain.
    peers: HashSet<PeerId>,
    /// The epoch of the next batch that has not yet been created.
    to_be_downloaded: Epoch,
    /// The epoch of the next batch to hand to the processor.
    processing_target: Epoch,
    /// The columns this node samples, shaping fulu requests.
    sampling_columns: HashSet<types::ColumnIndex>,
    log: Logger,
}

impl<E: EthSpec> SyncingChain<E> {
    pub fn new(
        start_epoch: Epoch,
        target_head_slot: Slot,
        target_head_root: Hash256,
        sampling_columns: HashSet<types::ColumnIndex>,
        log: Logger,
    ) -> Self {
        Self {
            start_epoch,
            target_head_slot,
            target_head_root,
            batches: BTreeMap::new(),
            peers: HashSet::new(),
            to_be_downloaded: start_epoch,
            processing_target: start_epoch,
            sampling_columns,
            log,
        }
    }

    pub fn add_peer(&mut self, peer: PeerId) {
        self.peers.insert(peer);
    }

    pub fn remove_peer(&mut self, peer: &PeerId) {
        self.peers.remove(peer);
    }

    pub fn peers(&self) -> impl Iterator<Item = &PeerId> {
        self.peers.iter()
    }

    /// Fill the download pipeline: create batches up to the buffer size and assign an idle,
    /// non-faulty peer to every batch awaiting download.
    pub fn request_batches(
        &mut self,
        network: &mut impl SyncNetworkContext,
        current_epoch: Epoch,
        spec: &ChainSpec,
    ) -> Result<(), RemoveChain> {
        if self.peers.is_empty() {
            return Err(RemoveChain::EmptyPeerPool);
        }

        // Create new batches within the buffer window.
        let window_limit = self
            .processing_target
            .saturating_add(BATCH_BUFFER_SIZE);
        while self.to_be_downloaded < window_limit
            && self.to_be_downloaded.start_slot(E::slots_per_epoch()) <= self.target_head_slot
        {
            let epoch = self.to_be_downloaded;
            let fork_name = spec.fork_name_at_slot::<E>(epoch.start_slot(E::slots_per_epoch()));
            self.batches
                .entry(epoch)
                .or_insert_with(|| BatchInfo::new(epoch, fork_name));
            self.to_be_downloaded += 1;
        }

        // Assign peers to idle batches, one batch per peer at a time.
        let mut busy_peers: HashSet<PeerId> = self
            .batches
            .values()
            .filter_map(|batch| batch.current_peer().copied())
            .collect();

        let epochs: Vec<Epoch> = self.batches.keys().copied().collect();
        for epoch in epochs {
            let Some(batch) = self.batches.get(&epoch) else {
                continue;
            };
            if !matches!(batch.state(), BatchState::AwaitingDownload) {
                continue;
            }

            // Peers that failed this batch are excluded from its next attempt.
            let failed = batch.failed_peers();
            let candidate = self
                .peers
                .iter()
                .find(|peer| !failed.contains(peer) && !busy_peers.contains(peer))
                .copied();

            let Some(peer) = candidate else {
                // No usable peer right now; retry on the next `request_batches`.
                continue;
            };

            busy_peers.insert(peer);
            self.send_batch(network, epoch, peer, current_epoch, spec)?;
        }

        Ok(())
    }

    fn send_batch(
        &mut self,
        network: &mut impl SyncNetworkContext,
        epoch: Epoch,
        peer: PeerId,
        current_epoch: Epoch,
        spec: &ChainSpec,
    ) -> Result<(), RemoveChain> {
        let Some(batch) = self.batches.get_mut(&epoch) else {
            return Ok(());
        };

        let peer_custody_columns = network
            .peer_info(&peer)
            .map(|info| info.custody_columns);

        let requests = download_by_range_requests(
            batch.fork_name(),
            batch.start_slot(),
            batch.count(),
            epoch,
            current_epoch,
            spec,
            &self.sampling_columns,
            peer_custody_columns.as_ref(),
        );

        batch
            .start_downloading(peer)
            .map_err(RemoveChain::BatchFailed)?;

        if let Err(e) = network.send_by_range_requests(peer, requests) {
            warn!(self.log, "Failed to send batch"; "epoch" => %epoch, "error" => e);
            batch
                .downloading_error(peer)
                .map_err(RemoveChain::BatchFailed)?;
        }

        Ok(())
    }

    /// A complete (or partial) download response for a batch arrived.
    ///
    /// Partially downloaded batches re-enter the download queue; the next request is advanced
    /// past the contiguous prefix of inputs that already hold their block, and gaps are filled
    /// from each input's missing set.
    pub fn on_batch_downloaded(
        &mut self,
        network: &mut impl SyncNetworkContext,
        epoch: Epoch,
        blocks: Vec<BlockInput<E>>,
        current_epoch: Epoch,
        spec: &ChainSpec,
    ) -> Result<(), RemoveChain> {
        let Some(batch) = self.batches.get_mut(&epoch) else {
            return Ok(());
        };

        match batch.download_completed(blocks) {
            Ok(true) => {}
            Ok(false) => {
                // Data still outstanding; request again (from another peer if available).
                return self.request_batches(network, current_epoch, spec);
            }
            Err(e @ BatchError::MaxDownloadAttempts) => return Err(RemoveChain::BatchFailed(e)),
            Err(e) => {
                debug!(self.log, "Batch download bookkeeping error"; "error" => ?e);
                return Ok(());
            }
        }

        Ok(())
    }

    /// A download from `peer` failed.
    pub fn on_batch_download_error(
        &mut self,
        network: &mut impl SyncNetworkContext,
        epoch: Epoch,
        peer: PeerId,
        current_epoch: Epoch,
        spec: &ChainSpec,
    ) -> Result<(), RemoveChain> {
        let Some(batch) = self.batches.get_mut(&epoch) else {
            return Ok(());
        };

        batch
            .downloading_error(peer)
            .map_err(RemoveChain::BatchFailed)?;

        self.request_batches(network, current_epoch, spec)
    }

    /// The next batch ready for the processor, in strict epoch order.
    pub fn next_batch_to_process(&mut self) -> Option<(Epoch, Vec<BlockInput<E>>)> {
        let epoch = self.processing_target;
        let batch = self.batches.get_mut(&epoch)?;
        if !matches!(batch.state(), BatchState::AwaitingProcessing(_, _)) {
            return None;
        }
        let blocks = batch.start_processing().ok()?;
        Some((epoch, blocks))
    }

    /// The processor reported the outcome for the batch at `epoch`.
    ///
    /// A success with at least one imported block validates the *previous* batch: a peer that
    /// served an empty batch is only believed once a following batch connects to the chain.
    pub fn on_batch_processed(
        &mut self,
        network: &mut impl SyncNetworkContext,
        epoch: Epoch,
        result: BatchProcessResult,
        current_epoch: Epoch,
        spec: &ChainSpec,
    ) -> Result<(), RemoveChain> {
        match result {
            BatchProcessResult::Success { imported_blocks } => {
                {
                    let Some(batch) = self.batches.get_mut(&epoch) else {
                        return Ok(());
                    };
                    batch
                        .processing_completed()
                        .map_err(RemoveChain::BatchFailed)?;
                }

                if imported_blocks > 0 {
                    // Validate all prior batches awaiting validation.
                    let prior: Vec<Epoch> = self
                        .batches
                        .range(..epoch)
                        .filter(|(_, batch)| {
                            matches!(batch.state(), BatchState::AwaitingValidation(_))
                        })
                        .map(|(epoch, _)| *epoch)
                        .collect();
                    for prior_epoch in prior {
                        if let Some(batch) = self.batches.get_mut(&prior_epoch) {
                            batch
                                .validation_completed()
                                .map_err(RemoveChain::BatchFailed)?;
                        }
                        self.batches.remove(&prior_epoch);
                    }
                }

                self.processing_target += 1;

                if self.processing_target.start_slot(E::slots_per_epoch())
                    > self.target_head_slot
                {
                    return Err(RemoveChain::Complete);
                }

                self.request_batches(network, current_epoch, spec)
            }
            BatchProcessResult::FaultyFailure => {
                // Penalize every peer credited with the failed attempt, then re-download.
                let Some(batch) = self.batches.get_mut(&epoch) else {
                    return Ok(());
                };
                if let BatchState::Processing(attempt) = batch.state() {
                    for peer in attempt.peers.clone() {
                        network.report_peer(
                            peer,
                            PeerAction::LowToleranceError,
                            "faulty_batch",
                        );
                    }
                }
                batch
                    .processing_error(false)
                    .map_err(RemoveChain::BatchFailed)?;

                // The previous batch may have hidden the real fault (e.g. an omitted block):
                // pull it back for re-download too.
                if let Some(previous) = epoch.as_u64().checked_sub(1).map(Epoch::new) {
                    if let Some(batch) = self.batches.get_mut(&previous) {
                        if matches!(batch.state(), BatchState::AwaitingValidation(_)) {
                            batch
                                .validation_error()
                                .map_err(RemoveChain::BatchFailed)?;
                            self.processing_target = previous;
                        }
                    }
                }

                self.request_batches(network, current_epoch, spec)
            }
            BatchProcessResult::NonFaultyFailure => {
                let Some(batch) = self.batches.get_mut(&epoch) else {
                    return Ok(());
                };
                batch
                    .processing_error(true)
                    .map_err(RemoveChain::BatchFailed)?;
                self.request_batches(network, current_epoch, spec)
            }
        }
    }

    /// A compact visualisation of the batch pipeline, for logs.
    pub fn visualize_batch_states(&self) -> String {
        self.batches
            .values()
            .map(|batch| batch.state().visualize())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::block_input::DataRequirement;
    use crate::sync::network_context::testing::TestingSyncNetworkContext;
    use std::sync::Arc;
    use types::{FixedBytesExtended, MainnetEthSpec};

    type E = MainnetEthSpec;

    fn logger() -> Logger {
        Logger::root(slog::Discard, slog::o!())
    }

    fn peer(byte: u8) -> PeerId {
        PeerId([byte; 32])
    }

    fn chain() -> SyncingChain<E> {
        SyncingChain::new(
            Epoch::new(0),
            Slot::new(96),
            Hash256::repeat_byte(9),
            HashSet::new(),
            logger(),
        )
    }

    fn complete_inputs(epoch: u64) -> Vec<BlockInput<E>> {
        let spec = ChainSpec::mainnet();
        let slot = Epoch::new(epoch).start_slot(E::slots_per_epoch()) + 1;
        let mut input = BlockInput::new(slot, Hash256::from_low_u64_be(slot.as_u64()));
        input.add_block(
            Arc::new(types::SignedBeaconBlock::from_block(
                types::BeaconBlock::empty(&spec),
                bls::SignatureBytes::empty(),
            )),
            DataRequirement::PreData,
        );
        vec![input]
    }

    #[test]
    fn empty_peer_pool_removes_chain() {
        let mut chain = chain();
        let mut network = TestingSyncNetworkContext::default();
        let spec = ChainSpec::mainnet();

        assert!(matches!(
            chain.request_batches(&mut network, Epoch::new(0), &spec),
            Err(RemoveChain::EmptyPeerPool),
        ));
    }

    #[test]
    fn batches_are_created_and_assigned() {
        let mut chain = chain();
        let mut network = TestingSyncNetworkContext::default();
        let spec = ChainSpec::mainnet();

        chain.add_peer(peer(1));
        chain
            .request_batches(&mut network, Epoch::new(10), &spec)
            .unwrap();

        // One peer can only serve one batch at a time.
        assert_eq!(network.requests.len(), 1);
        assert_eq!(network.requests[0].0, peer(1));
    }

    #[test]
    fn failed_peer_is_not_reselected() {
        let mut chain = chain();
        let mut network = TestingSyncNetworkContext::default();
        let spec = ChainSpec::mainnet();

        chain.add_peer(peer(1));
        chain
            .request_batches(&mut network, Epoch::new(10), &spec)
            .unwrap();

        // Fail the download from peer 1; with only that peer in the pool, the batch cannot be
        // reassigned.
        chain
            .on_batch_download_error(&mut network, Epoch::new(0), peer(1), Epoch::new(10), &spec)
            .unwrap();
        assert_eq!(network.requests.len(), 1);

        // A second peer is selected immediately.
        chain.add_peer(peer(2));
        chain
            .request_batches(&mut network, Epoch::new(10), &spec)
            .unwrap();
        let assigned: Vec<PeerId> = network.requests.iter().map(|(p, _)| *p).collect();
        assert!(assigned.contains(&peer(2)));
    }

    #[test]
    fn validation_requires_next_batch_to_import() {
        let mut chain = chain();
        let mut network = TestingSyncNetworkContext::default();
        let spec = ChainSpec::mainnet();
        let current = Epoch::new(10);

        chain.add_peer(peer(1));
        chain.add_peer(peer(2));
        chain.request_batches(&mut network, current, &spec).unwrap();

        // Download and process batch 0.
        chain
            .on_batch_downloaded(&mut network, Epoch::new(0), complete_inputs(0), current, &spec)
            .unwrap();
        let (epoch, _blocks) = chain.next_batch_to_process().unwrap();
        assert_eq!(epoch, Epoch::new(0));
        chain
            .on_batch_processed(
                &mut network,
                epoch,
                BatchProcessResult::Success { imported_blocks: 1 },
                current,
                &spec,
            )
            .unwrap();

        // Batch 0 is still awaiting validation (no later batch has imported yet).
        assert!(chain.visualize_batch_states().starts_with('v'));

        // Download and process batch 1 with imported blocks: batch 0 becomes validated and is
        // dropped from the pipeline.
        chain
            .on_batch_downloaded(&mut network, Epoch::new(1), complete_inputs(1), current, &spec)
            .unwrap();
        let (epoch, _blocks) = chain.next_batch_to_process().unwrap();
        assert_eq!(epoch, Epoch::new(1));
        chain
            .on_batch_processed(
                &mut network,
                epoch,
                BatchProcessResult::Success { imported_blocks: 1 },
                current,
                &spec,
            )
            .unwrap();

        assert!(chain.batches.get(&Epoch::new(0)).is_none());
    }

    #[test]
    fn faulty_processing_reports_the_attempt_peers() {
        let mut chain = chain();
        let mut network = TestingSyncNetworkContext::default();
        let spec = ChainSpec::mainnet();
        let current = Epoch::new(10);

        chain.add_peer(peer(1));
        chain.request_batches(&mut network, current, &spec).unwrap();
        chain
            .on_batch_downloaded(&mut network, Epoch::new(0), complete_inputs(0), current, &spec)
            .unwrap();
        let (epoch, _blocks) = chain.next_batch_to_process().unwrap();

        chain
            .on_batch_processed(
                &mut network,
                epoch,
                BatchProcessResult::FaultyFailure,
                current,
                &spec,
            )
            .unwrap();

        assert!(network
            .reports
            .iter()
            .any(|(p, action, _)| *p == peer(1) && *action == PeerAction::LowToleranceError));
    }
}
