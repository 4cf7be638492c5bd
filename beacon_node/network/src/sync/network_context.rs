//! The interface through which the sync scheduler talks to the network service: issuing
//! by-range requests and reporting peer behaviour. The libp2p implementation lives outside
//! this crate; tests use a recording stub.

use std::collections::HashSet;
use std::fmt;
use types::{ColumnIndex, Epoch, Slot};

/// An opaque peer identifier. The underlying transport assigns these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PeerId(pub [u8; 32]);

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(&self.0[..4]))
    }
}

/// How strongly to act against a misbehaving peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerAction {
    /// The peer is clearly malicious or broken; disconnect and ban.
    Fatal,
    /// Significant offence, several of which lead to a ban.
    LowToleranceError,
    /// Minor offence, e.g. malformed data that may be a version mismatch.
    MidToleranceError,
    /// Trivial offence, e.g. a late response.
    HighToleranceError,
}

/// A `BeaconBlocksByRange`-style request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlocksByRangeRequest {
    pub start_slot: Slot,
    pub count: u64,
}

/// A `BlobSidecarsByRange`-style request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobsByRangeRequest {
    pub start_slot: Slot,
    pub count: u64,
}

/// A `DataColumnSidecarsByRange`-style request, restricted to a column subset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataColumnsByRangeRequest {
    pub start_slot: Slot,
    pub count: u64,
    pub columns: Vec<ColumnIndex>,
}

/// The set of by-range sub-requests a batch issues for its epoch, shaped by the fork at the
/// batch's start slot and the data-availability window.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DownloadByRangeRequests {
    pub blocks_request: Option<BlocksByRangeRequest>,
    pub blobs_request: Option<BlobsByRangeRequest>,
    pub columns_request: Option<DataColumnsByRangeRequest>,
}

impl DownloadByRangeRequests {
    pub fn is_empty(&self) -> bool {
        self.blocks_request.is_none()
            && self.blobs_request.is_none()
            && self.columns_request.is_none()
    }
}

/// Summary of a peer, as carried in its `MetaData` and `Status` exchanges.
#[derive(Debug, Clone, Default)]
pub struct PeerInfo {
    /// The columns the peer custodies and can serve (fulu).
    pub custody_columns: HashSet<ColumnIndex>,
    /// The earliest slot the peer claims to be able to serve.
    pub earliest_available_slot: Option<Slot>,
}

/// The sync scheduler's handle onto the network service.
pub trait SyncNetworkContext {
    /// Issue the sub-requests of a batch to `peer`. Returns a request id.
    fn send_by_range_requests(
        &mut self,
        peer_id: PeerId,
        requests: DownloadByRangeRequests,
    ) -> Result<u64, String>;

    /// Report a peer for misbehaviour.
    fn report_peer(&mut self, peer_id: PeerId, action: PeerAction, reason: &'static str);

    /// Metadata for a connected peer, if it is still connected.
    fn peer_info(&self, peer_id: &PeerId) -> Option<PeerInfo>;
}

/// The fork/window-dependent shaping of a batch's requests.
///
/// - Pre-deneb, only blocks are requested.
/// - Deneb/electra inside the DA window, blobs accompany blocks.
/// - Fulu inside the DA window, the sampled columns accompany blocks. Column requests to a
///   peer are restricted to that peer's custody columns.
pub fn download_by_range_requests(
    fork_name: types::ForkName,
    start_slot: Slot,
    count: u64,
    epoch: Epoch,
    current_epoch: Epoch,
    spec: &types::ChainSpec,
    sampling_columns: &HashSet<ColumnIndex>,
    peer_custody_columns: Option<&HashSet<ColumnIndex>>,
) -> DownloadByRangeRequests {
    let blocks_request = Some(BlocksByRangeRequest { start_slot, count });

    if !fork_name.deneb_enabled() || is_da_out_of_range(spec, fork_name, epoch, current_epoch) {
        return DownloadByRangeRequests {
            blocks_request,
            ..Default::default()
        };
    }

    if fork_name.fulu_enabled() {
        let mut columns: Vec<ColumnIndex> = match peer_custody_columns {
            // A peer only receives the requested subset it custodies.
            Some(custody) => sampling_columns.intersection(custody).copied().collect(),
            None => sampling_columns.iter().copied().collect(),
        };
        columns.sort_unstable();
        DownloadByRangeRequests {
            blocks_request,
            blobs_request: None,
            columns_request: Some(DataColumnsByRangeRequest {
                start_slot,
                count,
                columns,
            }),
        }
    } else {
        DownloadByRangeRequests {
            blocks_request,
            blobs_request: Some(BlobsByRangeRequest { start_slot, count }),
            columns_request: None,
        }
    }
}

/// Whether data for `epoch` is already outside the retention window at `current_epoch`.
pub fn is_da_out_of_range(
    spec: &types::ChainSpec,
    fork_name: types::ForkName,
    epoch: Epoch,
    current_epoch: Epoch,
) -> bool {
    if !fork_name.deneb_enabled() {
        return true;
    }
    spec.is_epoch_outside_da_window(epoch, current_epoch)
}

#[cfg(test)]
pub mod testing {
    use super::*;
    use std::collections::HashMap;

    /// Records every request and report; tests inspect them.
    #[derive(Default)]
    pub struct TestingSyncNetworkContext {
        pub requests: Vec<(PeerId, DownloadByRangeRequests)>,
        pub reports: Vec<(PeerId, PeerAction, &'static str)>,
        pub peers: HashMap<PeerId, PeerInfo>,
        next_request_id: u64,
    }

    impl SyncNetworkContext for TestingSyncNetworkContext {
        fn send_by_range_requests(
            &mut self,
            peer_id: PeerId,
            requests: DownloadByRangeRequests,
        ) -> Result<u64, String> {
            self.requests.push((peer_id, requests));
            self.next_request_id += 1;
            Ok(self.next_request_id)
        }

        fn report_peer(&mut self, peer_id: PeerId, action: PeerAction, reason: &'static str) {
            self.reports.push((peer_id, action, reason));
        }

        fn peer_info(&self, peer_id: &PeerId) -> Option<PeerInfo> {
            self.peers.get(peer_id).cloned()
        }
    }
}
