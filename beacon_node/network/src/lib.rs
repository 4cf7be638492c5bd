//! The syncing side of the networking stack: the range-sync scheduler that backfills
//! historical segments from peers, batch by batch. The libp2p transport itself is an external
//! collaborator, consumed through the `SyncNetworkContext` trait.

pub mod sync;

pub use sync::batch::{
    BatchError, BatchInfo, BatchState, MAX_BATCH_DOWNLOAD_ATTEMPTS,
    MAX_BATCH_EXECUTION_ENGINE_ERROR_ATTEMPTS, MAX_BATCH_PROCESSING_ATTEMPTS,
};
pub use sync::block_input::BlockInput;
pub use sync::network_context::{
    DownloadByRangeRequests, PeerAction, PeerId, SyncNetworkContext,
};
pub use sync::range_sync::SyncingChain;
