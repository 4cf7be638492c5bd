use crate::beacon_fork_choice_store;
use crate::data_availability_checker::AvailabilityCheckError;
use crate::shuffling_cache;
use state_processing::{
    per_block_processing::errors::BlockProcessingError, per_slot_processing::Error as SlotProcessingError,
};
use types::{BeaconStateError, Hash256, Slot};

/// The error returned by top-level `BeaconChain` operations.
#[derive(Debug)]
pub enum BeaconChainError {
    BeaconStateError(BeaconStateError),
    BlockProcessingError(BlockProcessingError),
    SlotProcessingError(SlotProcessingError),
    ForkChoiceError(fork_choice::Error<beacon_fork_choice_store::Error>),
    ForkChoiceStoreError(beacon_fork_choice_store::Error),
    AvailabilityCheckError(AvailabilityCheckError),
    ShufflingCacheError(shuffling_cache::Error),
    StoreError(store::Error),
    EngineError(execution_layer::EngineApiError),
    MissingBeaconBlock(Hash256),
    MissingBeaconState(Slot),
    /// The head was requested before the anchor was set.
    HeadMissingFromForkChoice(Hash256),
    CanonicalHeadLockTimeout,
    UnableToReadSlot,
}

impl From<BeaconStateError> for BeaconChainError {
    fn from(e: BeaconStateError) -> Self {
        BeaconChainError::BeaconStateError(e)
    }
}

impl From<BlockProcessingError> for BeaconChainError {
    fn from(e: BlockProcessingError) -> Self {
        BeaconChainError::BlockProcessingError(e)
    }
}

impl From<SlotProcessingError> for BeaconChainError {
    fn from(e: SlotProcessingError) -> Self {
        BeaconChainError::SlotProcessingError(e)
    }
}

impl From<AvailabilityCheckError> for BeaconChainError {
    fn from(e: AvailabilityCheckError) -> Self {
        BeaconChainError::AvailabilityCheckError(e)
    }
}

impl From<store::Error> for BeaconChainError {
    fn from(e: store::Error) -> Self {
        BeaconChainError::StoreError(e)
    }
}

impl From<fork_choice::Error<beacon_fork_choice_store::Error>> for BeaconChainError {
    fn from(e: fork_choice::Error<beacon_fork_choice_store::Error>) -> Self {
        BeaconChainError::ForkChoiceError(e)
    }
}

impl From<shuffling_cache::Error> for BeaconChainError {
    fn from(e: shuffling_cache::Error) -> Self {
        BeaconChainError::ShufflingCacheError(e)
    }
}
