mod fork_choice;
mod fork_choice_store;

pub use crate::fork_choice::{
    AttestationFromBlock, Error, ForkChoice, ForkChoiceView, ForkchoiceUpdateParameters,
    InvalidAttestation, InvalidBlock, PayloadVerificationStatus, PersistedForkChoice,
    QueuedAttestation, ResetPayloadStatuses,
};
pub use fork_choice_store::ForkChoiceStore;
pub use proto_array::{
    Block as ProtoBlock, DataAvailabilityStatus, DisallowedReOrgOffsets, ExecutionStatus,
    InvalidationOperation,
};
