mod error;
pub mod justified_balances;
mod proto_array;
mod proto_array_fork_choice;
mod ssz_container;

pub use crate::justified_balances::JustifiedBalances;
pub use crate::proto_array::{
    calculate_committee_fraction, InvalidationOperation, Iter, ProposerBoost, ProtoArray,
    ProtoNode,
};
pub use crate::proto_array_fork_choice::{
    AttestationShufflingId, Block, DataAvailabilityStatus, DisallowedReOrgOffsets, DoNotReOrg,
    ExecutionStatus, ProposerHeadError, ProposerHeadInfo, ProtoArrayForkChoice, ReOrgThreshold,
};
pub use error::Error;

pub mod core {
    pub use super::proto_array::{ProposerBoost, ProtoArray, ProtoNode};
    pub use super::proto_array_fork_choice::VoteTracker;
    pub use super::ssz_container::SszContainer;
}
