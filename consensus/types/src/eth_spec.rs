use crate::ChainSpec;
use serde::{Deserialize, Serialize};
use ssz_types::typenum::{
    Unsigned, U1, U1024, U1048576, U1073741824, U1099511627776, U128, U131072, U134217728, U16,
    U16777216, U17, U2, U2048, U256, U262144, U32, U4, U4096, U512, U64, U65536, U8, U8192, U9,
};
use std::fmt::{self, Debug};
use std::str::FromStr;

pub const MAINNET: &str = "mainnet";
pub const MINIMAL: &str = "minimal";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EthSpecId {
    #[serde(rename = "mainnet")]
    Mainnet,
    #[serde(rename = "minimal")]
    Minimal,
}

impl FromStr for EthSpecId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            MAINNET => Ok(EthSpecId::Mainnet),
            MINIMAL => Ok(EthSpecId::Minimal),
            _ => Err(format!("Unknown eth spec: {}", s)),
        }
    }
}

impl fmt::Display for EthSpecId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            EthSpecId::Mainnet => MAINNET,
            EthSpecId::Minimal => MINIMAL,
        };
        write!(f, "{}", s)
    }
}

/// Compile-time "preset" constants: the lengths of every SSZ container in the data model.
///
/// Runtime configuration (fork epochs, quotients, domains) lives on `ChainSpec`; anything that
/// determines an SSZ type's shape lives here so that encodings are structural types per fork.
pub trait EthSpec:
    'static + Default + Sync + Send + Clone + Debug + PartialEq + Eq + std::hash::Hash
{
    /*
     * Misc
     */
    type JustificationBitsLength: Unsigned + Clone + Sync + Send + Debug + PartialEq + Eq;
    type MaxValidatorsPerCommittee: Unsigned + Clone + Sync + Send + Debug + PartialEq + Eq;
    type MaxCommitteesPerSlot: Unsigned + Clone + Sync + Send + Debug + PartialEq + Eq;
    /// Bound on an electra aggregate's bitfield: every committee of a slot concatenated.
    type MaxValidatorsPerCommitteePerSlot: Unsigned + Clone + Sync + Send + Debug + PartialEq + Eq;
    /*
     * Time parameters
     */
    type SlotsPerEpoch: Unsigned + Clone + Sync + Send + Debug + PartialEq + Eq;
    type SlotsPerEth1VotingPeriod: Unsigned + Clone + Sync + Send + Debug + PartialEq + Eq;
    type SlotsPerHistoricalRoot: Unsigned + Clone + Sync + Send + Debug + PartialEq + Eq;
    /*
     * State list lengths
     */
    type EpochsPerHistoricalVector: Unsigned + Clone + Sync + Send + Debug + PartialEq + Eq;
    type EpochsPerSlashingsVector: Unsigned + Clone + Sync + Send + Debug + PartialEq + Eq;
    type HistoricalRootsLimit: Unsigned + Clone + Sync + Send + Debug + PartialEq + Eq;
    type ValidatorRegistryLimit: Unsigned + Clone + Sync + Send + Debug + PartialEq + Eq;
    /*
     * Max operations per block
     */
    type MaxProposerSlashings: Unsigned + Clone + Sync + Send + Debug + PartialEq + Eq;
    type MaxAttesterSlashings: Unsigned + Clone + Sync + Send + Debug + PartialEq + Eq;
    type MaxAttesterSlashingsElectra: Unsigned + Clone + Sync + Send + Debug + PartialEq + Eq;
    type MaxAttestations: Unsigned + Clone + Sync + Send + Debug + PartialEq + Eq;
    type MaxAttestationsElectra: Unsigned + Clone + Sync + Send + Debug + PartialEq + Eq;
    type MaxPendingAttestations: Unsigned + Clone + Sync + Send + Debug + PartialEq + Eq;
    type MaxDeposits: Unsigned + Clone + Sync + Send + Debug + PartialEq + Eq;
    type MaxVoluntaryExits: Unsigned + Clone + Sync + Send + Debug + PartialEq + Eq;
    type MaxBlsToExecutionChanges: Unsigned + Clone + Sync + Send + Debug + PartialEq + Eq;
    /*
     * Sync committees
     */
    type SyncCommitteeSize: Unsigned + Clone + Sync + Send + Debug + PartialEq + Eq;
    type SyncSubcommitteeSize: Unsigned + Clone + Sync + Send + Debug + PartialEq + Eq;
    /*
     * Execution payload
     */
    type MaxBytesPerTransaction: Unsigned + Clone + Sync + Send + Debug + PartialEq + Eq;
    type MaxTransactionsPerPayload: Unsigned + Clone + Sync + Send + Debug + PartialEq + Eq;
    type BytesPerLogsBloom: Unsigned + Clone + Sync + Send + Debug + PartialEq + Eq;
    type MaxExtraDataBytes: Unsigned + Clone + Sync + Send + Debug + PartialEq + Eq;
    type MaxWithdrawalsPerPayload: Unsigned + Clone + Sync + Send + Debug + PartialEq + Eq;
    /*
     * Blobs
     */
    type MaxBlobCommitmentsPerBlock: Unsigned + Clone + Sync + Send + Debug + PartialEq + Eq;
    type FieldElementsPerBlob: Unsigned + Clone + Sync + Send + Debug + PartialEq + Eq;
    type BytesPerFieldElement: Unsigned + Clone + Sync + Send + Debug + PartialEq + Eq;
    type BytesPerBlob: Unsigned + Clone + Sync + Send + Debug + PartialEq + Eq;
    type BytesPerCell: Unsigned + Clone + Sync + Send + Debug + PartialEq + Eq;
    type KzgCommitmentInclusionProofDepth: Unsigned + Clone + Sync + Send + Debug + PartialEq + Eq;
    /*
     * Electra
     */
    type PendingDepositsLimit: Unsigned + Clone + Sync + Send + Debug + PartialEq + Eq;
    type PendingPartialWithdrawalsLimit: Unsigned + Clone + Sync + Send + Debug + PartialEq + Eq;
    type PendingConsolidationsLimit: Unsigned + Clone + Sync + Send + Debug + PartialEq + Eq;
    type MaxDepositRequestsPerPayload: Unsigned + Clone + Sync + Send + Debug + PartialEq + Eq;
    type MaxWithdrawalRequestsPerPayload: Unsigned + Clone + Sync + Send + Debug + PartialEq + Eq;
    type MaxConsolidationRequestsPerPayload: Unsigned + Clone + Sync + Send + Debug + PartialEq + Eq;
    /*
     * Fulu (PeerDAS)
     */
    type NumberOfColumns: Unsigned + Clone + Sync + Send + Debug + PartialEq + Eq;
    /*
     * Gloas (ePBS)
     */
    type PtcSize: Unsigned + Clone + Sync + Send + Debug + PartialEq + Eq;
    type MaxPayloadAttestations: Unsigned + Clone + Sync + Send + Debug + PartialEq + Eq;
    type BuilderPendingPaymentsLimit: Unsigned + Clone + Sync + Send + Debug + PartialEq + Eq;
    type BuilderPendingWithdrawalsLimit: Unsigned + Clone + Sync + Send + Debug + PartialEq + Eq;

    fn default_spec() -> ChainSpec;

    fn spec_name() -> EthSpecId;

    fn genesis_epoch() -> crate::Epoch {
        crate::Epoch::new(0)
    }

    /// Returns the `SLOTS_PER_EPOCH` constant for this specification.
    fn slots_per_epoch() -> u64 {
        Self::SlotsPerEpoch::to_u64()
    }

    /// Returns the number of committees at each slot for the given active validator count.
    ///
    /// `get_committee_count_per_slot` from the consensus spec.
    fn get_committee_count_per_slot(
        active_validator_count: usize,
        spec: &ChainSpec,
    ) -> Result<usize, safe_arith::ArithError> {
        use safe_arith::SafeArith;
        let slots_per_epoch = Self::SlotsPerEpoch::to_usize();

        Ok(std::cmp::max(
            1,
            std::cmp::min(
                spec.max_committees_per_slot,
                active_validator_count
                    .safe_div(slots_per_epoch)?
                    .safe_div(spec.target_committee_size)?,
            ),
        ))
    }

    fn slots_per_historical_root() -> usize {
        Self::SlotsPerHistoricalRoot::to_usize()
    }

    fn epochs_per_historical_vector() -> usize {
        Self::EpochsPerHistoricalVector::to_usize()
    }

    fn slots_per_eth1_voting_period() -> usize {
        Self::SlotsPerEth1VotingPeriod::to_usize()
    }

    fn sync_committee_size() -> usize {
        Self::SyncCommitteeSize::to_usize()
    }

    fn sync_subcommittee_size() -> usize {
        Self::SyncSubcommitteeSize::to_usize()
    }

    fn max_blob_commitments_per_block() -> usize {
        Self::MaxBlobCommitmentsPerBlock::to_usize()
    }

    fn number_of_columns() -> usize {
        Self::NumberOfColumns::to_usize()
    }

    fn bytes_per_blob() -> usize {
        Self::BytesPerBlob::to_usize()
    }

    fn ptc_size() -> usize {
        Self::PtcSize::to_usize()
    }
}

/// Ethereum Foundation specifications.
#[derive(Clone, PartialEq, Eq, Debug, Hash, Default, Serialize, Deserialize)]
pub struct MainnetEthSpec;

impl EthSpec for MainnetEthSpec {
    type JustificationBitsLength = U4;
    type MaxValidatorsPerCommittee = U2048;
    type MaxCommitteesPerSlot = U64;
    type MaxValidatorsPerCommitteePerSlot = U131072;
    type SlotsPerEpoch = U32;
    type SlotsPerEth1VotingPeriod = U2048;
    type SlotsPerHistoricalRoot = U8192;
    type EpochsPerHistoricalVector = U65536;
    type EpochsPerSlashingsVector = U8192;
    type HistoricalRootsLimit = U16777216;
    type ValidatorRegistryLimit = U1099511627776;
    type MaxProposerSlashings = U16;
    type MaxAttesterSlashings = U2;
    type MaxAttesterSlashingsElectra = U1;
    type MaxAttestations = U128;
    type MaxAttestationsElectra = U8;
    type MaxPendingAttestations = U4096; // 128 max attestations * 32 slots per epoch
    type MaxDeposits = U16;
    type MaxVoluntaryExits = U16;
    type MaxBlsToExecutionChanges = U16;
    type SyncCommitteeSize = U512;
    type SyncSubcommitteeSize = U128;
    type MaxBytesPerTransaction = U1073741824;
    type MaxTransactionsPerPayload = U1048576;
    type BytesPerLogsBloom = U256;
    type MaxExtraDataBytes = U32;
    type MaxWithdrawalsPerPayload = U16;
    type MaxBlobCommitmentsPerBlock = U4096;
    type FieldElementsPerBlob = U4096;
    type BytesPerFieldElement = U32;
    type BytesPerBlob = U131072;
    type BytesPerCell = U2048;
    type KzgCommitmentInclusionProofDepth = U17;
    type PendingDepositsLimit = U134217728;
    type PendingPartialWithdrawalsLimit = U134217728;
    type PendingConsolidationsLimit = U262144;
    type MaxDepositRequestsPerPayload = U8192;
    type MaxWithdrawalRequestsPerPayload = U16;
    type MaxConsolidationRequestsPerPayload = U2;
    type NumberOfColumns = U128;
    type PtcSize = U512;
    type MaxPayloadAttestations = U4;
    type BuilderPendingPaymentsLimit = U64;
    type BuilderPendingWithdrawalsLimit = U1048576;

    fn default_spec() -> ChainSpec {
        ChainSpec::mainnet()
    }

    fn spec_name() -> EthSpecId {
        EthSpecId::Mainnet
    }
}

/// Ethereum Foundation minimal spec, as defined in the consensus-specs repo.
#[derive(Clone, PartialEq, Eq, Debug, Hash, Default, Serialize, Deserialize)]
pub struct MinimalEthSpec;

impl EthSpec for MinimalEthSpec {
    type JustificationBitsLength = U4;
    type MaxValidatorsPerCommittee = U2048;
    type MaxCommitteesPerSlot = U4;
    type MaxValidatorsPerCommitteePerSlot = U8192;
    type SlotsPerEpoch = U8;
    type SlotsPerEth1VotingPeriod = U32;
    type SlotsPerHistoricalRoot = U64;
    type EpochsPerHistoricalVector = U64;
    type EpochsPerSlashingsVector = U64;
    type HistoricalRootsLimit = U16777216;
    type ValidatorRegistryLimit = U1099511627776;
    type MaxProposerSlashings = U16;
    type MaxAttesterSlashings = U2;
    type MaxAttesterSlashingsElectra = U1;
    type MaxAttestations = U128;
    type MaxAttestationsElectra = U8;
    type MaxPendingAttestations = U1024; // 128 max attestations * 8 slots per epoch
    type MaxDeposits = U16;
    type MaxVoluntaryExits = U16;
    type MaxBlsToExecutionChanges = U16;
    type SyncCommitteeSize = U32;
    type SyncSubcommitteeSize = U8;
    type MaxBytesPerTransaction = U1073741824;
    type MaxTransactionsPerPayload = U1048576;
    type BytesPerLogsBloom = U256;
    type MaxExtraDataBytes = U32;
    type MaxWithdrawalsPerPayload = U4;
    type MaxBlobCommitmentsPerBlock = U32;
    type FieldElementsPerBlob = U4096;
    type BytesPerFieldElement = U32;
    type BytesPerBlob = U131072;
    type BytesPerCell = U2048;
    type KzgCommitmentInclusionProofDepth = U9;
    type PendingDepositsLimit = U134217728;
    type PendingPartialWithdrawalsLimit = U64;
    type PendingConsolidationsLimit = U64;
    type MaxDepositRequestsPerPayload = U4;
    type MaxWithdrawalRequestsPerPayload = U2;
    type MaxConsolidationRequestsPerPayload = U1;
    type NumberOfColumns = U128;
    type PtcSize = U4;
    type MaxPayloadAttestations = U4;
    type BuilderPendingPaymentsLimit = U16;
    type BuilderPendingWithdrawalsLimit = U1024;

    fn default_spec() -> ChainSpec {
        ChainSpec::minimal()
    }

    fn spec_name() -> EthSpecId {
        EthSpecId::Minimal
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mainnet_sanity_check() {
        assert_eq!(MainnetEthSpec::slots_per_epoch(), 32);
        assert_eq!(MainnetEthSpec::sync_subcommittee_size(), 128);
        assert_eq!(MainnetEthSpec::number_of_columns(), 128);
    }

    #[test]
    fn minimal_sanity_check() {
        assert_eq!(MinimalEthSpec::slots_per_epoch(), 8);
        assert_eq!(MinimalEthSpec::sync_subcommittee_size(), 8);
    }
}
