use crate::{Epoch, EthSpec, Fork, ForkName, Hash256, Slot};
use ethereum_hashing::hash;
use fixed_bytes::FixedBytesExtended;
use int_to_bytes::int_to_bytes4;
use serde::{Deserialize, Serialize};
use tree_hash::TreeHash;
use tree_hash_derive::TreeHash;

/// Each of the BLS signature domains.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub enum Domain {
    BeaconProposer,
    BeaconAttester,
    Randao,
    Deposit,
    VoluntaryExit,
    SelectionProof,
    AggregateAndProof,
    SyncCommittee,
    ContributionAndProof,
    SyncCommitteeSelectionProof,
    BlsToExecutionChange,
    PtcAttester,
}

/// A blob-schedule entry: a "Blob Parameters Only" fork changing the blob limit at an epoch
/// without a new fork version.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize, Deserialize)]
pub struct BlobParameters {
    pub epoch: Epoch,
    #[serde(with = "serde_utils::quoted_u64")]
    pub max_blobs_per_block: u64,
}

/// Holds all the "constants" for a BeaconChain: the runtime configuration as opposed to the
/// compile-time `EthSpec` presets.
#[derive(PartialEq, Debug, Clone)]
pub struct ChainSpec {
    /*
     * Config name
     */
    pub config_name: Option<String>,

    /*
     * Constants
     */
    pub genesis_slot: Slot,
    pub far_future_epoch: Epoch,
    pub base_rewards_per_epoch: u64,
    pub deposit_contract_tree_depth: u64,

    /*
     * Misc
     */
    pub max_committees_per_slot: usize,
    pub target_committee_size: usize,
    pub min_per_epoch_churn_limit: u64,
    pub max_per_epoch_activation_churn_limit: u64,
    pub churn_limit_quotient: u64,
    pub shuffle_round_count: u8,
    pub min_genesis_active_validator_count: u64,
    pub hysteresis_quotient: u64,
    pub hysteresis_downward_multiplier: u64,
    pub hysteresis_upward_multiplier: u64,

    /*
     * Gwei values
     */
    pub min_deposit_amount: u64,
    pub max_effective_balance: u64,
    pub min_activation_balance: u64,
    pub max_effective_balance_electra: u64,
    pub ejection_balance: u64,
    pub effective_balance_increment: u64,

    /*
     * Initial values
     */
    pub genesis_fork_version: [u8; 4],
    pub bls_withdrawal_prefix_byte: u8,
    pub eth1_address_withdrawal_prefix_byte: u8,
    pub compounding_withdrawal_prefix_byte: u8,

    /*
     * Time parameters
     */
    pub seconds_per_slot: u64,
    pub slots_per_epoch: u64,
    pub min_attestation_inclusion_delay: u64,
    pub min_seed_lookahead: Epoch,
    pub max_seed_lookahead: Epoch,
    pub min_epochs_to_inactivity_penalty: u64,
    pub min_validator_withdrawability_delay: Epoch,
    pub shard_committee_period: u64,
    pub intervals_per_slot: u64,

    /*
     * Reward and penalty quotients
     */
    pub base_reward_factor: u64,
    pub whistleblower_reward_quotient: u64,
    pub proposer_reward_quotient: u64,
    pub inactivity_penalty_quotient: u64,
    pub min_slashing_penalty_quotient: u64,
    pub proportional_slashing_multiplier: u64,

    /*
     * Fork choice
     */
    pub proposer_score_boost: u64,
    pub safe_slots_to_update_justified: u64,

    /*
     * Altair hard fork params
     */
    pub inactivity_penalty_quotient_altair: u64,
    pub min_slashing_penalty_quotient_altair: u64,
    pub proportional_slashing_multiplier_altair: u64,
    pub inactivity_score_bias: u64,
    pub inactivity_score_recovery_rate: u64,
    pub epochs_per_sync_committee_period: Epoch,
    pub altair_fork_version: [u8; 4],
    pub altair_fork_epoch: Option<Epoch>,

    /*
     * Bellatrix hard fork params
     */
    pub inactivity_penalty_quotient_bellatrix: u64,
    pub min_slashing_penalty_quotient_bellatrix: u64,
    pub proportional_slashing_multiplier_bellatrix: u64,
    pub bellatrix_fork_version: [u8; 4],
    pub bellatrix_fork_epoch: Option<Epoch>,
    pub terminal_total_difficulty: fixed_bytes::Uint256,

    /*
     * Capella hard fork params
     */
    pub capella_fork_version: [u8; 4],
    pub capella_fork_epoch: Option<Epoch>,
    pub max_validators_per_withdrawals_sweep: u64,

    /*
     * Deneb hard fork params
     */
    pub deneb_fork_version: [u8; 4],
    pub deneb_fork_epoch: Option<Epoch>,
    pub max_blobs_per_block: u64,
    pub min_epochs_for_blob_sidecars_requests: u64,

    /*
     * Electra hard fork params
     */
    pub electra_fork_version: [u8; 4],
    pub electra_fork_epoch: Option<Epoch>,
    pub min_per_epoch_churn_limit_electra: u64,
    pub max_per_epoch_activation_exit_churn_limit: u64,
    pub min_slashing_penalty_quotient_electra: u64,
    pub whistleblower_reward_quotient_electra: u64,
    pub max_pending_partials_per_withdrawals_sweep: u64,
    pub max_pending_deposits_per_epoch: u64,
    pub full_exit_request_amount: u64,
    pub unset_deposit_requests_start_index: u64,

    /*
     * Fulu hard fork params
     */
    pub fulu_fork_version: [u8; 4],
    pub fulu_fork_epoch: Option<Epoch>,
    pub number_of_custody_groups: u64,
    pub custody_requirement: u64,
    pub samples_per_slot: u64,
    pub min_epochs_for_data_column_sidecars_requests: u64,
    pub blob_schedule: Vec<BlobParameters>,

    /*
     * Gloas hard fork params
     */
    pub gloas_fork_version: [u8; 4],
    pub gloas_fork_epoch: Option<Epoch>,
    pub builder_payment_threshold_numerator: u64,
    pub builder_payment_threshold_denominator: u64,

    /*
     * Networking
     */
    pub maximum_gossip_clock_disparity_millis: u64,
    pub attestation_propagation_slot_range: u64,

    /*
     * Domains
     */
    domain_beacon_proposer: u32,
    domain_beacon_attester: u32,
    domain_randao: u32,
    domain_deposit: u32,
    domain_voluntary_exit: u32,
    domain_selection_proof: u32,
    domain_aggregate_and_proof: u32,
    domain_sync_committee: u32,
    domain_contribution_and_proof: u32,
    domain_sync_committee_selection_proof: u32,
    domain_bls_to_execution_change: u32,
    domain_ptc_attester: u32,
}

impl ChainSpec {
    /// Returns the name of the fork which is active at `epoch`.
    pub fn fork_name_at_epoch(&self, epoch: Epoch) -> ForkName {
        let scheduled = |fork_epoch: Option<Epoch>| fork_epoch.is_some_and(|fe| epoch >= fe);

        if scheduled(self.gloas_fork_epoch) {
            ForkName::Gloas
        } else if scheduled(self.fulu_fork_epoch) {
            ForkName::Fulu
        } else if scheduled(self.electra_fork_epoch) {
            ForkName::Electra
        } else if scheduled(self.deneb_fork_epoch) {
            ForkName::Deneb
        } else if scheduled(self.capella_fork_epoch) {
            ForkName::Capella
        } else if scheduled(self.bellatrix_fork_epoch) {
            ForkName::Bellatrix
        } else if scheduled(self.altair_fork_epoch) {
            ForkName::Altair
        } else {
            ForkName::Base
        }
    }

    pub fn fork_name_at_slot<E: EthSpec>(&self, slot: Slot) -> ForkName {
        self.fork_name_at_epoch(slot.epoch(E::slots_per_epoch()))
    }

    /// Returns the fork version of the given `fork_name`.
    pub fn fork_version_for_name(&self, fork_name: ForkName) -> [u8; 4] {
        match fork_name {
            ForkName::Base => self.genesis_fork_version,
            ForkName::Altair => self.altair_fork_version,
            ForkName::Bellatrix => self.bellatrix_fork_version,
            ForkName::Capella => self.capella_fork_version,
            ForkName::Deneb => self.deneb_fork_version,
            ForkName::Electra => self.electra_fork_version,
            ForkName::Fulu => self.fulu_fork_version,
            ForkName::Gloas => self.gloas_fork_version,
        }
    }

    /// Returns the `Fork` value (previous/current version pair) as of `epoch`.
    pub fn fork_at_epoch(&self, epoch: Epoch) -> Fork {
        let current_fork_name = self.fork_name_at_epoch(epoch);
        let previous_fork_name = current_fork_name.previous_fork().unwrap_or(current_fork_name);
        let epoch = current_fork_name
            .activation_epoch(self)
            .unwrap_or_else(|| Epoch::new(0));

        Fork {
            previous_version: self.fork_version_for_name(previous_fork_name),
            current_version: self.fork_version_for_name(current_fork_name),
            epoch,
        }
    }

    /// The maximum number of blobs per block at `epoch`, honoring the BPO blob schedule.
    pub fn max_blobs_per_block_at_epoch(&self, epoch: Epoch) -> u64 {
        self.blob_schedule
            .iter()
            .filter(|params| params.epoch <= epoch)
            .max_by_key(|params| params.epoch)
            .map(|params| params.max_blobs_per_block)
            .unwrap_or(self.max_blobs_per_block)
    }

    /// The minimum slashing penalty quotient for the fork governing `fork_name`.
    pub fn min_slashing_penalty_quotient_for_fork(&self, fork_name: ForkName) -> u64 {
        if fork_name.electra_enabled() {
            self.min_slashing_penalty_quotient_electra
        } else if fork_name.bellatrix_enabled() {
            self.min_slashing_penalty_quotient_bellatrix
        } else if fork_name.altair_enabled() {
            self.min_slashing_penalty_quotient_altair
        } else {
            self.min_slashing_penalty_quotient
        }
    }

    pub fn proportional_slashing_multiplier_for_fork(&self, fork_name: ForkName) -> u64 {
        if fork_name.bellatrix_enabled() {
            self.proportional_slashing_multiplier_bellatrix
        } else if fork_name.altair_enabled() {
            self.proportional_slashing_multiplier_altair
        } else {
            self.proportional_slashing_multiplier
        }
    }

    pub fn inactivity_penalty_quotient_for_fork(&self, fork_name: ForkName) -> u64 {
        if fork_name.bellatrix_enabled() {
            self.inactivity_penalty_quotient_bellatrix
        } else if fork_name.altair_enabled() {
            self.inactivity_penalty_quotient_altair
        } else {
            self.inactivity_penalty_quotient
        }
    }

    pub fn whistleblower_reward_quotient_for_fork(&self, fork_name: ForkName) -> u64 {
        if fork_name.electra_enabled() {
            self.whistleblower_reward_quotient_electra
        } else {
            self.whistleblower_reward_quotient
        }
    }

    pub fn max_effective_balance_for_fork(&self, fork_name: ForkName) -> u64 {
        if fork_name.electra_enabled() {
            self.max_effective_balance_electra
        } else {
            self.max_effective_balance
        }
    }

    /// Returns `true` if data for a block at `block_epoch` is outside the data-availability
    /// window as seen from `current_epoch`.
    pub fn is_epoch_outside_da_window(&self, block_epoch: Epoch, current_epoch: Epoch) -> bool {
        block_epoch + self.min_epochs_for_blob_sidecars_requests < current_epoch
    }

    pub fn get_domain_constant(&self, domain: Domain) -> u32 {
        match domain {
            Domain::BeaconProposer => self.domain_beacon_proposer,
            Domain::BeaconAttester => self.domain_beacon_attester,
            Domain::Randao => self.domain_randao,
            Domain::Deposit => self.domain_deposit,
            Domain::VoluntaryExit => self.domain_voluntary_exit,
            Domain::SelectionProof => self.domain_selection_proof,
            Domain::AggregateAndProof => self.domain_aggregate_and_proof,
            Domain::SyncCommittee => self.domain_sync_committee,
            Domain::ContributionAndProof => self.domain_contribution_and_proof,
            Domain::SyncCommitteeSelectionProof => self.domain_sync_committee_selection_proof,
            Domain::BlsToExecutionChange => self.domain_bls_to_execution_change,
            Domain::PtcAttester => self.domain_ptc_attester,
        }
    }

    /// Get the domain number, unmodified by the fork.
    ///
    /// Spec v0.12.1
    pub fn get_domain(
        &self,
        epoch: Epoch,
        domain: Domain,
        fork: &Fork,
        genesis_validators_root: Hash256,
    ) -> Hash256 {
        let fork_version = fork.get_fork_version(epoch);
        self.compute_domain(domain, fork_version, genesis_validators_root)
    }

    /// Get the domain for a deposit signature.
    ///
    /// Deposits are valid across forks, thus the deposit domain is computed
    /// with the genesis fork version.
    pub fn get_deposit_domain(&self) -> Hash256 {
        self.compute_domain(Domain::Deposit, self.genesis_fork_version, Hash256::zero())
    }

    /// Compute a domain by applying the given `fork_version`.
    pub fn compute_domain(
        &self,
        domain: Domain,
        fork_version: [u8; 4],
        genesis_validators_root: Hash256,
    ) -> Hash256 {
        let domain_constant = self.get_domain_constant(domain);

        let mut domain = [0; 32];
        domain[0..4].copy_from_slice(&int_to_bytes4(domain_constant));
        domain[4..].copy_from_slice(
            compute_fork_data_root(fork_version, genesis_validators_root)
                .as_slice()
                .get(..28)
                .expect("fork has is 32 bytes so first 28 bytes should exist"),
        );

        Hash256::from(domain)
    }

    /// Compute the 4-byte fork digest for gossip topics and the `Status` handshake.
    ///
    /// For epochs with a scheduled BPO fork the digest additionally commits to the active
    /// blob parameters, so nodes on different blob schedules never share gossip meshes.
    pub fn compute_fork_digest(&self, epoch: Epoch, genesis_validators_root: Hash256) -> [u8; 4] {
        let fork_name = self.fork_name_at_epoch(epoch);
        let fork_version = self.fork_version_for_name(fork_name);
        let base_root = compute_fork_data_root(fork_version, genesis_validators_root);

        let mut digest = [0; 4];
        digest.copy_from_slice(
            base_root
                .as_slice()
                .get(..4)
                .expect("fork data root is 32 bytes"),
        );

        if fork_name.fulu_enabled() {
            let active = self
                .blob_schedule
                .iter()
                .filter(|params| params.epoch <= epoch)
                .max_by_key(|params| params.epoch);
            if let Some(params) = active {
                let mut bytes = Vec::with_capacity(16);
                bytes.extend_from_slice(&params.epoch.as_u64().to_le_bytes());
                bytes.extend_from_slice(&params.max_blobs_per_block.to_le_bytes());
                let params_hash = hash(&bytes);
                for (digest_byte, hash_byte) in digest.iter_mut().zip(params_hash.iter()) {
                    *digest_byte ^= hash_byte;
                }
            }
        }

        digest
    }

    /// Returns a `ChainSpec` compatible with the Ethereum Foundation mainnet specification.
    pub fn mainnet() -> Self {
        Self {
            config_name: Some("mainnet".to_string()),

            /*
             * Constants
             */
            genesis_slot: Slot::new(0),
            far_future_epoch: Epoch::new(u64::MAX),
            base_rewards_per_epoch: 4,
            deposit_contract_tree_depth: 32,

            /*
             * Misc
             */
            max_committees_per_slot: 64,
            target_committee_size: 128,
            min_per_epoch_churn_limit: 4,
            max_per_epoch_activation_churn_limit: 8,
            churn_limit_quotient: 65_536,
            shuffle_round_count: 90,
            min_genesis_active_validator_count: 16_384,
            hysteresis_quotient: 4,
            hysteresis_downward_multiplier: 1,
            hysteresis_upward_multiplier: 5,

            /*
             * Gwei values
             */
            min_deposit_amount: u64::pow(2, 0).saturating_mul(u64::pow(10, 9)),
            max_effective_balance: u64::pow(2, 5).saturating_mul(u64::pow(10, 9)),
            min_activation_balance: u64::pow(2, 5).saturating_mul(u64::pow(10, 9)),
            max_effective_balance_electra: u64::pow(2, 11).saturating_mul(u64::pow(10, 9)),
            ejection_balance: u64::pow(2, 4).saturating_mul(u64::pow(10, 9)),
            effective_balance_increment: u64::pow(2, 0).saturating_mul(u64::pow(10, 9)),

            /*
             * Initial values
             */
            genesis_fork_version: [0; 4],
            bls_withdrawal_prefix_byte: 0x00,
            eth1_address_withdrawal_prefix_byte: 0x01,
            compounding_withdrawal_prefix_byte: 0x02,

            /*
             * Time parameters
             */
            seconds_per_slot: 12,
            slots_per_epoch: 32,
            min_attestation_inclusion_delay: 1,
            min_seed_lookahead: Epoch::new(1),
            max_seed_lookahead: Epoch::new(4),
            min_epochs_to_inactivity_penalty: 4,
            min_validator_withdrawability_delay: Epoch::new(256),
            shard_committee_period: 256,
            intervals_per_slot: 3,

            /*
             * Reward and penalty quotients
             */
            base_reward_factor: 64,
            whistleblower_reward_quotient: 512,
            proposer_reward_quotient: 8,
            inactivity_penalty_quotient: u64::pow(2, 26),
            min_slashing_penalty_quotient: 128,
            proportional_slashing_multiplier: 1,

            /*
             * Fork choice
             */
            proposer_score_boost: 40,
            safe_slots_to_update_justified: 8,

            /*
             * Altair
             */
            inactivity_penalty_quotient_altair: u64::pow(2, 24).saturating_mul(3),
            min_slashing_penalty_quotient_altair: 64,
            proportional_slashing_multiplier_altair: 2,
            inactivity_score_bias: 4,
            inactivity_score_recovery_rate: 16,
            epochs_per_sync_committee_period: Epoch::new(256),
            altair_fork_version: [0x01, 0x00, 0x00, 0x00],
            altair_fork_epoch: Some(Epoch::new(74240)),

            /*
             * Bellatrix
             */
            inactivity_penalty_quotient_bellatrix: u64::pow(2, 24),
            min_slashing_penalty_quotient_bellatrix: 32,
            proportional_slashing_multiplier_bellatrix: 3,
            bellatrix_fork_version: [0x02, 0x00, 0x00, 0x00],
            bellatrix_fork_epoch: Some(Epoch::new(144896)),
            terminal_total_difficulty: fixed_bytes::Uint256::from_str_radix(
                "58750000000000000000000",
                10,
            )
            .expect("terminal_total_difficulty is a valid base-10 integer"),

            /*
             * Capella
             */
            capella_fork_version: [0x03, 0x00, 0x00, 0x00],
            capella_fork_epoch: Some(Epoch::new(194048)),
            max_validators_per_withdrawals_sweep: 16384,

            /*
             * Deneb
             */
            deneb_fork_version: [0x04, 0x00, 0x00, 0x00],
            deneb_fork_epoch: Some(Epoch::new(269568)),
            max_blobs_per_block: 6,
            min_epochs_for_blob_sidecars_requests: 4096,

            /*
             * Electra
             */
            electra_fork_version: [0x05, 0x00, 0x00, 0x00],
            electra_fork_epoch: Some(Epoch::new(364032)),
            min_per_epoch_churn_limit_electra: 128_000_000_000,
            max_per_epoch_activation_exit_churn_limit: 256_000_000_000,
            min_slashing_penalty_quotient_electra: 4096,
            whistleblower_reward_quotient_electra: 4096,
            max_pending_partials_per_withdrawals_sweep: 8,
            max_pending_deposits_per_epoch: 16,
            full_exit_request_amount: 0,
            unset_deposit_requests_start_index: u64::MAX,

            /*
             * Fulu
             */
            fulu_fork_version: [0x06, 0x00, 0x00, 0x00],
            fulu_fork_epoch: None,
            number_of_custody_groups: 128,
            custody_requirement: 4,
            samples_per_slot: 8,
            min_epochs_for_data_column_sidecars_requests: 4096,
            blob_schedule: vec![],

            /*
             * Gloas
             */
            gloas_fork_version: [0x07, 0x00, 0x00, 0x00],
            gloas_fork_epoch: None,
            builder_payment_threshold_numerator: 6,
            builder_payment_threshold_denominator: 10,

            /*
             * Networking
             */
            maximum_gossip_clock_disparity_millis: 500,
            attestation_propagation_slot_range: 32,

            /*
             * Domains
             */
            domain_beacon_proposer: 0,
            domain_beacon_attester: 1,
            domain_randao: 2,
            domain_deposit: 3,
            domain_voluntary_exit: 4,
            domain_selection_proof: 5,
            domain_aggregate_and_proof: 6,
            domain_sync_committee: 7,
            domain_sync_committee_selection_proof: 8,
            domain_contribution_and_proof: 9,
            domain_bls_to_execution_change: 10,
            domain_ptc_attester: 12,
        }
    }

    /// Ethereum Foundation minimal spec, for testing.
    pub fn minimal() -> Self {
        // Create a mainnet spec and then change the fields that differ.
        Self {
            config_name: Some("minimal".to_string()),
            max_committees_per_slot: 4,
            target_committee_size: 4,
            shuffle_round_count: 10,
            min_genesis_active_validator_count: 64,
            slots_per_epoch: 8,
            churn_limit_quotient: 32,
            min_validator_withdrawability_delay: Epoch::new(256),
            shard_committee_period: 64,
            epochs_per_sync_committee_period: Epoch::new(8),
            max_validators_per_withdrawals_sweep: 16,
            altair_fork_version: [0x01, 0x00, 0x00, 0x01],
            altair_fork_epoch: None,
            bellatrix_fork_version: [0x02, 0x00, 0x00, 0x01],
            bellatrix_fork_epoch: None,
            capella_fork_version: [0x03, 0x00, 0x00, 0x01],
            capella_fork_epoch: None,
            deneb_fork_version: [0x04, 0x00, 0x00, 0x01],
            deneb_fork_epoch: None,
            electra_fork_version: [0x05, 0x00, 0x00, 0x01],
            electra_fork_epoch: None,
            fulu_fork_version: [0x06, 0x00, 0x00, 0x01],
            fulu_fork_epoch: None,
            gloas_fork_version: [0x07, 0x00, 0x00, 0x01],
            gloas_fork_epoch: None,
            min_epochs_for_blob_sidecars_requests: 272,
            min_epochs_for_data_column_sidecars_requests: 272,
            ..ChainSpec::mainnet()
        }
    }

    /// All forks scheduled at genesis; the usual base for unit tests that need a modern fork.
    pub fn all_forks_at_genesis() -> Self {
        Self {
            altair_fork_epoch: Some(Epoch::new(0)),
            bellatrix_fork_epoch: Some(Epoch::new(0)),
            capella_fork_epoch: Some(Epoch::new(0)),
            deneb_fork_epoch: Some(Epoch::new(0)),
            electra_fork_epoch: Some(Epoch::new(0)),
            fulu_fork_epoch: Some(Epoch::new(0)),
            gloas_fork_epoch: None,
            ..ChainSpec::minimal()
        }
    }
}

impl Default for ChainSpec {
    fn default() -> Self {
        Self::mainnet()
    }
}

/// The `ForkData` object, hashed to derive domains and digests.
#[derive(Debug, PartialEq, Clone, TreeHash)]
struct ForkData {
    current_version: [u8; 4],
    genesis_validators_root: Hash256,
}

/// `compute_fork_data_root` from the consensus spec.
pub fn compute_fork_data_root(
    current_version: [u8; 4],
    genesis_validators_root: Hash256,
) -> Hash256 {
    ForkData {
        current_version,
        genesis_validators_root,
    }
    .tree_hash_root()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mainnet_fork_schedule_ordering() {
        let spec = ChainSpec::mainnet();
        assert_eq!(spec.fork_name_at_epoch(Epoch::new(0)), ForkName::Base);
        assert_eq!(spec.fork_name_at_epoch(Epoch::new(74240)), ForkName::Altair);
        assert_eq!(
            spec.fork_name_at_epoch(Epoch::new(364032)),
            ForkName::Electra
        );
    }

    #[test]
    fn blob_schedule_lookup() {
        let mut spec = ChainSpec::mainnet();
        assert_eq!(spec.max_blobs_per_block_at_epoch(Epoch::new(10)), 6);

        spec.blob_schedule = vec![
            BlobParameters {
                epoch: Epoch::new(100),
                max_blobs_per_block: 12,
            },
            BlobParameters {
                epoch: Epoch::new(200),
                max_blobs_per_block: 24,
            },
        ];
        assert_eq!(spec.max_blobs_per_block_at_epoch(Epoch::new(10)), 6);
        assert_eq!(spec.max_blobs_per_block_at_epoch(Epoch::new(150)), 12);
        assert_eq!(spec.max_blobs_per_block_at_epoch(Epoch::new(200)), 24);
    }

    #[test]
    fn domains_are_distinct() {
        let spec = ChainSpec::mainnet();
        let fork = spec.fork_at_epoch(Epoch::new(0));
        let gvr = Hash256::zero();
        let d1 = spec.get_domain(Epoch::new(0), Domain::BeaconProposer, &fork, gvr);
        let d2 = spec.get_domain(Epoch::new(0), Domain::BeaconAttester, &fork, gvr);
        assert_ne!(d1, d2);
    }

    #[test]
    fn bpo_fork_changes_digest() {
        let mut spec = ChainSpec::mainnet();
        spec.fulu_fork_epoch = Some(Epoch::new(1000));
        let gvr = Hash256::zero();

        let digest_plain = spec.compute_fork_digest(Epoch::new(1000), gvr);

        spec.blob_schedule = vec![BlobParameters {
            epoch: Epoch::new(1000),
            max_blobs_per_block: 12,
        }];
        let digest_bpo = spec.compute_fork_digest(Epoch::new(1000), gvr);

        assert_ne!(digest_plain, digest_bpo);
    }
}
