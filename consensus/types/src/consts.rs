pub mod altair {
    pub const TIMELY_SOURCE_FLAG_INDEX: usize = 0;
    pub const TIMELY_TARGET_FLAG_INDEX: usize = 1;
    pub const TIMELY_HEAD_FLAG_INDEX: usize = 2;
    pub const TIMELY_SOURCE_WEIGHT: u64 = 14;
    pub const TIMELY_TARGET_WEIGHT: u64 = 26;
    pub const TIMELY_HEAD_WEIGHT: u64 = 14;
    pub const SYNC_REWARD_WEIGHT: u64 = 2;
    pub const PROPOSER_WEIGHT: u64 = 8;
    pub const WEIGHT_DENOMINATOR: u64 = 64;
    pub const SYNC_COMMITTEE_SUBNET_COUNT: u64 = 4;

    pub const PARTICIPATION_FLAG_WEIGHTS: [u64; NUM_FLAG_INDICES] = [
        TIMELY_SOURCE_WEIGHT,
        TIMELY_TARGET_WEIGHT,
        TIMELY_HEAD_WEIGHT,
    ];

    pub const NUM_FLAG_INDICES: usize = 3;
}

pub mod deneb {
    /// The gindex of the `blob_kzg_commitments` list itself in the block body.
    pub const BLOB_KZG_COMMITMENTS_GINDEX: u64 = 27;

    /// The gindex of the first KZG commitment leaf under the beacon block body root: descend
    /// from the list gindex through the length mix-in and the 4096-element data subtree.
    pub const KZG_COMMITMENT_GINDEX0: u64 = BLOB_KZG_COMMITMENTS_GINDEX * 2 * 4096;

    /// The gindex of the `blob_kzg_commitments` list, proven once per column sidecar.
    pub const KZG_COMMITMENTS_INCLUSION_PROOF_DEPTH: usize = 4;
}

pub mod gloas {
    /// Payload-timeliness-committee size, in validators.
    pub const PTC_SIZE: u64 = 512;
}
