use safe_arith::SafeArith;
use types::consts::altair::WEIGHT_DENOMINATOR;
use types::{BeaconState, BeaconStateError as Error, ChainSpec, EthSpec};

/// This type exists to avoid confusing `total_active_balance` with `base_reward_per_increment`,
/// since they are used in close proximity and the same type (`u64`).
#[derive(Debug, PartialEq, Clone, Copy)]
pub struct BaseRewardPerIncrement(u64);

impl BaseRewardPerIncrement {
    pub fn new(total_active_balance: u64, spec: &ChainSpec) -> Result<Self, Error> {
        get_base_reward_per_increment(total_active_balance, spec).map(Self)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

/// Returns the base reward for some validator.
///
/// The function has a different interface to the spec since it accepts the
/// `base_reward_per_increment` without computing it each call. Avoiding the re-computation has
/// shown to be a significant optimisation.
pub fn get_base_reward<E: EthSpec>(
    state: &BeaconState<E>,
    index: usize,
    base_reward_per_increment: BaseRewardPerIncrement,
    spec: &ChainSpec,
) -> Result<u64, Error> {
    state
        .get_effective_balance(index)?
        .safe_div(spec.effective_balance_increment)?
        .safe_mul(base_reward_per_increment.as_u64())
        .map_err(Into::into)
}

/// Returns the base reward for a single effective-balance increment.
fn get_base_reward_per_increment(
    total_active_balance: u64,
    spec: &ChainSpec,
) -> Result<u64, Error> {
    use integer_sqrt::IntegerSquareRoot;
    spec.effective_balance_increment
        .safe_mul(spec.base_reward_factor)?
        .safe_div(total_active_balance.integer_sqrt())
        .map_err(Into::into)
}

/// Returns the weight for some participation flag index.
pub fn get_flag_weight(flag_index: usize) -> Result<u64, Error> {
    types::consts::altair::PARTICIPATION_FLAG_WEIGHTS
        .get(flag_index)
        .copied()
        .ok_or(Error::ParticipationOutOfBounds(flag_index))
}

/// The denominator shared by every flag weight.
pub fn weight_denominator() -> u64 {
    WEIGHT_DENOMINATOR
}
