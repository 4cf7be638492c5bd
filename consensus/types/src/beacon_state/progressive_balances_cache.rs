use self::balance::Balance;
use crate::{BeaconState, BeaconStateError, ChainSpec, Epoch, EthSpec};
use safe_arith::SafeArith;
use serde::{Deserialize, Serialize};

/// A balance which will never be below the specified `minimum`.
///
/// This is an effort to ensure the `EFFECTIVE_BALANCE_INCREMENT` minimum is always respected.
pub mod balance {
    use safe_arith::{ArithError, SafeArith};
    use serde::{Deserialize, Serialize};

    #[derive(PartialEq, Debug, Clone, Copy, Serialize, Deserialize)]
    pub struct Balance {
        raw: u64,
        minimum: u64,
    }

    impl Balance {
        /// Initialize the balance to `0`, or the given `minimum`.
        pub fn zero(minimum: u64) -> Self {
            Self { raw: 0, minimum }
        }

        /// Returns the balance with respect to the initialization `minimum`.
        pub fn get(&self) -> u64 {
            std::cmp::max(self.raw, self.minimum)
        }

        /// Add-assign to the balance.
        pub fn safe_add_assign(&mut self, other: u64) -> Result<(), ArithError> {
            self.raw.safe_add_assign(other)
        }

        /// Sub-assign to the balance.
        pub fn safe_sub_assign(&mut self, other: u64) -> Result<(), ArithError> {
            self.raw.safe_sub_assign(other)
        }
    }
}

/// Caches the participation values for one epoch (either the previous or current).
#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
struct EpochTotalBalances {
    /// Stores the sum of the balances for all validators in `self.unslashed_participating_indices`
    /// for all flags in `NUM_FLAG_INDICES`.
    ///
    /// A flag balance is only incremented if a validator is in that flag set.
    total_flag_balances: [Balance; crate::consts::altair::NUM_FLAG_INDICES],
}

impl EpochTotalBalances {
    pub fn new(spec: &ChainSpec) -> Self {
        let zero_balance = Balance::zero(spec.effective_balance_increment);

        Self {
            total_flag_balances: [zero_balance; crate::consts::altair::NUM_FLAG_INDICES],
        }
    }

    /// Returns the total balance of attesters who have `flag_index` set.
    fn total_flag_balance(&self, flag_index: usize) -> Result<u64, BeaconStateError> {
        self.total_flag_balances
            .get(flag_index)
            .map(Balance::get)
            .ok_or(BeaconStateError::ParticipationOutOfBounds(flag_index))
    }

    fn on_new_attestation(
        &mut self,
        is_slashed: bool,
        flag_index: usize,
        validator_effective_balance: u64,
    ) -> Result<(), BeaconStateError> {
        if is_slashed {
            return Ok(());
        }
        let balance = self
            .total_flag_balances
            .get_mut(flag_index)
            .ok_or(BeaconStateError::ParticipationOutOfBounds(flag_index))?;
        balance.safe_add_assign(validator_effective_balance)?;
        Ok(())
    }

    fn on_slashing(
        &mut self,
        participation_flags: crate::ParticipationFlags,
        validator_effective_balance: u64,
    ) -> Result<(), BeaconStateError> {
        for flag_index in 0..crate::consts::altair::NUM_FLAG_INDICES {
            if participation_flags.has_flag(flag_index)? {
                self.total_flag_balances
                    .get_mut(flag_index)
                    .ok_or(BeaconStateError::ParticipationOutOfBounds(flag_index))?
                    .safe_sub_assign(validator_effective_balance)?;
            }
        }
        Ok(())
    }
}

/// Caches the participation balances for the previous and current epochs, and updates them
/// incrementally as attestations are processed. This keeps the progressive target-stake counters
/// of justification tracking O(1) per attestation instead of O(n) per epoch.
#[derive(PartialEq, Debug, Default, Clone, Serialize, Deserialize)]
pub struct ProgressiveBalancesCache {
    inner: Option<Inner>,
}

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
struct Inner {
    pub current_epoch: Epoch,
    pub previous_epoch_cache: EpochTotalBalances,
    pub current_epoch_cache: EpochTotalBalances,
}

impl ProgressiveBalancesCache {
    pub fn initialize(
        &mut self,
        current_epoch: Epoch,
        previous_epoch_cache: EpochTotalBalancesSeed,
        current_epoch_cache: EpochTotalBalancesSeed,
    ) {
        self.inner = Some(Inner {
            current_epoch,
            previous_epoch_cache: previous_epoch_cache.0,
            current_epoch_cache: current_epoch_cache.0,
        });
    }

    pub fn is_initialized(&self) -> bool {
        self.inner.is_some()
    }

    pub fn is_initialized_at(&self, epoch: Epoch) -> bool {
        self.inner
            .as_ref()
            .is_some_and(|inner| inner.current_epoch == epoch)
    }

    /// When a new target attestation has been processed, we update the cached
    /// `current_epoch_target_attesting_balance` to include the validator effective balance.
    /// If the epoch is neither the current epoch nor the previous epoch, an error is returned.
    pub fn on_new_attestation(
        &mut self,
        epoch: Epoch,
        is_slashed: bool,
        flag_index: usize,
        validator_effective_balance: u64,
    ) -> Result<(), BeaconStateError> {
        let cache = self.get_inner_mut()?;

        if epoch == cache.current_epoch {
            cache.current_epoch_cache.on_new_attestation(
                is_slashed,
                flag_index,
                validator_effective_balance,
            )?;
        } else if epoch.safe_add(1)? == cache.current_epoch {
            cache.previous_epoch_cache.on_new_attestation(
                is_slashed,
                flag_index,
                validator_effective_balance,
            )?;
        } else {
            return Err(BeaconStateError::ProgressiveBalancesCacheInconsistent);
        }

        Ok(())
    }

    /// When a validator is slashed, we reduce the `current_epoch_target_attesting_balance` by the
    /// validator's effective balance to exclude the validator weight.
    pub fn on_slashing(
        &mut self,
        previous_epoch_participation: crate::ParticipationFlags,
        current_epoch_participation: crate::ParticipationFlags,
        effective_balance: u64,
    ) -> Result<(), BeaconStateError> {
        let cache = self.get_inner_mut()?;
        cache
            .previous_epoch_cache
            .on_slashing(previous_epoch_participation, effective_balance)?;
        cache
            .current_epoch_cache
            .on_slashing(current_epoch_participation, effective_balance)?;
        Ok(())
    }

    /// On epoch transition, the balance from current epoch is shifted to previous epoch, and the
    /// current epoch balance is reset to 0.
    pub fn on_epoch_transition(&mut self, spec: &ChainSpec) -> Result<(), BeaconStateError> {
        let cache = self.get_inner_mut()?;
        cache.current_epoch.safe_add_assign(1)?;
        cache.previous_epoch_cache =
            std::mem::replace(&mut cache.current_epoch_cache, EpochTotalBalances::new(spec));
        Ok(())
    }

    pub fn previous_epoch_flag_attesting_balance(
        &self,
        flag_index: usize,
    ) -> Result<u64, BeaconStateError> {
        self.get_inner()?
            .previous_epoch_cache
            .total_flag_balance(flag_index)
    }

    pub fn current_epoch_flag_attesting_balance(
        &self,
        flag_index: usize,
    ) -> Result<u64, BeaconStateError> {
        self.get_inner()?
            .current_epoch_cache
            .total_flag_balance(flag_index)
    }

    pub fn previous_epoch_target_attesting_balance(&self) -> Result<u64, BeaconStateError> {
        self.previous_epoch_flag_attesting_balance(
            crate::consts::altair::TIMELY_TARGET_FLAG_INDEX,
        )
    }

    pub fn current_epoch_target_attesting_balance(&self) -> Result<u64, BeaconStateError> {
        self.current_epoch_flag_attesting_balance(crate::consts::altair::TIMELY_TARGET_FLAG_INDEX)
    }

    fn get_inner_mut(&mut self) -> Result<&mut Inner, BeaconStateError> {
        self.inner
            .as_mut()
            .ok_or(BeaconStateError::ProgressiveBalancesCacheNotInitialized)
    }

    fn get_inner(&self) -> Result<&Inner, BeaconStateError> {
        self.inner
            .as_ref()
            .ok_or(BeaconStateError::ProgressiveBalancesCacheNotInitialized)
    }
}

/// An opaque, pre-summed seed for one epoch's flag balances, produced by scanning the state's
/// participation lists.
pub struct EpochTotalBalancesSeed(EpochTotalBalances);

/// Compute the seed balances for `epoch` (either the previous or current epoch of `state`).
pub fn compute_epoch_total_balances_seed<E: EthSpec>(
    state: &BeaconState<E>,
    epoch: Epoch,
    spec: &ChainSpec,
) -> Result<EpochTotalBalancesSeed, BeaconStateError> {
    let mut balances = EpochTotalBalances::new(spec);
    let participation = if epoch == state.current_epoch() {
        state.current_epoch_participation()?
    } else {
        state.previous_epoch_participation()?
    };

    for (validator, flags) in state.validators().iter().zip(participation.iter()) {
        if validator.slashed || !validator.is_active_at(epoch) {
            continue;
        }
        for flag_index in 0..crate::consts::altair::NUM_FLAG_INDICES {
            if flags.has_flag(flag_index)? {
                balances.on_new_attestation(false, flag_index, validator.effective_balance)?;
            }
        }
    }

    Ok(EpochTotalBalancesSeed(balances))
}
