use crate::{BeaconStateError, Epoch, Hash256};
use safe_arith::SafeArith;
use std::sync::Arc;

/// An effective balance, expressed in whole `EFFECTIVE_BALANCE_INCREMENT`s.
///
/// The maximum effective balance (2048 ETH post-electra) fits comfortably in 16 bits.
pub type EffectiveBalanceIncrement = u16;

/// Cache of values which are uniquely determined at the start of an epoch.
///
/// The values are fixed with respect to the last block of the _prior_ epoch, which we refer
/// to as the "decision block".
#[derive(Debug, PartialEq, Eq, Clone, Default)]
pub struct EpochCache {
    inner: Option<Arc<Inner>>,
}

#[derive(Debug, PartialEq, Eq, Clone)]
struct Inner {
    /// Unique identifier for this cache, which can be used to check its validity before use
    /// with any `BeaconState`.
    key: EpochCacheKey,
    /// Effective balance for every validator in this epoch, in increments.
    effective_balance_increments: Vec<EffectiveBalanceIncrement>,
    /// Base reward for every validator effective balance increment.
    base_reward_per_increment: u64,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct EpochCacheKey {
    pub epoch: Epoch,
    pub decision_block_root: Hash256,
}

impl EpochCache {
    pub fn new(
        key: EpochCacheKey,
        effective_balance_increments: Vec<EffectiveBalanceIncrement>,
        base_reward_per_increment: u64,
    ) -> EpochCache {
        Self {
            inner: Some(Arc::new(Inner {
                key,
                effective_balance_increments,
                base_reward_per_increment,
            })),
        }
    }

    pub fn check_validity(
        &self,
        current_epoch: Epoch,
        state_decision_root: Hash256,
    ) -> Result<(), BeaconStateError> {
        let cache = self
            .inner
            .as_ref()
            .ok_or(BeaconStateError::EpochCacheUninitialized)?;
        if cache.key.epoch != current_epoch {
            return Err(BeaconStateError::EpochCacheInvalidEpoch {
                cache_epoch: cache.key.epoch,
                state_epoch: current_epoch,
            });
        }
        if cache.key.decision_block_root != state_decision_root {
            return Err(BeaconStateError::EpochCacheInvalidDecisionBlock);
        }
        Ok(())
    }

    #[inline]
    pub fn get_effective_balance_increment(
        &self,
        validator_index: usize,
    ) -> Result<EffectiveBalanceIncrement, BeaconStateError> {
        self.inner
            .as_ref()
            .ok_or(BeaconStateError::EpochCacheUninitialized)?
            .effective_balance_increments
            .get(validator_index)
            .copied()
            .ok_or(BeaconStateError::UnknownValidator(validator_index))
    }

    /// The effective balance in Gwei, reconstructed from increments.
    #[inline]
    pub fn get_effective_balance(
        &self,
        validator_index: usize,
        effective_balance_increment: u64,
    ) -> Result<u64, BeaconStateError> {
        Ok(u64::from(self.get_effective_balance_increment(validator_index)?)
            .safe_mul(effective_balance_increment)?)
    }

    #[inline]
    pub fn get_base_reward(&self, validator_index: usize) -> Result<u64, BeaconStateError> {
        let inner = self
            .inner
            .as_ref()
            .ok_or(BeaconStateError::EpochCacheUninitialized)?;
        let increments = inner
            .effective_balance_increments
            .get(validator_index)
            .copied()
            .ok_or(BeaconStateError::UnknownValidator(validator_index))?;
        Ok(u64::from(increments).safe_mul(inner.base_reward_per_increment)?)
    }

    pub fn base_reward_per_increment(&self) -> Result<u64, BeaconStateError> {
        Ok(self
            .inner
            .as_ref()
            .ok_or(BeaconStateError::EpochCacheUninitialized)?
            .base_reward_per_increment)
    }

    /// The full effective-balance-increments vector, as used by fork choice's justified
    /// balances.
    pub fn effective_balance_increments(
        &self,
    ) -> Result<&[EffectiveBalanceIncrement], BeaconStateError> {
        Ok(&self
            .inner
            .as_ref()
            .ok_or(BeaconStateError::EpochCacheUninitialized)?
            .effective_balance_increments)
    }
}
