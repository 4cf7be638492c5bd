//! Tracks the fee recipients that proposers have registered for payload preparation.
//!
//! Entries are registered per epoch and survive for `PROPOSER_PRESERVE_EPOCHS` after their
//! registration epoch, so a validator that misses a couple of registration rounds still gets
//! its chosen recipient rather than the node-wide default.

use std::collections::HashMap;
use types::{Address, Epoch};

/// How many epochs a registration remains usable after the epoch it was made in.
pub const PROPOSER_PRESERVE_EPOCHS: u64 = 2;

/// A single proposer registration, as submitted by the validator client.
#[derive(Debug, Clone, PartialEq)]
pub struct ProposerPreparationData {
    pub validator_index: u64,
    pub fee_recipient: Address,
}

struct CacheEntry {
    epoch: Epoch,
    fee_recipient: Address,
}

pub struct BeaconProposerCache {
    /// The node-wide fee recipient, used for any proposer without a live registration.
    suggested_fee_recipient: Address,
    entries: HashMap<u64, CacheEntry>,
}

impl BeaconProposerCache {
    pub fn new(suggested_fee_recipient: Address) -> Self {
        Self {
            suggested_fee_recipient,
            entries: HashMap::new(),
        }
    }

    /// Register (or refresh) the fee recipient for a validator at `epoch`.
    pub fn add(&mut self, epoch: Epoch, preparation: ProposerPreparationData) {
        self.entries.insert(
            preparation.validator_index,
            CacheEntry {
                epoch,
                fee_recipient: preparation.fee_recipient,
            },
        );
    }

    /// The registered fee recipient for `validator_index`, if a registration is live.
    pub fn get(&self, validator_index: u64) -> Option<Address> {
        self.entries
            .get(&validator_index)
            .map(|entry| entry.fee_recipient)
    }

    /// As `get`, falling back to the node-wide suggested fee recipient.
    pub fn get_or_default(&self, validator_index: u64) -> Address {
        self.get(validator_index)
            .unwrap_or(self.suggested_fee_recipient)
    }

    /// Drop registrations too old to be usable at `current_epoch`.
    pub fn prune(&mut self, current_epoch: Epoch) {
        self.entries.retain(|_, entry| {
            entry.epoch + PROPOSER_PRESERVE_EPOCHS >= current_epoch
        });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use types::FixedBytesExtended;

    fn address(byte: u8) -> Address {
        Address::repeat_byte(byte)
    }

    fn cache() -> BeaconProposerCache {
        let mut cache = BeaconProposerCache::new(address(0xaa));
        cache.add(
            Epoch::new(1),
            ProposerPreparationData {
                validator_index: 23,
                fee_recipient: address(0xbb),
            },
        );
        cache.add(
            Epoch::new(3),
            ProposerPreparationData {
                validator_index: 43,
                fee_recipient: address(0xcc),
            },
        );
        cache
    }

    #[test]
    fn unknown_validator_gets_the_default() {
        let cache = cache();
        assert_eq!(cache.get_or_default(32), address(0xaa));
        assert_eq!(cache.get(32), None);
    }

    #[test]
    fn registered_validator_gets_its_recipient() {
        let cache = cache();
        assert_eq!(cache.get(23), Some(address(0xbb)));
        assert_eq!(cache.get_or_default(23), address(0xbb));
    }

    #[test]
    fn prune_drops_only_stale_registrations() {
        let mut cache = cache();
        cache.prune(Epoch::new(4));

        // The epoch-1 registration is out of the preservation window.
        assert_eq!(cache.get(23), None);
        assert_eq!(cache.get_or_default(23), address(0xaa));
        // The epoch-3 registration survives.
        assert_eq!(cache.get(43), Some(address(0xcc)));
    }
}
