//! The `Slot` and `Epoch` types are defined as new types to enforce type-safety between
//! the two concepts.
//!
//! `Slot` and `Epoch` have implementations which permit conversion, comparison and math operations
//! between each and `u64`, however specifically not between each other.
//!
//! All math operations on `Slot` and `Epoch` are saturating, they never wrap or panic.

use crate::SignedRoot;
use safe_arith::{ArithError, SafeArith};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use ssz::{Decode, DecodeError, Encode};
use std::fmt;
use std::hash::Hash;
use std::iter::Iterator;

macro_rules! impl_common {
    ($type: ident) => {
        impl $type {
            pub const fn new(value: u64) -> Self {
                Self(value)
            }

            pub const fn as_u64(&self) -> u64 {
                self.0
            }

            pub const fn as_usize(&self) -> usize {
                self.0 as usize
            }

            pub const fn max_value() -> Self {
                Self(u64::MAX)
            }

            pub fn saturating_sub<T: Into<u64>>(&self, other: T) -> Self {
                Self(self.0.saturating_sub(other.into()))
            }

            pub fn saturating_add<T: Into<u64>>(&self, other: T) -> Self {
                Self(self.0.saturating_add(other.into()))
            }
        }

        impl From<u64> for $type {
            fn from(value: u64) -> Self {
                Self(value)
            }
        }

        impl From<usize> for $type {
            fn from(value: usize) -> Self {
                Self(value as u64)
            }
        }

        impl From<$type> for u64 {
            fn from(value: $type) -> Self {
                value.0
            }
        }

        impl From<$type> for usize {
            fn from(value: $type) -> Self {
                value.0 as usize
            }
        }

        impl PartialEq<u64> for $type {
            fn eq(&self, other: &u64) -> bool {
                self.0 == *other
            }
        }

        impl PartialOrd<u64> for $type {
            fn partial_cmp(&self, other: &u64) -> Option<std::cmp::Ordering> {
                self.0.partial_cmp(other)
            }
        }

        impl std::ops::Add<$type> for $type {
            type Output = $type;
            fn add(self, other: $type) -> $type {
                $type(self.0.saturating_add(other.0))
            }
        }

        impl std::ops::Add<u64> for $type {
            type Output = $type;
            fn add(self, other: u64) -> $type {
                $type(self.0.saturating_add(other))
            }
        }

        impl std::ops::AddAssign<$type> for $type {
            fn add_assign(&mut self, other: $type) {
                self.0 = self.0.saturating_add(other.0);
            }
        }

        impl std::ops::AddAssign<u64> for $type {
            fn add_assign(&mut self, other: u64) {
                self.0 = self.0.saturating_add(other);
            }
        }

        impl std::ops::Sub<$type> for $type {
            type Output = $type;
            fn sub(self, other: $type) -> $type {
                $type(self.0.saturating_sub(other.0))
            }
        }

        impl std::ops::Sub<u64> for $type {
            type Output = $type;
            fn sub(self, other: u64) -> $type {
                $type(self.0.saturating_sub(other))
            }
        }

        impl std::ops::SubAssign<u64> for $type {
            fn sub_assign(&mut self, other: u64) {
                self.0 = self.0.saturating_sub(other);
            }
        }

        impl std::ops::Mul<u64> for $type {
            type Output = $type;
            fn mul(self, rhs: u64) -> $type {
                $type(self.0.saturating_mul(rhs))
            }
        }

        impl std::ops::Div<u64> for $type {
            type Output = $type;
            fn div(self, rhs: u64) -> $type {
                $type(self.0.checked_div(rhs).expect("divisor must be non-zero"))
            }
        }

        impl std::ops::Rem<u64> for $type {
            type Output = $type;
            fn rem(self, modulus: u64) -> $type {
                $type(self.0.checked_rem(modulus).expect("modulus must be non-zero"))
            }
        }

        impl SafeArith for $type {
            const ZERO: Self = Self::new(0);
            const ONE: Self = Self::new(1);

            fn safe_add(&self, other: Self) -> Result<Self, ArithError> {
                self.0.safe_add(other.0).map(Self)
            }

            fn safe_sub(&self, other: Self) -> Result<Self, ArithError> {
                self.0.safe_sub(other.0).map(Self)
            }

            fn safe_mul(&self, other: Self) -> Result<Self, ArithError> {
                self.0.safe_mul(other.0).map(Self)
            }

            fn safe_div(&self, other: Self) -> Result<Self, ArithError> {
                self.0.safe_div(other.0).map(Self)
            }

            fn safe_rem(&self, other: Self) -> Result<Self, ArithError> {
                self.0.safe_rem(other.0).map(Self)
            }

            fn safe_shl(&self, other: u32) -> Result<Self, ArithError> {
                self.0.safe_shl(other).map(Self)
            }

            fn safe_shr(&self, other: u32) -> Result<Self, ArithError> {
                self.0.safe_shr(other).map(Self)
            }
        }

        impl SafeArith<u64> for $type {
            const ZERO: Self = Self::new(0);
            const ONE: Self = Self::new(1);

            fn safe_add(&self, other: u64) -> Result<Self, ArithError> {
                self.0.safe_add(other).map(Self)
            }

            fn safe_sub(&self, other: u64) -> Result<Self, ArithError> {
                self.0.safe_sub(other).map(Self)
            }

            fn safe_mul(&self, other: u64) -> Result<Self, ArithError> {
                self.0.safe_mul(other).map(Self)
            }

            fn safe_div(&self, other: u64) -> Result<Self, ArithError> {
                self.0.safe_div(other).map(Self)
            }

            fn safe_rem(&self, other: u64) -> Result<Self, ArithError> {
                self.0.safe_rem(other).map(Self)
            }

            fn safe_shl(&self, other: u32) -> Result<Self, ArithError> {
                self.0.safe_shl(other).map(Self)
            }

            fn safe_shr(&self, other: u32) -> Result<Self, ArithError> {
                self.0.safe_shr(other).map(Self)
            }
        }

        impl fmt::Display for $type {
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl fmt::Debug for $type {
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                write!(f, "{}({})", stringify!($type), self.0)
            }
        }

        impl Encode for $type {
            fn is_ssz_fixed_len() -> bool {
                <u64 as Encode>::is_ssz_fixed_len()
            }

            fn ssz_fixed_len() -> usize {
                <u64 as Encode>::ssz_fixed_len()
            }

            fn ssz_bytes_len(&self) -> usize {
                self.0.ssz_bytes_len()
            }

            fn ssz_append(&self, buf: &mut Vec<u8>) {
                self.0.ssz_append(buf)
            }
        }

        impl Decode for $type {
            fn is_ssz_fixed_len() -> bool {
                <u64 as Decode>::is_ssz_fixed_len()
            }

            fn ssz_fixed_len() -> usize {
                <u64 as Decode>::ssz_fixed_len()
            }

            fn from_ssz_bytes(bytes: &[u8]) -> Result<Self, DecodeError> {
                u64::from_ssz_bytes(bytes).map(Self)
            }
        }

        impl tree_hash::TreeHash for $type {
            fn tree_hash_type() -> tree_hash::TreeHashType {
                tree_hash::TreeHashType::Basic
            }

            fn tree_hash_packed_encoding(&self) -> tree_hash::PackedEncoding {
                self.0.tree_hash_packed_encoding()
            }

            fn tree_hash_packing_factor() -> usize {
                u64::tree_hash_packing_factor()
            }

            fn tree_hash_root(&self) -> tree_hash::Hash256 {
                self.0.tree_hash_root()
            }
        }

        impl Serialize for $type {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(&self.0.to_string())
            }
        }

        impl<'de> Deserialize<'de> for $type {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                s.parse::<u64>()
                    .map(Self)
                    .map_err(serde::de::Error::custom)
            }
        }
    };
}

/// A slot number.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Slot(u64);

/// An epoch number.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Epoch(u64);

impl_common!(Slot);
impl_common!(Epoch);

impl Slot {
    /// Returns the epoch containing this slot.
    pub fn epoch(self, slots_per_epoch: u64) -> Epoch {
        Epoch::new(self.0 / slots_per_epoch)
    }

    pub fn is_aligned_to_epoch(self, slots_per_epoch: u64) -> bool {
        self.0 % slots_per_epoch == 0
    }
}

impl Epoch {
    /// The first slot of this epoch.
    pub fn start_slot(self, slots_per_epoch: u64) -> Slot {
        Slot::new(self.0.saturating_mul(slots_per_epoch))
    }

    /// The last slot of this epoch.
    pub fn end_slot(self, slots_per_epoch: u64) -> Slot {
        Slot::new(
            self.0
                .saturating_add(1)
                .saturating_mul(slots_per_epoch)
                .saturating_sub(1),
        )
    }

    /// Position of some slot inside this epoch, if it belongs to it.
    pub fn position(self, slot: Slot, slots_per_epoch: u64) -> Option<usize> {
        let start = self.start_slot(slots_per_epoch);
        let end = self.end_slot(slots_per_epoch);

        if slot >= start && slot <= end {
            slot.as_usize().checked_sub(start.as_usize())
        } else {
            None
        }
    }

    /// An iterator over all slots in this epoch.
    pub fn slot_iter(self, slots_per_epoch: u64) -> SlotIter {
        SlotIter {
            current_iteration: 0,
            epoch: self,
            slots_per_epoch,
        }
    }
}

impl SignedRoot for Epoch {}

pub struct SlotIter {
    current_iteration: u64,
    epoch: Epoch,
    slots_per_epoch: u64,
}

impl Iterator for SlotIter {
    type Item = Slot;

    fn next(&mut self) -> Option<Slot> {
        if self.current_iteration >= self.slots_per_epoch {
            None
        } else {
            let start_slot = self.epoch.start_slot(self.slots_per_epoch);
            let previous = self.current_iteration;
            self.current_iteration = self.current_iteration.checked_add(1)?;
            start_slot.0.checked_add(previous).map(Slot::new)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_epoch_conversions() {
        assert_eq!(Slot::new(0).epoch(32), Epoch::new(0));
        assert_eq!(Slot::new(31).epoch(32), Epoch::new(0));
        assert_eq!(Slot::new(32).epoch(32), Epoch::new(1));

        assert_eq!(Epoch::new(2).start_slot(32), Slot::new(64));
        assert_eq!(Epoch::new(2).end_slot(32), Slot::new(95));
    }

    #[test]
    fn saturating_arith() {
        assert_eq!(Slot::new(0) - 1u64, Slot::new(0));
        assert_eq!(Epoch::new(u64::MAX) + 1u64, Epoch::new(u64::MAX));
    }

    #[test]
    fn safe_arith_errors() {
        assert!(Slot::new(u64::MAX).safe_add(Slot::new(1)).is_err());
        assert!(Epoch::new(0).safe_sub(Epoch::new(1)).is_err());
    }

    #[test]
    fn slot_iter_covers_epoch() {
        let slots: Vec<_> = Epoch::new(1).slot_iter(4).collect();
        assert_eq!(
            slots,
            vec![Slot::new(4), Slot::new(5), Slot::new(6), Slot::new(7)]
        );
    }

    #[test]
    fn ssz_round_trip() {
        let slot = Slot::new(123);
        let bytes = slot.as_ssz_bytes();
        assert_eq!(Slot::from_ssz_bytes(&bytes).unwrap(), slot);
    }
}
