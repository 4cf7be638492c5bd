use alloy_primitives::FixedBytes;
use safe_arith::SafeArith;

pub type Hash64 = alloy_primitives::B64;
pub type Hash256 = alloy_primitives::B256;
pub type Uint256 = alloy_primitives::U256;
pub type Address = alloy_primitives::Address;

pub trait UintExtended: Sized {
    fn as_u64(&self) -> u64;
}

/// Provides the constructors that existed on the pre-alloy hash types.
pub trait FixedBytesExtended {
    fn from_low_u64_be(value: u64) -> Self;
    fn from_low_u64_le(value: u64) -> Self;
    fn zero() -> Self;
}

impl<const N: usize> FixedBytesExtended for FixedBytes<N> {
    fn from_low_u64_be(value: u64) -> Self {
        let value_bytes = value.to_be_bytes();
        let mut buffer = [0x0; N];
        let bytes_to_copy = value_bytes.len().min(buffer.len());
        // Panic-free because bytes_to_copy <= buffer.len()
        let start_index = buffer
            .len()
            .safe_sub(bytes_to_copy)
            .expect("bytes_to_copy <= buffer.len()");
        // Panic-free because start_index <= buffer.len()
        // and bytes_to_copy <= value_bytes.len()
        buffer
            .get_mut(start_index..)
            .expect("start_index <= buffer.len()")
            .copy_from_slice(
                value_bytes
                    .get(..bytes_to_copy)
                    .expect("bytes_to_copy <= value_byte.len()"),
            );
        Self::from(buffer)
    }

    fn from_low_u64_le(value: u64) -> Self {
        let value_bytes = value.to_le_bytes();
        let mut buffer = [0x0; N];
        let bytes_to_copy = value_bytes.len().min(buffer.len());
        buffer
            .get_mut(..bytes_to_copy)
            .expect("bytes_to_copy <= buffer.len()")
            .copy_from_slice(
                value_bytes
                    .get(..bytes_to_copy)
                    .expect("bytes_to_copy <= value_byte.len()"),
            );
        Self::from(buffer)
    }

    fn zero() -> Self {
        Self::ZERO
    }
}

impl UintExtended for Uint256 {
    /// Trims the Uint256 to its lowest 64 bits.
    fn as_u64(&self) -> u64 {
        self.into_limbs()[0]
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn from_low_u64_be_roundtrip() {
        let hash = Hash256::from_low_u64_be(0xDEADBEEF);
        assert_eq!(&hash.as_slice()[24..], &0xDEADBEEFu64.to_be_bytes());
        assert_eq!(&hash.as_slice()[..24], &[0u8; 24]);
    }

    #[test]
    fn from_low_u64_le_roundtrip() {
        let hash = Hash256::from_low_u64_le(0xDEADBEEF);
        assert_eq!(&hash.as_slice()[..8], &0xDEADBEEFu64.to_le_bytes());
    }

    #[test]
    fn zero_is_zero() {
        assert_eq!(Hash256::zero(), Hash256::from([0u8; 32]));
    }
}
