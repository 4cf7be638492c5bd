//! Convert integers to little-endian byte vectors, as used for seed domains and
//! shuffling round hashing.

/// Returns `int` as little-endian bytes with a length of 1.
pub fn int_to_bytes1(int: u8) -> Vec<u8> {
    vec![int]
}

/// Returns `int` as little-endian bytes with a length of 4.
pub fn int_to_bytes4(int: u32) -> [u8; 4] {
    int.to_le_bytes()
}

/// Returns `int` as little-endian bytes with a length of 8.
pub fn int_to_bytes8(int: u64) -> Vec<u8> {
    int.to_le_bytes().to_vec()
}

/// Returns `int` as little-endian bytes with a length of 32.
pub fn int_to_bytes32(int: u64) -> Vec<u8> {
    let mut bytes = int.to_le_bytes().to_vec();
    bytes.resize(32, 0);
    bytes
}

/// Returns `int` as little-endian bytes with a length of 32, as a fixed-length array.
pub fn int_to_fixed_bytes32(int: u64) -> [u8; 32] {
    let mut bytes = [0u8; 32];
    bytes[0..8].copy_from_slice(&int.to_le_bytes());
    bytes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn int_to_bytes4_le() {
        assert_eq!(int_to_bytes4(0x01020304), [0x04, 0x03, 0x02, 0x01]);
    }

    #[test]
    fn int_to_bytes8_le() {
        assert_eq!(
            int_to_bytes8(0x0102030405060708),
            vec![0x08, 0x07, 0x06, 0x05, 0x04, 0x03, 0x02, 0x01]
        );
    }

    #[test]
    fn fixed_bytes32_matches_vec() {
        for int in [0u64, 1, 256, u64::MAX] {
            assert_eq!(int_to_bytes32(int), int_to_fixed_bytes32(int).to_vec());
        }
    }
}
