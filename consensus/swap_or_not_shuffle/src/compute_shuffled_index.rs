use ethereum_hashing::{Context, Sha256Context};
use std::cmp::max;

/// Return `p(index)` in a pseudorandom permutation `p` of `0...list_size-1` with `seed` as entropy.
///
/// Utilizes 'swap or not' shuffling found in
/// https://link.springer.com/content/pdf/10.1007%2F978-3-642-32009-5_1.pdf
/// See the 'generalized domain' algorithm on page 3.
///
/// Note: this function is significantly slower than the `shuffle_list` function in this crate.
/// Using `compute_shuffled_index` to shuffle an entire list, index by index, has been observed to be
/// 250x slower than `shuffle_list`. Therefore, this function is only useful when shuffling a small
/// portion of a much larger list.
///
/// Returns `None` under any of the following conditions:
///  - `list_size == 0`
///  - `index >= list_size`
///  - `list_size > 2**24`
///  - `list_size > usize::MAX / 2`
pub fn compute_shuffled_index(
    index: usize,
    list_size: usize,
    seed: &[u8],
    shuffle_round_count: u8,
) -> Option<usize> {
    if list_size == 0
        || index >= list_size
        || list_size > usize::MAX / 2
        || list_size > 2_usize.pow(24)
    {
        return None;
    }

    let mut index = index;
    for round in 0..shuffle_round_count {
        let pivot = do_hash(seed, round)? as usize % list_size;
        index = do_round(seed, index, pivot, round, list_size)?;
    }
    Some(index)
}

fn do_hash(seed: &[u8], round: u8) -> Option<u64> {
    let mut context = Context::new();
    context.update(seed);
    context.update(&[round]);
    let digest = context.finalize();
    digest.get(0..8).map(|bytes| {
        u64::from_le_bytes(bytes.try_into().expect("first 8 bytes of digest"))
    })
}

fn do_round(seed: &[u8], index: usize, pivot: usize, round: u8, list_size: usize) -> Option<usize> {
    let flip = (pivot + (list_size - index)) % list_size;
    let position = max(index, flip);
    let source = hash_with_round_and_position(seed, round, position)?;
    let byte = source.get((position % 256) / 8)?;
    let bit = (byte >> (position % 8)) % 2;
    Some(if bit == 1 { flip } else { index })
}

fn hash_with_round_and_position(seed: &[u8], round: u8, position: usize) -> Option<[u8; 32]> {
    let mut context = Context::new();
    context.update(seed);
    context.update(&[round]);
    // Note: the position is converted to a `u32` (and not a `usize`), maintaining the
    // big-endian-ness across architectures.
    context.update(&(position / 256).to_le_bytes()[0..4]);
    let digest = context.finalize();
    Some(digest)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn returns_none_for_zero_length_list() {
        assert_eq!(None, compute_shuffled_index(100, 0, &[42, 42], 90));
    }

    #[test]
    fn returns_none_for_out_of_bounds_index() {
        assert_eq!(None, compute_shuffled_index(100, 100, &[42, 42], 90));
    }

    #[test]
    fn is_a_permutation() {
        let seed = [7u8; 32];
        let list_size = 100;
        let mut seen = vec![false; list_size];
        for i in 0..list_size {
            let shuffled = compute_shuffled_index(i, list_size, &seed, 10).unwrap();
            assert!(!seen[shuffled]);
            seen[shuffled] = true;
        }
        assert!(seen.iter().all(|s| *s));
    }
}
