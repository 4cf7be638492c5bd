//! The "swap-or-not" shuffle, as described in the consensus spec's
//! `compute_shuffled_index`.
//!
//! Provides two views of the same permutation:
//!
//! - `compute_shuffled_index`: shuffle a single index in `O(rounds)`.
//! - `shuffle_list`: shuffle an entire list in-place, amortizing the hashing
//!   across all indices. `shuffle_list(seed)[i]` equals
//!   `compute_shuffled_index(i, ..)` with `forwards == false` inverted; the
//!   test suite pins the equivalence.

mod compute_shuffled_index;
mod shuffle_list;

pub use compute_shuffled_index::compute_shuffled_index;
pub use shuffle_list::shuffle_list;

type Hash256 = fixed_bytes::Hash256;
