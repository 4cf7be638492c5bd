use metrics::{
    try_create_histogram, try_create_int_counter, try_create_int_counter_vec,
    try_create_int_gauge, Histogram, IntCounter, IntCounterVec, IntGauge,
};
use std::sync::LazyLock;

pub use metrics::{inc_counter, inc_counter_vec, observe, set_gauge, start_timer, stop_timer};

/*
 * Block processing.
 */
pub static BLOCK_PROCESSING_TIMES: LazyLock<metrics::Result<Histogram>> = LazyLock::new(|| {
    try_create_histogram(
        "beacon_block_processing_seconds",
        "Full runtime of block processing",
    )
});
pub static BLOCK_PROCESSING_SUCCESSES: LazyLock<metrics::Result<IntCounter>> =
    LazyLock::new(|| {
        try_create_int_counter(
            "beacon_block_processing_successes_total",
            "Count of blocks processed without error",
        )
    });
pub static BLOCK_PROCESSING_ERRORS: LazyLock<metrics::Result<IntCounterVec>> =
    LazyLock::new(|| {
        try_create_int_counter_vec(
            "beacon_block_processing_errors_total",
            "Count of block processing failures by kind",
            &["kind"],
        )
    });

/*
 * Shuffling cache.
 */
pub static SHUFFLING_CACHE_HITS: LazyLock<metrics::Result<IntCounter>> = LazyLock::new(|| {
    try_create_int_counter(
        "beacon_shuffling_cache_hits_total",
        "Count of times shuffling cache fulfils request",
    )
});
pub static SHUFFLING_CACHE_MISSES: LazyLock<metrics::Result<IntCounter>> = LazyLock::new(|| {
    try_create_int_counter(
        "beacon_shuffling_cache_misses_total",
        "Count of times shuffling cache fulfils request",
    )
});
pub static SHUFFLING_CACHE_PROMISE_HITS: LazyLock<metrics::Result<IntCounter>> =
    LazyLock::new(|| {
        try_create_int_counter(
            "beacon_shuffling_cache_promise_hits_total",
            "Count of times shuffling cache returns a promise to future shuffling",
        )
    });
pub static SHUFFLING_CACHE_PROMISE_FAILS: LazyLock<metrics::Result<IntCounter>> =
    LazyLock::new(|| {
        try_create_int_counter(
            "beacon_shuffling_cache_promise_fails_total",
            "Count of times shuffling cache detects a failed promise",
        )
    });
pub static SHUFFLING_CACHE_PROMISE_WAIT_SECONDS: LazyLock<metrics::Result<Histogram>> =
    LazyLock::new(|| {
        try_create_histogram(
            "beacon_shuffling_cache_promise_wait_seconds",
            "Time between a shuffling promise being created and resolved",
        )
    });
pub static SHUFFLING_CACHE_SIZE: LazyLock<metrics::Result<IntGauge>> = LazyLock::new(|| {
    try_create_int_gauge(
        "beacon_shuffling_cache_size",
        "Number of entries in the shuffling cache",
    )
});

/*
 * Operation pools.
 */
pub static SYNC_CONTRIBUTION_POOL_SIZE: LazyLock<metrics::Result<IntGauge>> =
    LazyLock::new(|| {
        try_create_int_gauge(
            "beacon_sync_contribution_pool_size",
            "Number of contributions retained across all slots",
        )
    });
pub static OP_POOL_INSERT_OUTCOMES: LazyLock<metrics::Result<IntCounterVec>> =
    LazyLock::new(|| {
        try_create_int_counter_vec(
            "beacon_op_pool_insert_outcomes_total",
            "Count of pool insertions by outcome",
            &["pool", "outcome"],
        )
    });

/*
 * Data availability.
 */
pub static DATA_COLUMN_RECONSTRUCTIONS: LazyLock<metrics::Result<IntCounter>> =
    LazyLock::new(|| {
        try_create_int_counter(
            "beacon_data_column_reconstructions_total",
            "Count of successful data column reconstructions",
        )
    });
pub static KZG_VERIFICATION_TIMES: LazyLock<metrics::Result<Histogram>> = LazyLock::new(|| {
    try_create_histogram(
        "beacon_kzg_verification_seconds",
        "Runtime of batched KZG verification",
    )
});
