use metrics::{try_create_histogram_vec, HistogramVec};
use std::sync::LazyLock;

/// Timer for each step of epoch processing, labelled by step name.
pub static EPOCH_PROCESSING_TIME: LazyLock<metrics::Result<HistogramVec>> = LazyLock::new(|| {
    try_create_histogram_vec(
        "beacon_epoch_processing_seconds",
        "Time taken by each step of per-epoch processing",
        &["step"],
    )
});

pub use metrics::{start_timer_vec, stop_timer};
