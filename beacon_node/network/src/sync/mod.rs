pub mod batch;
pub mod block_input;
pub mod network_context;
pub mod range_sync;
