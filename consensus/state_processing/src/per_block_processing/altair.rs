pub mod sync_committee;

pub use sync_committee::process_sync_aggregate;
