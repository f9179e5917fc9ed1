//! Write-side buffering.
//!
//! Point writes and deletes are staged into per-table batch writers and only
//! reach the store on flush, on a writer's own latency/size threshold, on a
//! flush-interval change, or on shutdown.

mod mutation_buffer;

pub use mutation_buffer::{BufferLifecycle, BufferStats, MutationBuffer};
