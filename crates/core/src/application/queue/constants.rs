// Queue constants (No magic values)
use std::time::Duration;

/// Retry granularity of the bounded-wait poll (1s).
/// Callers observe at most this much extra latency after an item becomes available.
pub const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Content of lazily created root and ancestor nodes
pub const DIRECTORY_DATA: &[u8] = &[];

/// Width of service-assigned sequence suffixes (`%010d`)
pub use crate::domain::codec::SEQUENCE_WIDTH;
