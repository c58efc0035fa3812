// Application Layer - Queue algorithms composed over the coordination port

pub mod enumerator;
pub mod queue;
pub mod tracker;

// Re-exports
pub use enumerator::ordered_children;
pub use queue::DistributedPriorityQueue;
pub use tracker::ChangeTracker;
