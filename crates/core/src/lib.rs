// pdqueue Core - Domain Logic & Ports
// NO coordination-service implementation here: adapters live in their own crates

pub mod application;
pub mod domain;
pub mod error;
pub mod port;

pub use application::DistributedPriorityQueue;
pub use domain::{PriorityCodec, QueueConfig, SimplePriorityCodec};
pub use error::{QueueError, Result};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
