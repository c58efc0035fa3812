// Domain Layer - Node naming, paths and queue configuration

pub mod codec;
pub mod error;
pub mod path;
pub mod queue;

// Re-exports
pub use codec::{PriorityCodec, SimplePriorityCodec};
pub use error::DomainError;
pub use queue::{Acl, Payload, QueueConfig};
