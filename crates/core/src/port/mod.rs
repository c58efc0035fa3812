// Port Layer - Interfaces for external dependencies

pub mod coordination;

// Re-exports
pub use crate::domain::Acl;
pub use coordination::{
    ChildWatcher, CoordinationClient, CoordinationError, CreateMode, EventType, WatchedEvent,
};
#[cfg(test)]
pub(crate) use coordination::mocks;
