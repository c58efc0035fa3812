// Central Error Type for queue operations

use thiserror::Error;

use crate::domain::DomainError;
use crate::port::CoordinationError;

/// Queue-level error type
#[derive(Error, Debug)]
pub enum QueueError {
    /// Priority out of range, malformed root path, invalid child name
    #[error("Invalid argument: {0}")]
    InvalidArgument(#[from] DomainError),

    /// Non-blocking read on an empty or never-created queue
    #[error("Not found: {0}")]
    NotFound(String),

    /// Opaque pass-through of the coordination service's failure
    #[error("Coordination service error: {0}")]
    Service(#[from] CoordinationError),
}

impl QueueError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, QueueError::NotFound(_))
    }

    /// True when the service reported that a node does not exist.
    pub(crate) fn is_no_node(&self) -> bool {
        matches!(self, QueueError::Service(CoordinationError::NoNode(_)))
    }
}

/// Result type alias using QueueError
pub type Result<T> = std::result::Result<T, QueueError>;
