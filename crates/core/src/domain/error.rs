// Domain Error Types

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("Priority {priority} outside supported range [{min}, {max}]")]
    PriorityOutOfRange { priority: i64, min: i64, max: i64 },

    #[error("Invalid child name: '{0}'")]
    InvalidChildName(String),

    #[error("Invalid path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("Root path cannot be empty")]
    EmptyRootPath,
}

pub type Result<T> = std::result::Result<T, DomainError>;
