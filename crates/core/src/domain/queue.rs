// Queue Domain Model

use serde::{Deserialize, Serialize};

use super::error::{DomainError, Result};
use super::path;

/// Opaque item content stored in a queue node
pub type Payload = Vec<u8>;

/// Access control applied to nodes the queue creates.
///
/// Mirrors the coordination service's predefined ACL sets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Acl {
    /// Anyone may do anything
    #[default]
    OpenUnsafe,
    /// Full rights for the creating session's authenticated identity only
    CreatorAllAcl,
    /// Anyone may read
    ReadUnsafe,
}

/// Queue configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Directory node whose children are the queue items
    pub root_path: String,

    #[serde(default)]
    pub acl: Acl,

    /// Create missing ancestors of the root when it is created lazily
    #[serde(default)]
    pub create_parents: bool,
}

impl QueueConfig {
    pub fn new(root_path: impl Into<String>) -> Self {
        Self {
            root_path: root_path.into(),
            acl: Acl::default(),
            create_parents: false,
        }
    }

    pub fn with_acl(mut self, acl: Acl) -> Self {
        self.acl = acl;
        self
    }

    pub fn with_create_parents(mut self, create_parents: bool) -> Self {
        self.create_parents = create_parents;
        self
    }

    /// Reject empty or malformed root paths.
    pub fn validate(&self) -> Result<()> {
        if self.root_path.trim().is_empty() {
            return Err(DomainError::EmptyRootPath);
        }
        path::validate_path(&self.root_path, false)?;
        if self.root_path == path::ROOT {
            return Err(DomainError::InvalidPath {
                path: self.root_path.clone(),
                reason: "queue root cannot be the namespace root".to_string(),
            });
        }
        Ok(())
    }
}
