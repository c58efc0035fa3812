// Coordination Service Port (Interface)
// Hierarchical namespace with sequential nodes and one-shot child watches

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::Acl;

/// Node creation mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateMode {
    /// Fixed name, survives the creating session
    Persistent,
    /// Service appends a per-parent, monotonically increasing suffix
    PersistentSequential,
}

impl CreateMode {
    pub fn is_sequential(&self) -> bool {
        matches!(self, CreateMode::PersistentSequential)
    }
}

/// Kind of change reported to a watcher
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventType {
    /// The watched node itself was deleted
    NodeDeleted,
    NodeChildrenChanged,
    /// Session state change, delivered to every watch the session holds
    Session,
}

/// Notification delivered to a watcher
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchedEvent {
    pub event_type: EventType,
    /// Path of the watched node
    pub path: String,
    /// Full path of the child whose creation or deletion fired a child watch
    pub child: Option<String>,
}

impl WatchedEvent {
    pub fn children_changed(parent: impl Into<String>, child: impl Into<String>) -> Self {
        Self {
            event_type: EventType::NodeChildrenChanged,
            path: parent.into(),
            child: Some(child.into()),
        }
    }

    pub fn session_expired() -> Self {
        Self {
            event_type: EventType::Session,
            path: String::new(),
            child: None,
        }
    }

    /// The most specific path the event refers to.
    pub fn affected_path(&self) -> &str {
        self.child.as_deref().unwrap_or(&self.path)
    }
}

/// One-shot notification sink.
///
/// May be invoked on a different execution context than the one that
/// registered it.
pub trait ChildWatcher: Send + Sync {
    fn process(&self, event: &WatchedEvent);
}

/// Coordination service errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoordinationError {
    #[error("No node: {0}")]
    NoNode(String),

    #[error("Node exists: {0}")]
    NodeExists(String),

    #[error("Node has children: {0}")]
    NotEmpty(String),

    #[error("Version mismatch: {0}")]
    BadVersion(String),

    #[error("Connection loss")]
    ConnectionLoss,

    #[error("Session expired")]
    SessionExpired,

    #[error("Service error: {0}")]
    Other(String),
}

/// Client of the coordination service
///
/// Implementations:
/// - InMemoryCoordination (pdqueue-infra-memory): in-process namespace
/// - mocks::MockCoordinationClient: scriptable races for unit tests
#[async_trait]
pub trait CoordinationClient: Send + Sync {
    /// Create a node and return its full path.
    ///
    /// # Errors
    /// - NoNode if the parent does not exist
    /// - NodeExists if a fixed-name node already exists
    async fn create(
        &self,
        path: &str,
        data: &[u8],
        acl: Acl,
        mode: CreateMode,
    ) -> Result<String, CoordinationError>;

    /// List child names of `path`.
    ///
    /// A supplied watcher is armed atomically with the listing and fires at
    /// most once, on the next create or delete of a direct child.
    async fn get_children(
        &self,
        path: &str,
        watcher: Option<Arc<dyn ChildWatcher>>,
    ) -> Result<Vec<String>, CoordinationError>;

    async fn get_data(&self, path: &str) -> Result<Vec<u8>, CoordinationError>;

    /// Delete a node. `None` deletes regardless of version.
    async fn delete(&self, path: &str, version: Option<i32>) -> Result<(), CoordinationError>;

    async fn exists(&self, path: &str) -> Result<bool, CoordinationError>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use crate::domain::codec::SEQUENCE_WIDTH;
    use crate::domain::path;
    use std::collections::{BTreeMap, HashSet};
    use std::sync::Mutex;

    #[derive(Default)]
    struct MockState {
        nodes: BTreeMap<String, Vec<u8>>,
        next_sequence: u64,
        watchers: Vec<(String, Arc<dyn ChildWatcher>)>,
        vanish_on_read: HashSet<String>,
        vanish_on_delete: HashSet<String>,
        inject_on_read: Option<(String, Vec<u8>)>,
        failure: Option<CoordinationError>,
        list_calls: usize,
        deleted: Vec<String>,
    }

    impl MockState {
        fn check(&self) -> Result<(), CoordinationError> {
            match &self.failure {
                Some(err) => Err(err.clone()),
                None => Ok(()),
            }
        }

        fn has_node(&self, node: &str) -> bool {
            node == path::ROOT || self.nodes.contains_key(node)
        }

        fn children(&self, parent: &str) -> Vec<String> {
            self.nodes
                .keys()
                .filter(|p| path::parent(p) == Some(parent))
                .map(|p| path::path_end(p).to_string())
                .collect()
        }

        fn take_watchers(&mut self, parent: &str) -> Vec<Arc<dyn ChildWatcher>> {
            let (fired, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut self.watchers)
                .into_iter()
                .partition(|(p, _)| p == parent);
            self.watchers = kept;
            fired.into_iter().map(|(_, w)| w).collect()
        }
    }

    fn notify(watchers: Vec<Arc<dyn ChildWatcher>>, parent: &str, child: &str) {
        let event = WatchedEvent::children_changed(parent, child);
        for watcher in watchers {
            watcher.process(&event);
        }
    }

    /// Flat-map mock client with scriptable races
    #[derive(Default)]
    pub struct MockCoordinationClient {
        state: Mutex<MockState>,
    }

    impl MockCoordinationClient {
        pub fn new() -> Self {
            Self::default()
        }

        /// Insert a node directly, without firing watches.
        pub fn with_node(self, node: &str, data: &[u8]) -> Self {
            self.state
                .lock()
                .unwrap()
                .nodes
                .insert(node.to_string(), data.to_vec());
            self
        }

        /// The node disappears (another consumer claimed it) when first read.
        pub fn vanish_on_read(self, node: &str) -> Self {
            self.state
                .lock()
                .unwrap()
                .vanish_on_read
                .insert(node.to_string());
            self
        }

        /// The node disappears between a successful read and the delete.
        pub fn vanish_on_delete(self, node: &str) -> Self {
            self.state
                .lock()
                .unwrap()
                .vanish_on_delete
                .insert(node.to_string());
            self
        }

        /// On the first read of any node, a competing producer creates `node`.
        pub fn inject_on_first_read(self, node: &str, data: &[u8]) -> Self {
            self.state.lock().unwrap().inject_on_read = Some((node.to_string(), data.to_vec()));
            self
        }

        /// Every subsequent call fails with `err`.
        pub fn fail_with(&self, err: CoordinationError) {
            self.state.lock().unwrap().failure = Some(err);
        }

        pub fn list_calls(&self) -> usize {
            self.state.lock().unwrap().list_calls
        }

        pub fn deleted(&self) -> Vec<String> {
            self.state.lock().unwrap().deleted.clone()
        }

        pub fn contains(&self, node: &str) -> bool {
            self.state.lock().unwrap().nodes.contains_key(node)
        }
    }

    #[async_trait]
    impl CoordinationClient for MockCoordinationClient {
        async fn create(
            &self,
            node: &str,
            data: &[u8],
            _acl: Acl,
            mode: CreateMode,
        ) -> Result<String, CoordinationError> {
            let (created, parent, watchers) = {
                let mut state = self.state.lock().unwrap();
                state.check()?;

                let parent = path::parent(node).unwrap_or(path::ROOT).to_string();
                if !state.has_node(&parent) {
                    return Err(CoordinationError::NoNode(parent));
                }

                let created = if mode.is_sequential() {
                    let seq = state.next_sequence;
                    state.next_sequence += 1;
                    format!("{}{:0width$}", node, seq, width = SEQUENCE_WIDTH)
                } else {
                    node.to_string()
                };
                if state.has_node(&created) {
                    return Err(CoordinationError::NodeExists(created));
                }

                state.nodes.insert(created.clone(), data.to_vec());
                let watchers = state.take_watchers(&parent);
                (created, parent, watchers)
            };

            notify(watchers, &parent, &created);
            Ok(created)
        }

        async fn get_children(
            &self,
            node: &str,
            watcher: Option<Arc<dyn ChildWatcher>>,
        ) -> Result<Vec<String>, CoordinationError> {
            let mut state = self.state.lock().unwrap();
            state.check()?;
            state.list_calls += 1;

            if !state.has_node(node) {
                return Err(CoordinationError::NoNode(node.to_string()));
            }
            if let Some(w) = watcher {
                state.watchers.push((node.to_string(), w));
            }
            Ok(state.children(node))
        }

        async fn get_data(&self, node: &str) -> Result<Vec<u8>, CoordinationError> {
            let (result, injected) = {
                let mut state = self.state.lock().unwrap();
                state.check()?;

                let injected = state.inject_on_read.take().and_then(|(child, data)| {
                    let parent = path::parent(&child)?.to_string();
                    state.nodes.insert(child.clone(), data);
                    let watchers = state.take_watchers(&parent);
                    Some((watchers, parent, child))
                });

                let result = if state.vanish_on_read.remove(node) {
                    state.nodes.remove(node);
                    Err(CoordinationError::NoNode(node.to_string()))
                } else {
                    state
                        .nodes
                        .get(node)
                        .cloned()
                        .ok_or_else(|| CoordinationError::NoNode(node.to_string()))
                };
                (result, injected)
            };

            if let Some((watchers, parent, child)) = injected {
                notify(watchers, &parent, &child);
            }
            result
        }

        async fn delete(&self, node: &str, _version: Option<i32>) -> Result<(), CoordinationError> {
            let mut state = self.state.lock().unwrap();
            state.check()?;

            if state.vanish_on_delete.remove(node) {
                state.nodes.remove(node);
                return Err(CoordinationError::NoNode(node.to_string()));
            }
            if state.nodes.remove(node).is_none() {
                return Err(CoordinationError::NoNode(node.to_string()));
            }
            state.deleted.push(node.to_string());
            Ok(())
        }

        async fn exists(&self, node: &str) -> Result<bool, CoordinationError> {
            let state = self.state.lock().unwrap();
            state.check()?;
            Ok(state.has_node(node))
        }
    }
}
