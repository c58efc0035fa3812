// In-Memory Namespace
//
// Node tree shared by every session of one service instance. Watches are
// drained under the lock and delivered after it is released.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

use pdqueue_core::application::queue::constants::SEQUENCE_WIDTH;
use pdqueue_core::domain::path;
use pdqueue_core::port::{Acl, ChildWatcher, CoordinationError, CreateMode, EventType, WatchedEvent};
use tracing::debug;

use crate::session::CoordinationSession;

pub(crate) type SessionId = u64;

struct Node {
    data: Vec<u8>,
    version: i32,
    acl: Acl,
    children: BTreeSet<String>,
    /// Child change counter; doubles as the sequential-name suffix source
    cversion: u64,
}

impl Node {
    fn new(data: Vec<u8>, acl: Acl) -> Self {
        Self {
            data,
            version: 0,
            acl,
            children: BTreeSet::new(),
            cversion: 0,
        }
    }
}

struct ChildWatch {
    session: SessionId,
    watcher: Arc<dyn ChildWatcher>,
}

/// Watch deliveries to run once the namespace lock is released
#[must_use]
#[derive(Default)]
pub(crate) struct Notification {
    deliveries: Vec<(Arc<dyn ChildWatcher>, WatchedEvent)>,
}

impl Notification {
    fn push_all(&mut self, watchers: impl IntoIterator<Item = ChildWatch>, event: &WatchedEvent) {
        self.deliveries
            .extend(watchers.into_iter().map(|w| (w.watcher, event.clone())));
    }

    pub(crate) fn deliver(self) {
        for (watcher, event) in self.deliveries {
            watcher.process(&event);
        }
    }
}

pub(crate) struct Namespace {
    nodes: HashMap<String, Node>,
    child_watches: HashMap<String, Vec<ChildWatch>>,
    next_session: SessionId,
}

fn bad_arguments(err: impl std::fmt::Display) -> CoordinationError {
    CoordinationError::Other(format!("Bad arguments: {}", err))
}

impl Namespace {
    fn new() -> Self {
        let mut nodes = HashMap::new();
        nodes.insert(path::ROOT.to_string(), Node::new(Vec::new(), Acl::OpenUnsafe));
        Self {
            nodes,
            child_watches: HashMap::new(),
            next_session: 1,
        }
    }

    pub(crate) fn open_session(&mut self) -> SessionId {
        let id = self.next_session;
        self.next_session += 1;
        id
    }

    /// Drop every watch held by `session`, returning the watchers so they can
    /// be told the session is gone.
    pub(crate) fn close_session(&mut self, session: SessionId) -> Notification {
        let event = WatchedEvent::session_expired();
        let mut notification = Notification::default();
        for watches in self.child_watches.values_mut() {
            let (mine, others): (Vec<_>, Vec<_>) =
                std::mem::take(watches).into_iter().partition(|w| w.session == session);
            *watches = others;
            notification.push_all(mine, &event);
        }
        self.child_watches.retain(|_, watches| !watches.is_empty());
        notification
    }

    fn children_changed(&mut self, parent: &str, child: &str) -> Notification {
        let mut notification = Notification::default();
        if let Some(watches) = self.child_watches.remove(parent) {
            notification.push_all(watches, &WatchedEvent::children_changed(parent, child));
        }
        notification
    }

    pub(crate) fn create(
        &mut self,
        node: &str,
        data: &[u8],
        acl: Acl,
        mode: CreateMode,
    ) -> Result<(String, Notification), CoordinationError> {
        path::validate_path(node, mode.is_sequential()).map_err(bad_arguments)?;
        if node == path::ROOT {
            return Err(CoordinationError::NodeExists(node.to_string()));
        }

        let parent_path = path::parent(node).unwrap_or(path::ROOT).to_string();
        let parent = self
            .nodes
            .get_mut(&parent_path)
            .ok_or_else(|| CoordinationError::NoNode(parent_path.clone()))?;

        let created = if mode.is_sequential() {
            format!("{}{:0width$}", node, parent.cversion, width = SEQUENCE_WIDTH)
        } else {
            node.to_string()
        };
        let name = path::path_end(&created).to_string();
        if parent.children.contains(&name) {
            return Err(CoordinationError::NodeExists(created));
        }

        parent.children.insert(name);
        parent.cversion += 1;
        self.nodes
            .insert(created.clone(), Node::new(data.to_vec(), acl));

        debug!(node = %created, "Node created");
        let notification = self.children_changed(&parent_path, &created);
        Ok((created, notification))
    }

    pub(crate) fn get_children(
        &mut self,
        node: &str,
        watch: Option<(SessionId, Arc<dyn ChildWatcher>)>,
    ) -> Result<Vec<String>, CoordinationError> {
        path::validate_path(node, false).map_err(bad_arguments)?;
        let children = self
            .nodes
            .get(node)
            .ok_or_else(|| CoordinationError::NoNode(node.to_string()))?
            .children
            .iter()
            .cloned()
            .collect();

        if let Some((session, watcher)) = watch {
            self.child_watches
                .entry(node.to_string())
                .or_default()
                .push(ChildWatch { session, watcher });
        }
        Ok(children)
    }

    pub(crate) fn get_data(&self, node: &str) -> Result<Vec<u8>, CoordinationError> {
        path::validate_path(node, false).map_err(bad_arguments)?;
        self.nodes
            .get(node)
            .map(|n| n.data.clone())
            .ok_or_else(|| CoordinationError::NoNode(node.to_string()))
    }

    pub(crate) fn delete(
        &mut self,
        node: &str,
        version: Option<i32>,
    ) -> Result<Notification, CoordinationError> {
        path::validate_path(node, false).map_err(bad_arguments)?;
        if node == path::ROOT {
            return Err(bad_arguments("cannot delete the namespace root"));
        }

        let entry = self
            .nodes
            .get(node)
            .ok_or_else(|| CoordinationError::NoNode(node.to_string()))?;
        if let Some(expected) = version {
            if expected != entry.version {
                return Err(CoordinationError::BadVersion(node.to_string()));
            }
        }
        if !entry.children.is_empty() {
            return Err(CoordinationError::NotEmpty(node.to_string()));
        }

        self.nodes.remove(node);
        let parent_path = path::parent(node).unwrap_or(path::ROOT).to_string();
        if let Some(parent) = self.nodes.get_mut(&parent_path) {
            parent.children.remove(path::path_end(node));
            parent.cversion += 1;
        }

        debug!(node = %node, "Node deleted");
        let mut notification = self.children_changed(&parent_path, node);
        if let Some(watches) = self.child_watches.remove(node) {
            let event = WatchedEvent {
                event_type: EventType::NodeDeleted,
                path: node.to_string(),
                child: None,
            };
            notification.push_all(watches, &event);
        }
        Ok(notification)
    }

    pub(crate) fn exists(&self, node: &str) -> Result<bool, CoordinationError> {
        path::validate_path(node, false).map_err(bad_arguments)?;
        Ok(self.nodes.contains_key(node))
    }

    fn acl(&self, node: &str) -> Option<Acl> {
        self.nodes.get(node).map(|n| n.acl)
    }

    fn child_count(&self, node: &str) -> Option<usize> {
        self.nodes.get(node).map(|n| n.children.len())
    }

    fn watch_count(&self) -> usize {
        self.child_watches.values().map(Vec::len).sum()
    }
}

/// One coordination service instance.
///
/// Cheap to clone; every clone and every session shares the same namespace.
#[derive(Clone)]
pub struct InMemoryCoordination {
    namespace: Arc<Mutex<Namespace>>,
}

impl Default for InMemoryCoordination {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryCoordination {
    pub fn new() -> Self {
        Self {
            namespace: Arc::new(Mutex::new(Namespace::new())),
        }
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, Namespace> {
        // Every mutation completes before it can panic, so a poisoned tree is still consistent.
        self.namespace
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Open a new client session against this service.
    pub fn connect(&self) -> CoordinationSession {
        let id = self.lock().open_session();
        CoordinationSession::new(self.clone(), id)
    }

    /// Number of nodes, including the namespace root.
    pub fn node_count(&self) -> usize {
        self.lock().nodes.len()
    }

    /// Number of direct children of `node`, `None` if it does not exist.
    pub fn child_count(&self, node: &str) -> Option<usize> {
        self.lock().child_count(node)
    }

    /// ACL a node was created with, `None` if it does not exist.
    pub fn acl(&self, node: &str) -> Option<Acl> {
        self.lock().acl(node)
    }

    /// Number of armed, not yet fired child watches.
    pub fn pending_watches(&self) -> usize {
        self.lock().watch_count()
    }
}
