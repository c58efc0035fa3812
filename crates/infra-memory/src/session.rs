// In-Memory CoordinationClient Implementation

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use pdqueue_core::port::{Acl, ChildWatcher, CoordinationClient, CoordinationError, CreateMode};
use tracing::{info, warn};

use crate::namespace::{InMemoryCoordination, SessionId};

/// Connection state of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connected,
    /// Calls fail with ConnectionLoss until reconnected; watches are kept
    Disconnected,
    /// Terminal: calls fail with SessionExpired, watches were released
    Expired,
}

/// Client session against an [`InMemoryCoordination`] service.
///
/// Each session owns the watches it registers. Cloning shares the session.
#[derive(Clone)]
pub struct CoordinationSession {
    service: InMemoryCoordination,
    id: SessionId,
    state: Arc<Mutex<SessionState>>,
}

impl CoordinationSession {
    pub(crate) fn new(service: InMemoryCoordination, id: SessionId) -> Self {
        Self {
            service,
            id,
            state: Arc::new(Mutex::new(SessionState::Connected)),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn state(&self) -> SessionState {
        *self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn set_state(&self, next: SessionState) {
        *self.state.lock().unwrap_or_else(|p| p.into_inner()) = next;
    }

    /// Simulate a dropped connection.
    pub fn disconnect(&self) {
        if self.state() == SessionState::Connected {
            warn!(session = self.id, "Session disconnected");
            self.set_state(SessionState::Disconnected);
        }
    }

    pub fn reconnect(&self) {
        if self.state() == SessionState::Disconnected {
            info!(session = self.id, "Session reconnected");
            self.set_state(SessionState::Connected);
        }
    }

    /// Expire the session and tell its watchers.
    pub fn expire(&self) {
        if self.state() == SessionState::Expired {
            return;
        }
        warn!(session = self.id, "Session expired");
        self.set_state(SessionState::Expired);
        let notification = self.service.lock().close_session(self.id);
        notification.deliver();
    }

    fn check(&self) -> Result<(), CoordinationError> {
        match self.state() {
            SessionState::Connected => Ok(()),
            SessionState::Disconnected => Err(CoordinationError::ConnectionLoss),
            SessionState::Expired => Err(CoordinationError::SessionExpired),
        }
    }
}

#[async_trait]
impl CoordinationClient for CoordinationSession {
    async fn create(
        &self,
        path: &str,
        data: &[u8],
        acl: Acl,
        mode: CreateMode,
    ) -> Result<String, CoordinationError> {
        self.check()?;
        let (created, notification) = self.service.lock().create(path, data, acl, mode)?;
        notification.deliver();
        Ok(created)
    }

    async fn get_children(
        &self,
        path: &str,
        watcher: Option<Arc<dyn ChildWatcher>>,
    ) -> Result<Vec<String>, CoordinationError> {
        self.check()?;
        self.service
            .lock()
            .get_children(path, watcher.map(|w| (self.id, w)))
    }

    async fn get_data(&self, path: &str) -> Result<Vec<u8>, CoordinationError> {
        self.check()?;
        self.service.lock().get_data(path)
    }

    async fn delete(&self, path: &str, version: Option<i32>) -> Result<(), CoordinationError> {
        self.check()?;
        let notification = self.service.lock().delete(path, version)?;
        notification.deliver();
        Ok(())
    }

    async fn exists(&self, path: &str) -> Result<bool, CoordinationError> {
        self.check()?;
        self.service.lock().exists(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pdqueue_core::port::WatchedEvent;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counter(AtomicUsize);

    impl ChildWatcher for Counter {
        fn process(&self, _event: &WatchedEvent) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn test_sessions_share_namespace() {
        let service = InMemoryCoordination::new();
        let producer = service.connect();
        let consumer = service.connect();
        assert_ne!(producer.id(), consumer.id());

        producer
            .create("/jobs", b"", Acl::OpenUnsafe, CreateMode::Persistent)
            .await
            .unwrap();
        let created = producer
            .create("/jobs/q-001-", b"payload", Acl::OpenUnsafe, CreateMode::PersistentSequential)
            .await
            .unwrap();

        assert_eq!(
            consumer.get_children("/jobs", None).await.unwrap(),
            vec!["q-001-0000000000".to_string()]
        );
        assert_eq!(consumer.get_data(&created).await.unwrap(), b"payload".to_vec());
        assert!(consumer.exists("/jobs").await.unwrap());
        assert_eq!(service.child_count("/jobs"), Some(1));
    }

    #[tokio::test]
    async fn test_watch_fired_by_other_session() {
        let service = InMemoryCoordination::new();
        let producer = service.connect();
        let consumer = service.connect();
        producer
            .create("/jobs", b"", Acl::OpenUnsafe, CreateMode::Persistent)
            .await
            .unwrap();

        let counter = Arc::new(Counter(AtomicUsize::new(0)));
        let watcher: Arc<dyn ChildWatcher> = counter.clone();
        consumer.get_children("/jobs", Some(watcher)).await.unwrap();
        assert_eq!(service.pending_watches(), 1);

        producer
            .create("/jobs/q-000-", b"", Acl::OpenUnsafe, CreateMode::PersistentSequential)
            .await
            .unwrap();
        assert_eq!(counter.0.load(Ordering::SeqCst), 1);
        assert_eq!(service.pending_watches(), 0);
    }

    #[tokio::test]
    async fn test_disconnect_and_reconnect() {
        let service = InMemoryCoordination::new();
        let session = service.connect();

        session.disconnect();
        assert_eq!(session.state(), SessionState::Disconnected);
        assert_eq!(
            session.exists("/").await,
            Err(CoordinationError::ConnectionLoss)
        );

        session.reconnect();
        assert!(session.exists("/").await.unwrap());
    }

    #[tokio::test]
    async fn test_expire_is_terminal_and_notifies_watchers() {
        let service = InMemoryCoordination::new();
        let session = service.connect();
        session
            .create("/jobs", b"", Acl::OpenUnsafe, CreateMode::Persistent)
            .await
            .unwrap();

        let counter = Arc::new(Counter(AtomicUsize::new(0)));
        let watcher: Arc<dyn ChildWatcher> = counter.clone();
        session.get_children("/jobs", Some(watcher)).await.unwrap();

        session.expire();
        assert_eq!(counter.0.load(Ordering::SeqCst), 1);
        assert_eq!(service.pending_watches(), 0);

        session.reconnect();
        assert_eq!(
            session.get_data("/jobs").await,
            Err(CoordinationError::SessionExpired)
        );
    }
}
