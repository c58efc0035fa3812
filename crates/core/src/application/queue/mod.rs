// Queue Engine - distributed priority queue over the coordination port

mod bounded;
pub mod constants;

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, info};

use constants::DIRECTORY_DATA;

use crate::application::enumerator::ordered_children;
use crate::application::tracker::ChangeTracker;
use crate::domain::{path, Payload, PriorityCodec, QueueConfig, SimplePriorityCodec};
use crate::error::{QueueError, Result};
use crate::port::{CoordinationClient, CoordinationError, CreateMode};

/// Outcome of one scan over an enumeration snapshot
enum ScanOutcome {
    Resolved(Payload),
    /// A strictly more urgent item arrived mid-scan
    Stale,
    /// Every candidate was claimed by another actor first
    Exhausted,
}

/// Outcome of claiming one candidate
enum Claim<T> {
    Won(T),
    /// The node vanished between listing and read/delete
    RaceLost,
}

/// Priority queue whose items are sequential children of one root node.
///
/// Producers and consumers in different processes coordinate only through the
/// service: every mutation is a single atomic create or delete, and losers of
/// a race observe `NoNode` and move on.
pub struct DistributedPriorityQueue<C: PriorityCodec = SimplePriorityCodec> {
    client: Arc<dyn CoordinationClient>,
    codec: Arc<C>,
    config: QueueConfig,
}

impl DistributedPriorityQueue<SimplePriorityCodec> {
    /// Queue using the reference `q-<priority>-<sequence>` naming.
    pub fn with_simple_codec(
        client: Arc<dyn CoordinationClient>,
        config: QueueConfig,
    ) -> Result<Self> {
        Self::new(client, config, SimplePriorityCodec::new())
    }
}

impl<C: PriorityCodec> DistributedPriorityQueue<C> {
    /// Create a queue handle. Nothing is created on the service until the
    /// first offer or blocking wait.
    ///
    /// # Errors
    /// - InvalidArgument if the root path is empty or malformed
    pub fn new(
        client: Arc<dyn CoordinationClient>,
        config: QueueConfig,
        codec: C,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            client,
            codec: Arc::new(codec),
            config,
        })
    }

    pub fn root(&self) -> &str {
        &self.config.root_path
    }

    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    pub fn codec(&self) -> &C {
        &self.codec
    }

    /// Head of the queue without removing it.
    ///
    /// # Errors
    /// - NotFound if the queue is empty or was never created
    pub async fn element(&self) -> Result<Payload> {
        self.resolve(false, false).await
    }

    /// Remove and return the head of the queue.
    ///
    /// # Errors
    /// - NotFound if the queue is empty or was never created
    pub async fn remove(&self) -> Result<Payload> {
        self.resolve(false, true).await
    }

    /// Remove and return the head, suspending until an item is available.
    /// Never fails with NotFound.
    pub async fn take(&self) -> Result<Payload> {
        self.resolve(true, true).await
    }

    /// Like [`element`](Self::element), with `None` for an empty queue.
    pub async fn peek(&self) -> Result<Option<Payload>> {
        absent_if_not_found(self.element().await)
    }

    /// Like [`remove`](Self::remove), with `None` for an empty queue.
    ///
    /// Every listing arms a child watch, including the listing of an empty
    /// queue. The service holds each one until the next child change under
    /// the root, so a caller polling an idle queue accumulates one pending
    /// watch per call. Prefer [`take`](Self::take) for long waits.
    pub async fn poll(&self) -> Result<Option<Payload>> {
        absent_if_not_found(self.remove().await)
    }

    /// Insert `payload` with `priority` and return the created node's path.
    ///
    /// # Errors
    /// - InvalidArgument if the codec rejects the priority
    /// - Service if the root (or, without `create_parents`, an ancestor) cannot be created
    pub async fn offer(&self, payload: &[u8], priority: C::Priority) -> Result<String> {
        let prefix = self.codec.encode_prefix(&priority)?;
        let node = path::join(self.root(), &prefix);

        loop {
            match self
                .client
                .create(&node, payload, self.config.acl, CreateMode::PersistentSequential)
                .await
            {
                Ok(created) => {
                    debug!(root = %self.root(), node = %created, ?priority, "Offered item");
                    return Ok(created);
                }
                Err(CoordinationError::NoNode(_)) => self.ensure_root().await?,
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Number of valid items currently visible; 0 if the root does not exist.
    pub async fn len(&self) -> Result<usize> {
        match ordered_children(self.client.as_ref(), self.codec.as_ref(), self.root(), None).await {
            Ok(children) => Ok(children.len()),
            Err(e) if e.is_no_node() => Ok(0),
            Err(e) => Err(e),
        }
    }

    pub async fn is_empty(&self) -> Result<bool> {
        Ok(self.len().await? == 0)
    }

    /// Create the root node, tolerating a concurrent creator.
    async fn ensure_root(&self) -> Result<()> {
        let mut nodes = Vec::new();
        if self.config.create_parents {
            nodes.extend(path::ancestors(self.root()));
        }
        nodes.push(self.root());

        for node in nodes {
            match self
                .client
                .create(node, DIRECTORY_DATA, self.config.acl, CreateMode::Persistent)
                .await
            {
                Ok(_) => info!(node = %node, "Created queue node"),
                Err(CoordinationError::NodeExists(_)) => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    /// Shared algorithm of element, remove and take.
    ///
    /// Each pass arms a fresh tracker with the listing, then tries candidates
    /// in dequeue order. The listing is only refreshed when every candidate
    /// was raced away or a strictly more urgent item was reported mid-scan.
    async fn resolve(&self, wait_for_element: bool, delete_on_resolve: bool) -> Result<Payload> {
        loop {
            let tracker = Arc::new(ChangeTracker::new(Arc::clone(&self.codec)));

            let candidates = match ordered_children(
                self.client.as_ref(),
                self.codec.as_ref(),
                self.root(),
                Some(tracker.clone()),
            )
            .await
            {
                Ok(candidates) => candidates,
                Err(e) if e.is_no_node() => {
                    if !wait_for_element {
                        return Err(QueueError::NotFound(format!(
                            "queue root {} does not exist",
                            self.root()
                        )));
                    }
                    self.ensure_root().await?;
                    continue;
                }
                Err(e) => return Err(e),
            };

            if candidates.is_empty() {
                if !wait_for_element {
                    return Err(QueueError::NotFound(format!("queue {} is empty", self.root())));
                }
                debug!(root = %self.root(), "Queue empty, waiting for change");
                tracker.await_first().await;
                continue;
            }

            match self.scan(&candidates, &tracker, delete_on_resolve).await? {
                ScanOutcome::Resolved(payload) => return Ok(payload),
                ScanOutcome::Stale => {
                    debug!(root = %self.root(), "More urgent item arrived, restarting scan");
                }
                ScanOutcome::Exhausted => {
                    debug!(root = %self.root(), "All candidates claimed elsewhere, re-listing");
                }
            }
        }
    }

    async fn scan(
        &self,
        candidates: &BTreeMap<C::Key, String>,
        tracker: &ChangeTracker<C>,
        delete_on_resolve: bool,
    ) -> Result<ScanOutcome> {
        for child_name in candidates.values() {
            let node = path::join(self.root(), child_name);

            let payload = match self.claim_read(&node).await? {
                Claim::Won(payload) => payload,
                Claim::RaceLost => continue,
            };

            if let Some(priority) = self.codec.decode_priority(child_name) {
                if tracker.has_become_more_urgent_than(&priority) {
                    return Ok(ScanOutcome::Stale);
                }
            }

            if delete_on_resolve {
                match self.claim_delete(&node).await? {
                    Claim::Won(()) => {}
                    Claim::RaceLost => continue,
                }
            }

            return Ok(ScanOutcome::Resolved(payload));
        }

        Ok(ScanOutcome::Exhausted)
    }

    async fn claim_read(&self, node: &str) -> Result<Claim<Payload>> {
        match self.client.get_data(node).await {
            Ok(payload) => Ok(Claim::Won(payload)),
            Err(CoordinationError::NoNode(_)) => {
                debug!(node = %node, "Candidate vanished before read");
                Ok(Claim::RaceLost)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn claim_delete(&self, node: &str) -> Result<Claim<()>> {
        match self.client.delete(node, None).await {
            Ok(()) => Ok(Claim::Won(())),
            Err(CoordinationError::NoNode(_)) => {
                debug!(node = %node, "Candidate claimed by another consumer");
                Ok(Claim::RaceLost)
            }
            Err(e) => Err(e.into()),
        }
    }
}

fn absent_if_not_found(result: Result<Payload>) -> Result<Option<Payload>> {
    match result {
        Ok(payload) => Ok(Some(payload)),
        Err(e) if e.is_not_found() => Ok(None),
        Err(e) => Err(e),
    }
}
