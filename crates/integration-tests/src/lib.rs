//! Shared fixtures for pdqueue end-to-end tests

use std::sync::Arc;

use pdqueue_core::{DistributedPriorityQueue, QueueConfig};
use pdqueue_infra_memory::{CoordinationSession, InMemoryCoordination};
use tracing_subscriber::EnvFilter;

pub const QUEUE_ROOT: &str = "/pdqueue-test/queue";

/// Install a test-friendly subscriber once; honours RUST_LOG.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("pdqueue_core=info,pdqueue_infra_memory=info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

/// One service instance shared by every actor of a test.
pub struct Cluster {
    pub service: InMemoryCoordination,
    config: QueueConfig,
}

impl Cluster {
    pub fn new() -> Self {
        init_tracing();
        Self {
            service: InMemoryCoordination::new(),
            config: QueueConfig::new(QUEUE_ROOT).with_create_parents(true),
        }
    }

    pub fn with_config(config: QueueConfig) -> Self {
        init_tracing();
        Self {
            service: InMemoryCoordination::new(),
            config,
        }
    }

    /// A queue handle for a new actor with its own session.
    pub fn actor(&self) -> (DistributedPriorityQueue, CoordinationSession) {
        let session = self.service.connect();
        let client = Arc::new(session.clone());
        let queue = DistributedPriorityQueue::with_simple_codec(client, self.config.clone())
            .expect("valid test queue config");
        (queue, session)
    }

    pub fn queue(&self) -> Arc<DistributedPriorityQueue> {
        Arc::new(self.actor().0)
    }
}

impl Default for Cluster {
    fn default() -> Self {
        Self::new()
    }
}

pub fn text(payload: &[u8]) -> String {
    String::from_utf8_lossy(payload).into_owned()
}
