// Bounded-Wait Poll - coarse retry loop around remove()

use tokio::time::sleep;
use tracing::debug;

use super::constants::POLL_INTERVAL;
use super::DistributedPriorityQueue;
use crate::domain::{Payload, PriorityCodec};
use crate::error::Result;

impl<C: PriorityCodec> DistributedPriorityQueue<C> {
    /// Remove the head, retrying once per `POLL_INTERVAL` for up to
    /// `timeout_secs` attempts while the queue is empty.
    ///
    /// Latency contract: this is a sleep loop, not a watch. An item offered
    /// mid-wait is returned on the next whole-second attempt, and an empty
    /// result is only returned after at least `timeout_secs` seconds.
    /// `timeout_secs <= 0` behaves exactly like [`poll`](Self::poll).
    /// Each attempt leaves a child watch armed until the next change under
    /// the root, as described on [`poll`](Self::poll).
    pub async fn poll_timeout(&self, timeout_secs: i64) -> Result<Option<Payload>> {
        if timeout_secs <= 0 {
            return self.poll().await;
        }

        for cycle in 0..timeout_secs {
            match self.remove().await {
                Ok(payload) => return Ok(Some(payload)),
                Err(e) if e.is_not_found() => {
                    debug!(root = %self.root(), cycle, timeout_secs, "Queue empty, waiting");
                    sleep(POLL_INTERVAL).await;
                }
                Err(e) => return Err(e),
            }
        }

        Ok(None)
    }
}
