// Change Tracker - one-shot child watch with an urgency side channel

use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::watch;
use tracing::debug;

use crate::domain::{path, PriorityCodec};
use crate::port::{ChildWatcher, WatchedEvent};

struct TrackerState<P> {
    fired: bool,
    /// Most urgent (smallest) priority among items reported since arming
    most_urgent_seen: Option<P>,
}

/// Single-use notification sink bound to one enumeration pass.
///
/// Notifications arrive on the service's delivery context while the scanning
/// task reads the state, so both fields sit behind one mutex.
pub struct ChangeTracker<C: PriorityCodec> {
    codec: Arc<C>,
    state: Mutex<TrackerState<C::Priority>>,
    fired_tx: watch::Sender<bool>,
}

impl<C: PriorityCodec> ChangeTracker<C> {
    pub fn new(codec: Arc<C>) -> Self {
        let (fired_tx, _) = watch::channel(false);
        Self {
            codec,
            state: Mutex::new(TrackerState {
                fired: false,
                most_urgent_seen: None,
            }),
            fired_tx,
        }
    }

    fn lock(&self) -> MutexGuard<'_, TrackerState<C::Priority>> {
        // State stays consistent even if a holder panicked: both writes are single assignments.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Record a notification about `affected_path`.
    pub fn on_notification(&self, affected_path: &str) {
        let changed = if self.codec.is_valid_name(path::path_end(affected_path)) {
            self.codec.decode_priority(affected_path)
        } else {
            None
        };

        let first = {
            let mut state = self.lock();
            let first = !state.fired;
            state.fired = true;
            if let Some(changed) = changed {
                let more_urgent = match &state.most_urgent_seen {
                    Some(current) => changed < *current,
                    None => true,
                };
                if more_urgent {
                    state.most_urgent_seen = Some(changed);
                }
            }
            first
        };

        if first {
            self.fired_tx.send_replace(true);
        }
    }

    /// Suspend until the first notification arrives. No timeout.
    pub async fn await_first(&self) {
        let mut fired_rx = self.fired_tx.subscribe();
        // The sender lives in self, so the channel cannot close while we wait.
        let _ = fired_rx.wait_for(|fired| *fired).await;
    }

    pub fn has_fired(&self) -> bool {
        self.lock().fired
    }

    /// True once any valid queue item was reported.
    pub fn has_changed(&self) -> bool {
        self.lock().most_urgent_seen.is_some()
    }

    /// True iff a reported item is strictly more urgent than `priority`.
    pub fn has_become_more_urgent_than(&self, priority: &C::Priority) -> bool {
        matches!(&self.lock().most_urgent_seen, Some(seen) if seen < priority)
    }
}

impl<C: PriorityCodec> ChildWatcher for ChangeTracker<C> {
    fn process(&self, event: &WatchedEvent) {
        debug!(
            path = %event.path,
            affected = %event.affected_path(),
            event_type = ?event.event_type,
            "Watcher fired"
        );
        self.on_notification(event.affected_path());
    }
}
