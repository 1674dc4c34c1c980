use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::models::event::LineEvent;
use crate::traits::listener::LineListener;

/// Handle returned by listener registration, used to remove the listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Synchronous, in-process fan-out of lifecycle events.
///
/// `dispatch` calls every listener registered at the moment it starts, once,
/// on the calling thread. Listeners added while a dispatch is running do not
/// see that event; the listener list lock is not held while listeners run.
pub struct EventDispatcher {
    listeners: Mutex<Vec<(ListenerId, Arc<dyn LineListener>)>>,
    next_id: AtomicU64,
    warn_after: Duration,
}

impl EventDispatcher {
    pub fn new(warn_after: Duration) -> Self {
        Self {
            listeners: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
            warn_after,
        }
    }

    pub fn add(&self, listener: Arc<dyn LineListener>) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners.lock().push((id, listener));
        id
    }

    /// Returns false if no listener with `id` was registered.
    pub fn remove(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.lock();
        let before = listeners.len();
        listeners.retain(|(listener_id, _)| *listener_id != id);
        listeners.len() != before
    }

    pub fn clear(&self) {
        self.listeners.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.listeners.lock().len()
    }

    pub fn dispatch(&self, event: &LineEvent) {
        let snapshot: Vec<Arc<dyn LineListener>> = self
            .listeners
            .lock()
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();

        for listener in snapshot {
            let started = Instant::now();
            listener.update(event);
            let elapsed = started.elapsed();
            if elapsed > self.warn_after {
                log::warn!(
                    "{} listener for {:?} ran for {:?}; listeners must not block",
                    event.kind,
                    event.source,
                    elapsed
                );
            }
        }
    }
}

impl fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventDispatcher")
            .field("listeners", &self.len())
            .field("warn_after", &self.warn_after)
            .finish()
    }
}
