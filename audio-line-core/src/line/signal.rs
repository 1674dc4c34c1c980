use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

use crate::traits::stream::StreamNotifier;

/// Wake-up primitive shared between a line and its native stream.
///
/// A monotonically increasing sequence guarded by a mutex and paired with a
/// condition variable. Waiters sample the sequence before checking their
/// condition and only sleep while it is unchanged, so a notification that
/// lands between the check and the wait is never lost.
#[derive(Debug, Default)]
pub(crate) struct Signal {
    sequence: Mutex<u64>,
    changed: Condvar,
}

impl Signal {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn sequence(&self) -> u64 {
        *self.sequence.lock()
    }

    pub(crate) fn notify(&self) {
        let mut sequence = self.sequence.lock();
        *sequence = sequence.wrapping_add(1);
        self.changed.notify_all();
    }

    /// Block until the sequence moves past `seen` or `timeout` elapses.
    ///
    /// Returns true if a notification arrived.
    pub(crate) fn wait_past(&self, seen: u64, timeout: Duration) -> bool {
        let mut sequence = self.sequence.lock();
        if *sequence != seen {
            return true;
        }
        self.changed.wait_for(&mut sequence, timeout);
        *sequence != seen
    }

    /// Notifier handed to the backend. Holds only a weak reference so a
    /// stream outliving its line does not keep the line alive.
    pub(crate) fn notifier(self: &Arc<Self>) -> StreamNotifier {
        let weak: Weak<Signal> = Arc::downgrade(self);
        Arc::new(move || {
            if let Some(signal) = weak.upgrade() {
                signal.notify();
            }
        })
    }
}
